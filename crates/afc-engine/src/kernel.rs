//! Shared evaluation kernel (§4.I): path loss, building penetration,
//! spectral overlap, antenna discrimination, and the I/N margin/EIRP-limit
//! arithmetic every analysis mode (point, exclusion-zone, heatmap) funnels
//! a transmitter/channel/incumbent triple through.

use afc_channel_plan::Channel;
use afc_config::{AfcConfig, BuildingPenetrationLoss};
use afc_geo::{elevation_angle_deg, haversine_m, GeoPoint};
use afc_incumbents::FsReceiver;
use afc_propagation::{
    p2109_building_entry_loss, path_loss, BuildingType, Confidence, Environment, PropagationContext,
};
use afc_spectrum::{compute_spectral_overlap, overlap_loss_db, FreqRangeHz};
use afc_terrain::{TerrainSource, TerrainSourceTag};

use crate::error::Result;

/// Minimum terrain-profile sample count the knife-edge diffraction term
/// needs to see a meaningful obstruction; matches the propagation kernel's
/// own `TooFewProfileSamples` floor.
const MIN_PROFILE_SAMPLES: usize = 2;
/// Caps profile cost on very long exclusion-zone/heatmap links.
const MAX_PROFILE_SAMPLES: usize = 2000;
/// One terrain sample roughly every 3 meters along the path.
const PROFILE_SAMPLE_SPACING_M: f64 = 3.0;

/// One evaluated transmitter/channel/incumbent triple.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRecord {
    pub fs_id: i64,
    pub i_over_n_db: f64,
    pub margin_db: f64,
    pub eirp_limit_dbm: f64,
    pub path_loss_db: f64,
    pub model_label: String,
    /// Whether this evaluation belongs in the `exc_thr.csv.gz` diagnostic
    /// export (§7's OR-condition: loud in I/N, or the channel failed).
    pub should_log: bool,
}

impl EvaluationRecord {
    /// Sentinel for a channel/incumbent pair with zero spectral overlap:
    /// no interference path exists, so the full `eirp_max_dbm` stands.
    fn no_overlap(fs_id: i64, eirp_max_dbm: f64) -> Self {
        EvaluationRecord {
            fs_id,
            i_over_n_db: f64::NEG_INFINITY,
            margin_db: f64::INFINITY,
            eirp_limit_dbm: eirp_max_dbm,
            path_loss_db: f64::INFINITY,
            model_label: "no-overlap".to_string(),
            should_log: false,
        }
    }
}

/// Builds the propagation model's per-request context from the
/// configuration, resolving the indoor/outdoor body-loss split and the
/// building-penetration-loss selector into the concrete fields
/// [`afc_propagation::path_loss`] expects.
pub fn build_propagation_context(cfg: &AfcConfig, indoor: bool) -> PropagationContext {
    let (building_type, building_confidence, fixed_building_loss_db) = match cfg.building_penetration_loss {
        BuildingPenetrationLoss::P2109 { building_type, confidence } => (building_type, confidence, None),
        BuildingPenetrationLoss::Fixed { value } => (BuildingType::Traditional, 0.5, Some(value)),
    };

    PropagationContext {
        model: cfg.propagation_model.kind,
        clutter_confidence: cfg.p2108_confidence,
        building_confidence,
        itm_confidence: cfg.itm_confidence,
        winner_los_threshold: cfg.win2_prob_los_threshold,
        close_in_radius_m: cfg.close_in_radius_m,
        clamp_to_fspl: cfg.clamp_to_fspl,
        winner_combine: cfg.winner_combine,
        winner_building_los: cfg.winner_building_los,
        polarization_loss_db: cfg.polarization_mismatch_loss_db,
        body_loss_db: if indoor { cfg.body_loss.value_indoor } else { cfg.body_loss.value_outdoor },
        feeder_loss_override_db: if cfg.receiver_feeder_loss_db > 0.0 { Some(cfg.receiver_feeder_loss_db) } else { None },
        building_type,
        fixed_building_loss_db,
    }
}

/// Number of terrain-profile samples to request for a link of this length.
pub fn profile_sample_count(dist_m: f64) -> usize {
    ((dist_m / PROFILE_SAMPLE_SPACING_M).ceil() as usize + 1).clamp(MIN_PROFILE_SAMPLES, MAX_PROFILE_SAMPLES)
}

/// Evaluates interference from a transmitter at `tx` on `channel`, toward
/// `fs`, against the shared kernel (§4.I pseudocode): distance and
/// elevation from the great-circle geometry, an ITM/Winner-II/FSPL path
/// loss, P.2109 building entry loss when the transmitter is indoors,
/// spectral overlap loss, receive antenna discrimination, and the
/// resulting I/N margin and per-channel EIRP limit.
#[allow(clippy::too_many_arguments)]
pub fn evaluate(
    tx: GeoPoint,
    tx_indoor: bool,
    eirp_max_dbm: f64,
    channel: &Channel,
    fs: &FsReceiver,
    terrain: &dyn TerrainSource,
    environment: Environment,
    aci: bool,
    cfg: &AfcConfig,
    ctx: &PropagationContext,
    itm_confidence: &mut Confidence,
    clutter_confidence: &mut Confidence,
    building_confidence: &mut Confidence,
) -> Result<EvaluationRecord> {
    let tx_range = FreqRangeHz::new(channel.start_freq_mhz * 1e6, channel.stop_freq_mhz * 1e6);
    let rx_range = FreqRangeHz::new(fs.start_freq_hz, fs.stop_freq_hz);
    let overlap_fraction = compute_spectral_overlap(tx_range, rx_range, aci);
    if overlap_fraction <= 0.0 {
        return Ok(EvaluationRecord::no_overlap(fs.id, eirp_max_dbm));
    }

    let rx_point = fs.rx_point();
    let dist_m = haversine_m(tx, rx_point).max(1.0);
    let elevation_deg = elevation_angle_deg(rx_point, tx)?;
    let freq_hz = tx_range.center_hz();

    let n_samples = profile_sample_count(dist_m);
    let profile = terrain.height_profile(tx, rx_point, n_samples)?;

    let building_los_both_ends = terrain.height(tx.lat_deg, tx.lon_deg).source == TerrainSourceTag::Lidar
        && terrain.height(rx_point.lat_deg, rx_point.lon_deg).source == TerrainSourceTag::Lidar;

    let prop = path_loss(
        environment,
        dist_m,
        freq_hz,
        tx.height_m,
        fs.rx_height_agl_m,
        elevation_deg,
        &profile,
        building_los_both_ends,
        ctx,
        itm_confidence,
        clutter_confidence,
    )?;

    let bldg_pen_db = if tx_indoor {
        match ctx.fixed_building_loss_db {
            Some(fixed) => fixed,
            None => p2109_building_entry_loss(freq_hz, elevation_deg, ctx.building_type, building_confidence).0,
        }
    } else {
        0.0
    };

    let off_boresight_deg = fs.off_boresight_deg(tx)?;
    let rx_gain_dbi = fs.antenna_pattern.gain(off_boresight_deg, elevation_deg, freq_hz)?;
    let overlap_loss_db = overlap_loss_db(overlap_fraction);
    let feeder_loss_db = ctx.feeder_loss_override_db.unwrap_or(fs.feeder_loss_db);

    let rx_power_dbw = eirp_max_dbm - 30.0
        - ctx.body_loss_db
        - bldg_pen_db
        - prop.path_loss_db
        - prop.clutter_db
        + rx_gain_dbi
        - overlap_loss_db
        - ctx.polarization_loss_db
        - feeder_loss_db;

    let i_over_n_db = rx_power_dbw - fs.noise_floor_dbw();
    let margin_db = cfg.threshold_db - i_over_n_db;
    let eirp_limit_dbm = eirp_max_dbm + margin_db;

    let should_log = i_over_n_db > cfg.visibility_threshold_db || margin_db < 0.0;

    Ok(EvaluationRecord {
        fs_id: fs.id,
        i_over_n_db,
        margin_db,
        eirp_limit_dbm,
        path_loss_db: prop.path_loss_db + prop.clutter_db,
        model_label: prop.model_label,
        should_log,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use afc_antenna::AntennaPattern;
    use afc_channel_plan::{ChannelColor, ChannelProvenance};
    use afc_propagation::PropagationModel;
    use afc_terrain::SyntheticTerrain;

    fn sample_channel() -> Channel {
        Channel {
            start_freq_mhz: 5945.0,
            stop_freq_mhz: 5965.0,
            provenance: ChannelProvenance::InquiredChannel,
            operating_class: Some(131),
            channel_index: Some(0),
            eirp_limit_dbm: 36.0,
            color: ChannelColor::Green,
        }
    }

    fn sample_fs(start_freq_hz: f64) -> FsReceiver {
        FsReceiver::new(
            1,
            "TEST1".to_string(),
            "FX".to_string(),
            -74.01,
            40.01,
            30.0,
            -74.02,
            40.02,
            40.0,
            start_freq_hz,
            start_freq_hz + 20e6,
            38.0,
            AntennaPattern::F1245 { peak_gain_dbi: 38.0 },
            2.0,
            4.0,
        )
        .unwrap()
    }

    #[test]
    fn no_spectral_overlap_short_circuits_to_full_eirp() {
        let cfg = AfcConfig::default();
        let channel = sample_channel();
        let fs = sample_fs(6_100_000_000.0); // far outside the channel's 5945-5965 MHz
        let terrain = SyntheticTerrain::flat(10.0);
        let environment = Environment::Rural;
        let ctx = build_propagation_context(&cfg, false);
        let mut itm_conf = Confidence::Fixed(0.5);
        let mut clutter_conf = Confidence::Fixed(0.5);
        let mut bldg_conf = Confidence::Fixed(0.5);

        let rec = evaluate(
            GeoPoint::new(40.0, -74.0, 30.0),
            false,
            36.0,
            &channel,
            &fs,
            &terrain,
            environment,
            false,
            &cfg,
            &ctx,
            &mut itm_conf,
            &mut clutter_conf,
            &mut bldg_conf,
        )
        .unwrap();

        assert_eq!(rec.eirp_limit_dbm, 36.0);
        assert!(!rec.should_log);
    }

    #[test]
    fn closer_transmitter_yields_worse_margin() {
        let cfg = AfcConfig::default();
        let channel = sample_channel();
        let fs = sample_fs(5_950_000_000.0);
        let terrain = SyntheticTerrain::flat(10.0);
        let environment = Environment::Rural;
        let ctx = build_propagation_context(&cfg, false);

        let mut eval_at = |tx: GeoPoint| {
            let mut itm_conf = Confidence::Fixed(0.5);
            let mut clutter_conf = Confidence::Fixed(0.5);
            let mut bldg_conf = Confidence::Fixed(0.5);
            evaluate(
                tx, false, 36.0, &channel, &fs, &terrain, environment, false, &cfg, &ctx, &mut itm_conf,
                &mut clutter_conf, &mut bldg_conf,
            )
            .unwrap()
        };

        let near = eval_at(GeoPoint::new(40.005, -74.005, 30.0));
        let far = eval_at(GeoPoint::new(41.0, -75.0, 30.0));
        assert!(near.i_over_n_db > far.i_over_n_db);
        assert!(near.margin_db < far.margin_db);
    }

    #[test]
    fn indoor_deployment_adds_building_penetration_loss() {
        let cfg = AfcConfig::default();
        let channel = sample_channel();
        let fs = sample_fs(5_950_000_000.0);
        let terrain = SyntheticTerrain::flat(10.0);
        let environment = Environment::Rural;
        let tx = GeoPoint::new(40.02, -74.03, 3.0);

        let mut eval_indoor = |indoor: bool| {
            let ctx = build_propagation_context(&cfg, indoor);
            let mut itm_conf = Confidence::Fixed(0.5);
            let mut clutter_conf = Confidence::Fixed(0.5);
            let mut bldg_conf = Confidence::Fixed(0.5);
            evaluate(
                tx, indoor, 36.0, &channel, &fs, &terrain, environment, false, &cfg, &ctx, &mut itm_conf,
                &mut clutter_conf, &mut bldg_conf,
            )
            .unwrap()
        };

        let outdoor = eval_indoor(false);
        let indoor = eval_indoor(true);
        assert!(indoor.i_over_n_db < outdoor.i_over_n_db);
    }

    #[test]
    fn fcc_model_selector_label_is_reported() {
        let mut cfg = AfcConfig::default();
        cfg.propagation_model.kind = PropagationModel::Fcc6GhzRo;
        let channel = sample_channel();
        let fs = sample_fs(5_950_000_000.0);
        let terrain = SyntheticTerrain::flat(10.0);
        let environment = Environment::Urban;
        let ctx = build_propagation_context(&cfg, false);
        let mut itm_conf = Confidence::Fixed(0.5);
        let mut clutter_conf = Confidence::Fixed(0.5);
        let mut bldg_conf = Confidence::Fixed(0.5);

        let rec = evaluate(
            GeoPoint::new(40.02, -74.03, 20.0),
            false,
            36.0,
            &channel,
            &fs,
            &terrain,
            environment,
            false,
            &cfg,
            &ctx,
            &mut itm_conf,
            &mut clutter_conf,
            &mut bldg_conf,
        )
        .unwrap();
        assert!(rec.model_label.starts_with("FCC-6GHz-RO"));
    }
}
