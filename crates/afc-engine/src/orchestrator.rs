//! Analysis Orchestrator (§4.I): the three request modes built on top of
//! the shared evaluation kernel.
//!
//! - [`point_mode`]: worst-case EIRP limit per inquired channel over a
//!   location uncertainty region, sampled per in-range FS at that FS's
//!   closest boundary point, at three vertical levels.
//! - [`exclusion_zone_mode`]: the 360-azimuth distance, around one FS
//!   receiver, at which a transmitter at a fixed EIRP first clears the I/N
//!   threshold.
//! - [`heatmap_mode`]: worst-case I/N per grid cell over a bounding box.

use afc_channel_plan::{Channel, ChannelColor};
use afc_config::AfcConfig;
use afc_geo::{destination_point, GeoPoint};
use afc_incumbents::{FsReceiver, FsReceiverSet, RasRegion};
use afc_propagation::Confidence;
use afc_terrain::TerrainSource;
use afc_uncertainty::{RegionGeometry, UncertaintyRegion};
use serde::Serialize;

use crate::environment::EnvironmentSource;
use crate::error::Result;
use crate::kernel::{build_propagation_context, evaluate};
use crate::progress::{ProgressSink, ProgressTracker};

/// Collaborators every analysis mode draws on, bundled so a mode function
/// takes one reference instead of five.
pub struct ModeContext<'a> {
    pub config: &'a AfcConfig,
    pub fs_set: &'a FsReceiverSet,
    pub ras_regions: &'a [RasRegion],
    pub terrain: &'a dyn TerrainSource,
    pub environment: &'a dyn EnvironmentSource,
}

/// A channel after point-mode evaluation: either entirely removed from the
/// response (RAS blacklisted, invariant 9) or carried with a resolved
/// EIRP limit and color.
#[derive(Debug, Clone)]
pub struct EvaluatedChannel {
    pub channel: Channel,
    pub ras_blacklisted: bool,
}

/// The three vertical samples a given horizontal position (§4.I's
/// closest-boundary point) is evaluated at: center height and center
/// height ± the region's vertical uncertainty half-band.
fn vertical_samples(region: &UncertaintyRegion, lat_deg: f64, lon_deg: f64) -> [GeoPoint; 3] {
    let center_height_m = region.center().height_m;
    let half_band_m = region.height_uncertainty_m();
    [
        GeoPoint::new(lat_deg, lon_deg, (center_height_m - half_band_m).max(0.0)),
        GeoPoint::new(lat_deg, lon_deg, center_height_m),
        GeoPoint::new(lat_deg, lon_deg, center_height_m + half_band_m),
    ]
}

fn color_for_eirp(eirp_limit_dbm: f64, cfg: &AfcConfig) -> ChannelColor {
    if !eirp_limit_dbm.is_finite() || eirp_limit_dbm < cfg.min_eirp_dbm {
        ChannelColor::Red
    } else if eirp_limit_dbm < cfg.max_eirp_dbm {
        ChannelColor::Yellow
    } else {
        ChannelColor::Green
    }
}

/// Worst-case per-channel EIRP limit over a transmitter's location
/// uncertainty region.
pub fn point_mode(
    region: &UncertaintyRegion,
    indoor: bool,
    channels: Vec<Channel>,
    mctx: &ModeContext,
    progress: &mut dyn ProgressSink,
) -> Result<Vec<EvaluatedChannel>> {
    let center = region.center();
    let max_dist_m = region.max_dist_m();
    let radius_m = (mctx.config.max_link_distance_km * 1000.0).max(max_dist_m);

    let mut tracker = ProgressTracker::new(channels.len().max(1));
    let mut out = Vec::with_capacity(channels.len());

    for channel in channels {
        let band_start_hz = channel.start_freq_mhz * 1e6;
        let band_stop_hz = channel.stop_freq_mhz * 1e6;

        let ras_blacklisted = mctx
            .ras_regions
            .iter()
            .any(|ras| ras.overlaps_band(band_start_hz, band_stop_hz) && ras.intersects(center, max_dist_m, center.height_m.max(0.0)));
        if ras_blacklisted {
            out.push(EvaluatedChannel { channel, ras_blacklisted: true });
            tracker.advance(progress);
            continue;
        }

        let overlapping_fs = mctx
            .fs_set
            .iterate_intersecting(center, radius_m, band_stop_hz)
            .filter(|fs| fs.start_freq_hz < band_stop_hz && fs.stop_freq_hz > band_start_hz);

        let mut containment_forced = false;
        let mut worst_eirp_limit = channel.eirp_limit_dbm.min(mctx.config.max_eirp_dbm);

        for fs in overlapping_fs {
            let closest = region.closest_point(fs.rx_point());
            if closest.contains {
                containment_forced = true;
                break;
            }

            for pos in vertical_samples(region, closest.point.lat_deg, closest.point.lon_deg) {
                let environment = mctx.environment.environment_at(pos);
                let prop_ctx = build_propagation_context(mctx.config, indoor);
                let mut itm_conf = Confidence::Fixed(mctx.config.itm_confidence);
                let mut clutter_conf = Confidence::Fixed(mctx.config.p2108_confidence);
                let mut bldg_conf = Confidence::Fixed(0.5);
                let rec = evaluate(
                    pos,
                    indoor,
                    mctx.config.max_eirp_dbm,
                    &channel,
                    fs,
                    mctx.terrain,
                    environment,
                    false,
                    mctx.config,
                    &prop_ctx,
                    &mut itm_conf,
                    &mut clutter_conf,
                    &mut bldg_conf,
                )?;
                if rec.eirp_limit_dbm < worst_eirp_limit {
                    worst_eirp_limit = rec.eirp_limit_dbm;
                }
            }
        }

        let mut resolved = channel;
        if containment_forced {
            resolved.eirp_limit_dbm = f64::NEG_INFINITY;
            resolved.color = ChannelColor::Black;
        } else {
            let limit = worst_eirp_limit.min(mctx.config.max_eirp_dbm);
            resolved.eirp_limit_dbm = limit;
            resolved.color = color_for_eirp(limit, mctx.config);
        }

        out.push(EvaluatedChannel { channel: resolved, ras_blacklisted: false });
        tracker.advance(progress);
    }

    Ok(out)
}

/// Search radius ceiling for the exclusion-zone bisection: links never
/// need protecting beyond this even at the lowest propagation loss.
const EXCLUSION_MAX_DIST_M: f64 = 300_000.0;
const EXCLUSION_BISECTION_ITERS: usize = 40;
/// Bisection stops refining once the bracket is tighter than this, about
/// one arc-second of latitude at the equator.
const EXCLUSION_DIST_TOLERANCE_M: f64 = 0.111;

fn margin_at_distance(
    center: GeoPoint,
    azimuth_deg: f64,
    dist_m: f64,
    tx_height_m: f64,
    fs: &FsReceiver,
    channel: &Channel,
    eirp_dbm: f64,
    indoor: bool,
    mctx: &ModeContext,
) -> Result<f64> {
    let ground = destination_point(center, azimuth_deg, dist_m.max(1.0));
    let tx = GeoPoint::new(ground.lat_deg, ground.lon_deg, tx_height_m);
    let environment = mctx.environment.environment_at(tx);
    let ctx = build_propagation_context(mctx.config, indoor);
    let mut itm_conf = Confidence::Fixed(mctx.config.itm_confidence);
    let mut clutter_conf = Confidence::Fixed(mctx.config.p2108_confidence);
    let mut bldg_conf = Confidence::Fixed(0.5);
    let rec = evaluate(
        tx, indoor, eirp_dbm, channel, fs, mctx.terrain, environment, false, mctx.config, &ctx, &mut itm_conf,
        &mut clutter_conf, &mut bldg_conf,
    )?;
    Ok(rec.margin_db)
}

/// Bisects for the distance, along one azimuth from `fs`'s receiver, where
/// the margin crosses zero. Margin is monotone non-decreasing with
/// distance (testable property 3), so a sign change always brackets a
/// single root.
fn solve_exclusion_distance(
    center: GeoPoint,
    azimuth_deg: f64,
    tx_height_m: f64,
    fs: &FsReceiver,
    channel: &Channel,
    eirp_dbm: f64,
    indoor: bool,
    mctx: &ModeContext,
) -> Result<f64> {
    let mut lo = 1.0;
    let mut hi = EXCLUSION_MAX_DIST_M;

    let margin_lo = margin_at_distance(center, azimuth_deg, lo, tx_height_m, fs, channel, eirp_dbm, indoor, mctx)?;
    if margin_lo >= 0.0 {
        return Ok(0.0);
    }
    let margin_hi = margin_at_distance(center, azimuth_deg, hi, tx_height_m, fs, channel, eirp_dbm, indoor, mctx)?;
    if margin_hi < 0.0 {
        return Ok(hi);
    }

    for _ in 0..EXCLUSION_BISECTION_ITERS {
        if hi - lo < EXCLUSION_DIST_TOLERANCE_M {
            break;
        }
        let mid = 0.5 * (lo + hi);
        let margin_mid = margin_at_distance(center, azimuth_deg, mid, tx_height_m, fs, channel, eirp_dbm, indoor, mctx)?;
        if margin_mid < 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Ok(hi)
}

/// The 360-azimuth exclusion-zone boundary around `fs` for a transmitter
/// operating at `eirp_dbm` on `channel`.
pub fn exclusion_zone_mode(
    fs: &FsReceiver,
    channel: &Channel,
    eirp_dbm: f64,
    tx_height_m: f64,
    indoor: bool,
    num_azimuths: usize,
    mctx: &ModeContext,
    progress: &mut dyn ProgressSink,
) -> Result<Vec<GeoPoint>> {
    let center = fs.rx_point();
    let mut boundary = Vec::with_capacity(num_azimuths);
    let mut tracker = ProgressTracker::new(num_azimuths.max(1));

    for i in 0..num_azimuths {
        let azimuth_deg = 360.0 * i as f64 / num_azimuths as f64;
        let dist_m = solve_exclusion_distance(center, azimuth_deg, tx_height_m, fs, channel, eirp_dbm, indoor, mctx)?;
        boundary.push(destination_point(center, azimuth_deg, dist_m));
        tracker.advance(progress);
    }
    Ok(boundary)
}

/// One heatmap grid cell. `max_i_over_n_db` is `None`, never a sentinel
/// number, when no FS receiver is in range of this cell (Open Question #3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapCell {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub max_i_over_n_db: Option<f64>,
}

const METERS_PER_DEG_LAT: f64 = 111_320.0;

/// Rasterizes a lat/lon bounding box into cells of approximately
/// `cell_size_m` on a side (mean-latitude approximation) and reports the
/// worst-case I/N per cell against every FS receiver on `channel` within
/// range.
#[allow(clippy::too_many_arguments)]
pub fn heatmap_mode(
    min_lat_deg: f64,
    max_lat_deg: f64,
    min_lon_deg: f64,
    max_lon_deg: f64,
    cell_size_m: f64,
    tx_height_m: f64,
    indoor: bool,
    channel: &Channel,
    eirp_dbm: f64,
    mctx: &ModeContext,
    progress: &mut dyn ProgressSink,
) -> Result<Vec<HeatmapCell>> {
    let mean_lat_deg = 0.5 * (min_lat_deg + max_lat_deg);
    let meters_per_deg_lon = METERS_PER_DEG_LAT * mean_lat_deg.to_radians().cos().max(1e-6);

    let lat_step_deg = cell_size_m / METERS_PER_DEG_LAT;
    let lon_step_deg = cell_size_m / meters_per_deg_lon;

    let n_lat = ((max_lat_deg - min_lat_deg) / lat_step_deg).ceil().max(1.0) as usize;
    let n_lon = ((max_lon_deg - min_lon_deg) / lon_step_deg).ceil().max(1.0) as usize;

    let band_start_hz = channel.start_freq_mhz * 1e6;
    let band_stop_hz = channel.stop_freq_mhz * 1e6;
    let radius_m = mctx.config.max_link_distance_km * 1000.0;

    let mut cells = Vec::with_capacity(n_lat * n_lon);
    let mut tracker = ProgressTracker::new((n_lat * n_lon).max(1));

    for iy in 0..n_lat {
        for ix in 0..n_lon {
            let lat_deg = min_lat_deg + (iy as f64 + 0.5) * lat_step_deg;
            let lon_deg = min_lon_deg + (ix as f64 + 0.5) * lon_step_deg;
            let tx = GeoPoint::new(lat_deg, lon_deg, tx_height_m);
            let environment = mctx.environment.environment_at(tx);
            let ctx = build_propagation_context(mctx.config, indoor);

            let mut max_i_over_n_db: Option<f64> = None;
            for fs in mctx.fs_set.iterate_intersecting(tx, radius_m, band_stop_hz) {
                if !(fs.start_freq_hz < band_stop_hz && fs.stop_freq_hz > band_start_hz) {
                    continue;
                }
                let mut itm_conf = Confidence::Fixed(mctx.config.itm_confidence);
                let mut clutter_conf = Confidence::Fixed(mctx.config.p2108_confidence);
                let mut bldg_conf = Confidence::Fixed(0.5);
                let rec = evaluate(
                    tx, indoor, eirp_dbm, channel, fs, mctx.terrain, environment, false, mctx.config, &ctx,
                    &mut itm_conf, &mut clutter_conf, &mut bldg_conf,
                )?;
                if rec.i_over_n_db.is_finite() {
                    max_i_over_n_db = Some(max_i_over_n_db.map_or(rec.i_over_n_db, |m: f64| m.max(rec.i_over_n_db)));
                }
            }

            cells.push(HeatmapCell { lat_deg, lon_deg, max_i_over_n_db });
            tracker.advance(progress);
        }
    }

    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use afc_antenna::AntennaPattern;
    use afc_channel_plan::ChannelProvenance;
    use afc_config::AfcConfig;
    use afc_incumbents::FsReceiver;
    use afc_terrain::SyntheticTerrain;
    use afc_uncertainty::Ellipse;

    use crate::environment::FixedEnvironment;
    use crate::progress::NullProgressSink;

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

    fn sample_fs(lon: f64, lat: f64, id: i64) -> FsReceiver {
        FsReceiver::new(
            id,
            format!("TEST{id}"),
            "FX".to_string(),
            lon,
            lat,
            30.0,
            lon - 0.01,
            lat - 0.01,
            40.0,
            5_950_000_000.0,
            5_970_000_000.0,
            38.0,
            AntennaPattern::F1245 { peak_gain_dbi: 38.0 },
            2.0,
            4.0,
        )
        .unwrap()
    }

    #[test]
    fn point_mode_reduces_eirp_near_fs_receiver() {
        let cfg = AfcConfig::default();
        let fs = sample_fs(-74.0, 40.0, 1);
        let fs_set = FsReceiverSet::from_unsorted(vec![fs]);
        let terrain = SyntheticTerrain::flat(10.0);
        let environment = FixedEnvironment(afc_propagation::Environment::Rural);
        let ras_regions: Vec<RasRegion> = Vec::new();
        let mctx = ModeContext { config: &cfg, fs_set: &fs_set, ras_regions: &ras_regions, terrain: &terrain, environment: &environment };

        let region = UncertaintyRegion::Ellipse(Ellipse {
            center_lat_deg: 40.001,
            center_lon_deg: -74.001,
            center_height_m: 3.0,
            semi_major_m: 50.0,
            semi_minor_m: 50.0,
            orientation_from_north_deg: 0.0,
            height_uncertainty_m: 1.0,
        });

        let mut sink = NullProgressSink;
        let evaluated = point_mode(&region, false, vec![sample_channel()], &mctx, &mut sink).unwrap();
        assert_eq!(evaluated.len(), 1);
        assert!(evaluated[0].channel.eirp_limit_dbm <= cfg.max_eirp_dbm);
        assert!(!evaluated[0].ras_blacklisted);
    }

    #[test]
    fn point_mode_blacklists_channel_overlapping_ras() {
        let cfg = AfcConfig::default();
        let fs_set = FsReceiverSet::from_unsorted(Vec::new());
        let terrain = SyntheticTerrain::flat(10.0);
        let environment = FixedEnvironment(afc_propagation::Environment::Rural);
        let ras_regions = vec![RasRegion {
            geometry: afc_incumbents::RasGeometry::FixedRadiusCircle { center_lat_deg: 40.0, center_lon_deg: -74.0, radius_m: 10_000.0 },
            start_freq_hz: 5_940_000_000.0,
            stop_freq_hz: 5_970_000_000.0,
        }];
        let mctx = ModeContext { config: &cfg, fs_set: &fs_set, ras_regions: &ras_regions, terrain: &terrain, environment: &environment };

        let region = UncertaintyRegion::Ellipse(Ellipse {
            center_lat_deg: 40.0,
            center_lon_deg: -74.0,
            center_height_m: 3.0,
            semi_major_m: 10.0,
            semi_minor_m: 10.0,
            orientation_from_north_deg: 0.0,
            height_uncertainty_m: 1.0,
        });

        let mut sink = NullProgressSink;
        let evaluated = point_mode(&region, false, vec![sample_channel()], &mctx, &mut sink).unwrap();
        assert!(evaluated[0].ras_blacklisted);
    }

    #[test]
    fn exclusion_zone_boundary_grows_with_eirp() {
        let cfg = AfcConfig::default();
        let fs = sample_fs(-74.0, 40.0, 1);
        let fs_set = FsReceiverSet::from_unsorted(vec![fs.clone()]);
        let terrain = SyntheticTerrain::flat(10.0);
        let environment = FixedEnvironment(afc_propagation::Environment::Rural);
        let ras_regions: Vec<RasRegion> = Vec::new();
        let mctx = ModeContext { config: &cfg, fs_set: &fs_set, ras_regions: &ras_regions, terrain: &terrain, environment: &environment };

        let channel = sample_channel();
        let mut sink = NullProgressSink;
        let low = exclusion_zone_mode(&fs, &channel, 10.0, 3.0, false, 8, &mctx, &mut sink).unwrap();
        let high = exclusion_zone_mode(&fs, &channel, 36.0, 3.0, false, 8, &mctx, &mut sink).unwrap();

        let low_dist: f64 = low.iter().map(|p| afc_geo::haversine_m(fs.rx_point(), *p)).sum();
        let high_dist: f64 = high.iter().map(|p| afc_geo::haversine_m(fs.rx_point(), *p)).sum();
        assert!(high_dist >= low_dist);
    }

    #[test]
    fn contained_fs_outside_channel_band_does_not_blacken_channel() {
        let cfg = AfcConfig::default();
        // FS receiver sits inside the region, but its assigned band is
        // entirely below the inquired channel's band: it must not force
        // the channel black (spec.md:160's overlap qualifier).
        let fs = FsReceiver::new(
            1,
            "TEST1".to_string(),
            "FX".to_string(),
            -74.0,
            40.0,
            30.0,
            -74.01,
            40.01,
            40.0,
            5_700_000_000.0,
            5_720_000_000.0,
            38.0,
            AntennaPattern::F1245 { peak_gain_dbi: 38.0 },
            2.0,
            4.0,
        )
        .unwrap();
        let fs_set = FsReceiverSet::from_unsorted(vec![fs]);
        let terrain = SyntheticTerrain::flat(10.0);
        let environment = FixedEnvironment(afc_propagation::Environment::Rural);
        let ras_regions: Vec<RasRegion> = Vec::new();
        let mctx = ModeContext { config: &cfg, fs_set: &fs_set, ras_regions: &ras_regions, terrain: &terrain, environment: &environment };

        let region = UncertaintyRegion::Ellipse(Ellipse {
            center_lat_deg: 40.0,
            center_lon_deg: -74.0,
            center_height_m: 3.0,
            semi_major_m: 10.0,
            semi_minor_m: 10.0,
            orientation_from_north_deg: 0.0,
            height_uncertainty_m: 1.0,
        });

        let mut sink = NullProgressSink;
        let evaluated = point_mode(&region, false, vec![sample_channel()], &mctx, &mut sink).unwrap();
        assert_ne!(evaluated[0].channel.color, ChannelColor::Black);
        assert!(evaluated[0].channel.eirp_limit_dbm.is_finite());
    }

    #[test]
    fn color_boundaries_match_closed_inclusive_yellow_range() {
        let cfg = AfcConfig::default();
        assert_eq!(color_for_eirp(cfg.min_eirp_dbm, &cfg), ChannelColor::Yellow);
        assert_eq!(color_for_eirp(cfg.min_eirp_dbm - 0.001, &cfg), ChannelColor::Red);
        assert_eq!(color_for_eirp(cfg.max_eirp_dbm, &cfg), ChannelColor::Green);
    }

    #[test]
    fn heatmap_reports_none_when_no_fs_in_range() {
        let cfg = AfcConfig::default();
        let fs_set = FsReceiverSet::from_unsorted(Vec::new());
        let terrain = SyntheticTerrain::flat(10.0);
        let environment = FixedEnvironment(afc_propagation::Environment::Rural);
        let ras_regions: Vec<RasRegion> = Vec::new();
        let mctx = ModeContext { config: &cfg, fs_set: &fs_set, ras_regions: &ras_regions, terrain: &terrain, environment: &environment };

        let channel = sample_channel();
        let mut sink = NullProgressSink;
        let cells = heatmap_mode(40.0, 40.01, -74.0, -73.99, 2000.0, 3.0, false, &channel, 30.0, &mctx, &mut sink).unwrap();
        assert!(!cells.is_empty());
        assert!(cells.iter().all(|c| c.max_i_over_n_db.is_none()));
    }
}
