//! Incumbent database loading boundary (§4.G `loadFsWindow`, §7 anomaly
//! recovery policy).
//!
//! Reading the actual ULS/RAS database files is out of scope (§1): this
//! module defines the `FsReceiverLoader`/`RasLoader` traits a real reader
//! would implement (returning raw, possibly-incomplete records) and owns
//! the anomaly repair/drop policy that turns those raw records into a
//! validated [`FsReceiverSet`], which squarely belongs to the core.

use afc_antenna::AntennaPattern;
use afc_incumbents::{FsReceiver, FsReceiverSet, RasRegion};

use crate::error::{EngineError, Result};

/// A raw FS record as read from the incumbent database, before the
/// anomaly repair/drop policy runs. Fields the source database may leave
/// unpopulated are `Option`.
#[derive(Debug, Clone)]
pub struct RawFsRecord {
    pub id: i64,
    pub callsign: String,
    pub radio_service_code: String,
    pub rx_lon_deg: f64,
    pub rx_lat_deg: f64,
    pub rx_height_agl_m: Option<f64>,
    pub tx_lon_deg: f64,
    pub tx_lat_deg: f64,
    pub tx_height_m: Option<f64>,
    pub start_freq_hz: Option<f64>,
    pub stop_freq_hz: Option<f64>,
    pub peak_gain_dbi: Option<f64>,
    pub antenna_pattern: Option<AntennaPattern>,
    pub feeder_loss_db: Option<f64>,
    pub noise_figure_db: Option<f64>,
}

/// One row of `fs_anom.csv.gz` (§6): an FS record the repair/drop policy
/// touched, whether it was fixed or dropped, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyRecord {
    pub fs_id: i64,
    pub callsign: String,
    pub rx_lon_deg: f64,
    pub rx_lat_deg: f64,
    pub fixed: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub num_fixed: usize,
    pub num_ignored_invalid: usize,
    pub anomalies: Vec<AnomalyRecord>,
}

/// External collaborator: the FS/ULS database reader (§1).
pub trait FsReceiverLoader {
    fn load_window(
        &self,
        min_lat_deg: f64,
        max_lat_deg: f64,
        min_lon_deg: f64,
        max_lon_deg: f64,
        min_freq_hz: f64,
        max_freq_hz: f64,
    ) -> Result<Vec<RawFsRecord>>;
}

/// External collaborator: the RAS exclusion-zone database reader (§1).
pub trait RasLoader {
    fn load_all(&self) -> Result<Vec<RasRegion>>;
}

/// Service-code-keyed repair defaults (§7 "the repair mapping is an
/// enumerated table keyed on service code").
struct RepairDefaults {
    bandwidth_hz: f64,
    peak_gain_dbi: f64,
    tx_height_m: f64,
    rx_height_agl_m: f64,
    feeder_loss_db: f64,
    noise_figure_db: f64,
}

fn repair_defaults(service_code: &str) -> RepairDefaults {
    match service_code {
        "TP" => RepairDefaults {
            bandwidth_hz: 30e6,
            peak_gain_dbi: 34.0,
            tx_height_m: 30.0,
            rx_height_agl_m: 30.0,
            feeder_loss_db: 3.0,
            noise_figure_db: 5.0,
        },
        "TI" | "TS" => RepairDefaults {
            bandwidth_hz: 10e6,
            peak_gain_dbi: 30.0,
            tx_height_m: 15.0,
            rx_height_agl_m: 15.0,
            feeder_loss_db: 2.0,
            noise_figure_db: 6.0,
        },
        // "FX"/"FXO" fixed-point microwave and any other/unknown code.
        _ => RepairDefaults {
            bandwidth_hz: 20e6,
            peak_gain_dbi: 38.0,
            tx_height_m: 30.0,
            rx_height_agl_m: 30.0,
            feeder_loss_db: 2.0,
            noise_figure_db: 4.0,
        },
    }
}

/// Minimum receiver/transmitter height above terrain the geometry model
/// tolerates (§3 `FsReceiver` invariant "heights >= minimum-above-terrain").
pub const MIN_HEIGHT_ABOVE_TERRAIN_M: f64 = 1.0;

/// Applies the §7 anomaly recovery policy to a window of raw records,
/// producing a validated [`FsReceiverSet`] plus the load report that feeds
/// `fs_anom.csv.gz`. When `fix_anomalous_entries` is `false`, any record
/// with a missing required field is dropped rather than repaired.
pub fn load_fs_window(raw: Vec<RawFsRecord>, fix_anomalous_entries: bool) -> (FsReceiverSet, LoadReport) {
    let mut report = LoadReport::default();
    let mut receivers = Vec::with_capacity(raw.len());

    for rec in raw {
        match resolve_record(&rec, fix_anomalous_entries) {
            ResolvedRecord::Ok(fs, fixed) => {
                if fixed {
                    report.num_fixed += 1;
                    report.anomalies.push(AnomalyRecord {
                        fs_id: rec.id,
                        callsign: rec.callsign.clone(),
                        rx_lon_deg: rec.rx_lon_deg,
                        rx_lat_deg: rec.rx_lat_deg,
                        fixed: true,
                        reason: "missing field repaired from service-code defaults".to_string(),
                    });
                }
                receivers.push(fs);
            }
            ResolvedRecord::Drop(reason) => {
                report.num_ignored_invalid += 1;
                report.anomalies.push(AnomalyRecord {
                    fs_id: rec.id,
                    callsign: rec.callsign.clone(),
                    rx_lon_deg: rec.rx_lon_deg,
                    rx_lat_deg: rec.rx_lat_deg,
                    fixed: false,
                    reason,
                });
            }
        }
    }

    (FsReceiverSet::from_unsorted(receivers), report)
}

enum ResolvedRecord {
    Ok(FsReceiver, bool),
    Drop(String),
}

fn resolve_record(rec: &RawFsRecord, fix_anomalous_entries: bool) -> ResolvedRecord {
    let missing_any = rec.rx_height_agl_m.is_none()
        || rec.tx_height_m.is_none()
        || rec.start_freq_hz.is_none()
        || rec.stop_freq_hz.is_none()
        || rec.peak_gain_dbi.is_none()
        || rec.feeder_loss_db.is_none()
        || rec.noise_figure_db.is_none();

    if missing_any && !fix_anomalous_entries {
        return ResolvedRecord::Drop("missing required field(s), repair disabled".to_string());
    }

    let defaults = repair_defaults(&rec.radio_service_code);
    let rx_height_agl_m = rec.rx_height_agl_m.unwrap_or(defaults.rx_height_agl_m);
    let tx_height_m = rec.tx_height_m.unwrap_or(defaults.tx_height_m);
    let (start_freq_hz, stop_freq_hz) = match (rec.start_freq_hz, rec.stop_freq_hz) {
        (Some(s), Some(e)) => (s, e),
        (Some(s), None) => (s, s + defaults.bandwidth_hz),
        (None, Some(e)) => (e - defaults.bandwidth_hz, e),
        (None, None) => return ResolvedRecord::Drop("missing emission designator".to_string()),
    };
    let peak_gain_dbi = rec.peak_gain_dbi.unwrap_or(defaults.peak_gain_dbi);
    let feeder_loss_db = rec.feeder_loss_db.unwrap_or(defaults.feeder_loss_db);
    let noise_figure_db = rec.noise_figure_db.unwrap_or(defaults.noise_figure_db);
    let antenna_pattern = rec.antenna_pattern.clone().unwrap_or(AntennaPattern::F1245 { peak_gain_dbi });

    if rx_height_agl_m < MIN_HEIGHT_ABOVE_TERRAIN_M || tx_height_m < MIN_HEIGHT_ABOVE_TERRAIN_M {
        return ResolvedRecord::Drop("height below minimum above terrain".to_string());
    }

    match FsReceiver::new(
        rec.id,
        rec.callsign.clone(),
        rec.radio_service_code.clone(),
        rec.rx_lon_deg,
        rec.rx_lat_deg,
        rx_height_agl_m,
        rec.tx_lon_deg,
        rec.tx_lat_deg,
        tx_height_m,
        start_freq_hz,
        stop_freq_hz,
        peak_gain_dbi,
        antenna_pattern,
        feeder_loss_db,
        noise_figure_db,
    ) {
        Ok(fs) => ResolvedRecord::Ok(fs, missing_any),
        Err(e) => ResolvedRecord::Drop(e.to_string()),
    }
}

/// Convenience entry point composing a `FsReceiverLoader` call with the
/// anomaly policy.
pub fn load_fs_window_from<L: FsReceiverLoader>(
    loader: &L,
    min_lat_deg: f64,
    max_lat_deg: f64,
    min_lon_deg: f64,
    max_lon_deg: f64,
    min_freq_hz: f64,
    max_freq_hz: f64,
    fix_anomalous_entries: bool,
) -> Result<(FsReceiverSet, LoadReport)> {
    let raw = loader.load_window(min_lat_deg, max_lat_deg, min_lon_deg, max_lon_deg, min_freq_hz, max_freq_hz)?;
    Ok(load_fs_window(raw, fix_anomalous_entries))
}

pub fn load_ras_from<L: RasLoader>(loader: &L) -> Result<Vec<RasRegion>> {
    loader.load_all().map_err(|e: EngineError| e)
}
