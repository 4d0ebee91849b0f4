//! File-format boundary for the `afc-cli` binary: JSON loaders standing in
//! for the real ULS/RAS database readers (§1 Non-goals — reading those
//! binary/SQL formats is out of scope), plus the gzip-compressed JSON and
//! CSV artifact writers named in §6.
//!
//! The `uls_database`/`ras_database` config keys are read here as plain
//! JSON files; a production deployment would point them at a real
//! database and swap in a different [`afc_engine::loaders::FsReceiverLoader`]/
//! `RasLoader` implementation without touching the engine crates.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use afc_antenna::AntennaPattern;
use afc_engine::loaders::{AnomalyRecord, RawFsRecord};
use afc_incumbents::RasRegion;
use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

/// On-disk shape of one `uls_database` entry. Mirrors [`RawFsRecord`]
/// field-for-field so the anomaly repair policy in `afc-engine` sees
/// exactly the same optionality a real ULS extract would have.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FsRecordDto {
    pub id: i64,
    pub callsign: String,
    pub radio_service_code: String,
    pub rx_lon_deg: f64,
    pub rx_lat_deg: f64,
    #[serde(default)]
    pub rx_height_agl_m: Option<f64>,
    pub tx_lon_deg: f64,
    pub tx_lat_deg: f64,
    #[serde(default)]
    pub tx_height_m: Option<f64>,
    #[serde(default)]
    pub start_freq_hz: Option<f64>,
    #[serde(default)]
    pub stop_freq_hz: Option<f64>,
    #[serde(default)]
    pub peak_gain_dbi: Option<f64>,
    #[serde(default)]
    pub antenna_pattern: Option<AntennaPattern>,
    #[serde(default)]
    pub feeder_loss_db: Option<f64>,
    #[serde(default)]
    pub noise_figure_db: Option<f64>,
}

impl From<FsRecordDto> for RawFsRecord {
    fn from(d: FsRecordDto) -> Self {
        RawFsRecord {
            id: d.id,
            callsign: d.callsign,
            radio_service_code: d.radio_service_code,
            rx_lon_deg: d.rx_lon_deg,
            rx_lat_deg: d.rx_lat_deg,
            rx_height_agl_m: d.rx_height_agl_m,
            tx_lon_deg: d.tx_lon_deg,
            tx_lat_deg: d.tx_lat_deg,
            tx_height_m: d.tx_height_m,
            start_freq_hz: d.start_freq_hz,
            stop_freq_hz: d.stop_freq_hz,
            peak_gain_dbi: d.peak_gain_dbi,
            antenna_pattern: d.antenna_pattern,
            feeder_loss_db: d.feeder_loss_db,
            noise_figure_db: d.noise_figure_db,
        }
    }
}

/// Reads `path` as a JSON array of [`FsRecordDto`]. Returns an empty list
/// if the file is absent, matching an "analysis region has no registered
/// incumbents" run rather than failing the whole request.
pub fn read_fs_records(path: &Path) -> Result<Vec<RawFsRecord>> {
    if !path.exists() {
        tracing::warn!(?path, "uls_database file not found, proceeding with an empty incumbent set");
        return Ok(Vec::new());
    }
    let file = File::open(path).with_context(|| format!("opening {path:?}"))?;
    let dtos: Vec<FsRecordDto> = serde_json::from_reader(BufReader::new(file)).with_context(|| format!("parsing {path:?}"))?;
    Ok(dtos.into_iter().map(RawFsRecord::from).collect())
}

/// Reads `path` as a JSON array of [`RasRegion`] (the core type
/// deserializes directly; RAS geometry carries no private/derived fields).
pub fn read_ras_regions(path: &Path) -> Result<Vec<RasRegion>> {
    if !path.exists() {
        tracing::warn!(?path, "ras_database file not found, proceeding with no RAS exclusion zones");
        return Ok(Vec::new());
    }
    let file = File::open(path).with_context(|| format!("opening {path:?}"))?;
    let regions = serde_json::from_reader(BufReader::new(file)).with_context(|| format!("parsing {path:?}"))?;
    Ok(regions)
}

/// Serializes `value` to gzip-compressed JSON at `path` (§6: every
/// persisted artifact is gzip'd).
pub fn write_json_gz<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {path:?}"))?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    serde_json::to_writer_pretty(&mut encoder, value)?;
    encoder.finish()?;
    Ok(())
}

/// Writes `fs_anom.csv.gz`: one row per FS record the anomaly policy
/// touched (fixed or dropped), matching §6's artifact list.
pub fn write_anomaly_csv_gz(path: &Path, anomalies: &[AnomalyRecord]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {path:?}"))?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut writer = csv::Writer::from_writer(encoder);
    writer.write_record(["fsId", "callsign", "rxLonDeg", "rxLatDeg", "fixed", "reason"])?;
    for a in anomalies {
        writer.write_record([
            a.fs_id.to_string(),
            a.callsign.clone(),
            a.rx_lon_deg.to_string(),
            a.rx_lat_deg.to_string(),
            a.fixed.to_string(),
            a.reason.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes `userInputs.csv.gz`: a one-row echo of the request's identifying
/// fields and the config keys that drove this run, so a downstream
/// reviewer can reconstruct what was asked without re-reading both JSON
/// files. This is a convenience export, not the full wire-format replay
/// `exc_thr.csv.gz` would carry for per-link diagnostics (out of scope, §1).
pub fn write_user_inputs_csv_gz(path: &Path, request_id: &str, request_type: &str, config_summary: &[(&str, String)]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {path:?}"))?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut writer = csv::Writer::from_writer(encoder);
    writer.write_record(["key", "value"])?;
    writer.write_record(["requestId", request_id])?;
    writer.write_record(["requestType", request_type])?;
    for (k, v) in config_summary {
        writer.write_record([*k, v.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Flushes any buffered writer explicitly, for callers that want to be sure
/// a gzip trailer landed on disk before reporting success.
pub fn flush(w: &mut impl Write) -> Result<()> {
    w.flush()?;
    Ok(())
}
