//! AFC Engine CLI
//!
//! Drives one analysis run from a request/config JSON pair on disk (§6 CLI
//! surface):
//!
//!   afc-cli --request-type PointAnalysis \
//!           --state-root ./state \
//!           --input-file-path request.json \
//!           --config-file-path config.json \
//!           --output-file-path response.json.gz \
//!           --temp-dir ./tmp

mod io;

use std::path::PathBuf;
use std::process::ExitCode;

use afc_channel_plan::{Channel, ChannelColor, ChannelProvenance};
use afc_config::AfcConfig;
use afc_engine::environment::FixedEnvironment;
use afc_engine::orchestrator::{exclusion_zone_mode, heatmap_mode, ModeContext};
use afc_engine::progress::FileProgressSink;
use afc_engine::request::AvailableSpectrumInquiryRequest;
use afc_engine::response::AvailableSpectrumInquiryResponseEnvelope;
use afc_engine::{error_response, run_point_analysis};
use afc_incumbents::FsReceiverSet;
use afc_propagation::Environment;
use afc_terrain::SyntheticTerrain;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum RequestType {
    PointAnalysis,
    ApAnalysis,
    HeatmapAnalysis,
    ExclusionZoneAnalysis,
    #[value(name = "AP-AFC")]
    ApAfc,
}

#[derive(Parser, Debug)]
#[command(name = "afc-cli", about = "Run one AFC interference analysis against a request/config JSON pair")]
struct Args {
    /// Which analysis mode to run.
    #[arg(long, value_enum)]
    request_type: RequestType,

    /// Root directory the config file's `ulsDatabase`/`rasDatabase` paths
    /// are resolved against.
    #[arg(long, default_value = ".")]
    state_root: PathBuf,

    /// Request JSON (RAT-AFC `AvailableSpectrumInquiryRequest` for
    /// PointAnalysis/APAnalysis/AP-AFC; a CLI-local schema for
    /// HeatmapAnalysis/ExclusionZoneAnalysis, see [`io`]).
    #[arg(long)]
    input_file_path: PathBuf,

    /// Engine configuration JSON (§4.K / §6).
    #[arg(long)]
    config_file_path: PathBuf,

    /// Where the gzip-compressed response JSON is written.
    #[arg(long)]
    output_file_path: PathBuf,

    /// Directory for `progress.txt` and the diagnostic artifacts.
    #[arg(long, default_value = "./afc-tmp")]
    temp_dir: PathBuf,

    /// `error`, `warn`, `info`, `debug`, or `trace`.
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// CLI-local request shape for `ExclusionZoneAnalysis` (no standardized
/// wire schema is defined for this mode; §4.I only specifies its
/// algorithm, not its request envelope).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExclusionZoneRequestDto {
    fs_id: i64,
    start_freq_mhz: f64,
    stop_freq_mhz: f64,
    eirp_dbm: f64,
    tx_height_m: f64,
    #[serde(default)]
    indoor: bool,
    #[serde(default = "default_num_azimuths")]
    num_azimuths: usize,
}

fn default_num_azimuths() -> usize {
    360
}

/// CLI-local request shape for `HeatmapAnalysis`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeatmapRequestDto {
    min_lat_deg: f64,
    max_lat_deg: f64,
    min_lon_deg: f64,
    max_lon_deg: f64,
    cell_size_m: f64,
    start_freq_mhz: f64,
    stop_freq_mhz: f64,
    eirp_dbm: f64,
    tx_height_m: f64,
    #[serde(default)]
    indoor: bool,
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn config_summary(cfg: &AfcConfig) -> Vec<(&'static str, String)> {
    vec![
        ("regionStr", format!("{:?}", cfg.region_str)),
        ("minEirpDbm", cfg.min_eirp_dbm.to_string()),
        ("maxEirpDbm", cfg.max_eirp_dbm.to_string()),
        ("thresholdDb", cfg.threshold_db.to_string()),
        ("propagationModel", format!("{:?}", cfg.propagation_model.kind)),
        ("fixAnomalousEntries", cfg.fix_anomalous_entries.to_string()),
    ]
}

fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    std::fs::create_dir_all(&args.temp_dir).with_context(|| format!("creating temp dir {:?}", args.temp_dir))?;

    let config_bytes = std::fs::read(&args.config_file_path).with_context(|| format!("reading {:?}", args.config_file_path))?;
    let config = AfcConfig::from_json(&config_bytes).context("parsing config JSON")?;

    let fs_records = io::read_fs_records(&args.state_root.join(&config.uls_database))?;
    let (fs_set, load_report) = afc_engine::loaders::load_fs_window(fs_records, config.fix_anomalous_entries);
    let ras_regions = io::read_ras_regions(&args.state_root.join(&config.ras_database))?;
    info!(fs_count = fs_set.len(), ras_count = ras_regions.len(), fixed = load_report.num_fixed, dropped = load_report.num_ignored_invalid, "incumbent set loaded");

    io::write_anomaly_csv_gz(&args.temp_dir.join("fs_anom.csv.gz"), &load_report.anomalies)?;

    // Real terrain-tile and population-density-grid readers are out of
    // scope (§1); the CLI runs against a flat terrain and a single
    // caller-independent rural environment everywhere.
    let terrain = SyntheticTerrain::flat(0.0);
    let environment = FixedEnvironment(Environment::Rural);

    let mut progress = FileProgressSink::new(args.temp_dir.join("progress.txt"));

    let request_id = match args.request_type {
        RequestType::PointAnalysis | RequestType::ApAnalysis | RequestType::ApAfc => {
            let input_bytes = std::fs::read(&args.input_file_path).with_context(|| format!("reading {:?}", args.input_file_path))?;
            let request: AvailableSpectrumInquiryRequest = serde_json::from_slice(&input_bytes).context("parsing request JSON")?;
            let request_id = request.request_id.clone();
            let now = chrono::Utc::now();

            let response = match run_point_analysis(&request, &config, &fs_set, &ras_regions, &terrain, &environment, &mut progress, now) {
                Ok(resp) => resp,
                Err(err) => {
                    warn!(error = %err, "analysis failed, writing error response");
                    error_response(&request_id, &err, now)
                }
            };

            let envelope = AvailableSpectrumInquiryResponseEnvelope {
                version: "1.4".to_string(),
                available_spectrum_inquiry_responses: vec![response],
            };
            io::write_json_gz(&args.output_file_path, &envelope)?;
            request_id
        }
        RequestType::ExclusionZoneAnalysis => {
            let input_bytes = std::fs::read(&args.input_file_path).with_context(|| format!("reading {:?}", args.input_file_path))?;
            let dto: ExclusionZoneRequestDto = serde_json::from_slice(&input_bytes).context("parsing exclusion-zone request JSON")?;
            let fs = fs_set.find_by_id(dto.fs_id)?;
            let channel = Channel {
                start_freq_mhz: dto.start_freq_mhz,
                stop_freq_mhz: dto.stop_freq_mhz,
                provenance: ChannelProvenance::InquiredFrequency,
                operating_class: None,
                channel_index: None,
                eirp_limit_dbm: dto.eirp_dbm,
                color: ChannelColor::Green,
            };
            let mctx = ModeContext { config: &config, fs_set: &fs_set, ras_regions: &ras_regions, terrain: &terrain, environment: &environment };
            let boundary = exclusion_zone_mode(fs, &channel, dto.eirp_dbm, dto.tx_height_m, dto.indoor, dto.num_azimuths, &mctx, &mut progress)?;
            let points: Vec<_> = boundary.iter().map(|p| (p.lat_deg, p.lon_deg)).collect();
            io::write_json_gz(&args.output_file_path, &points)?;
            format!("exclusion-zone-fs-{}", dto.fs_id)
        }
        RequestType::HeatmapAnalysis => {
            let input_bytes = std::fs::read(&args.input_file_path).with_context(|| format!("reading {:?}", args.input_file_path))?;
            let dto: HeatmapRequestDto = serde_json::from_slice(&input_bytes).context("parsing heatmap request JSON")?;
            let channel = Channel {
                start_freq_mhz: dto.start_freq_mhz,
                stop_freq_mhz: dto.stop_freq_mhz,
                provenance: ChannelProvenance::InquiredFrequency,
                operating_class: None,
                channel_index: None,
                eirp_limit_dbm: dto.eirp_dbm,
                color: ChannelColor::Green,
            };
            let mctx = ModeContext { config: &config, fs_set: &fs_set, ras_regions: &ras_regions, terrain: &terrain, environment: &environment };
            let cells = heatmap_mode(
                dto.min_lat_deg, dto.max_lat_deg, dto.min_lon_deg, dto.max_lon_deg, dto.cell_size_m, dto.tx_height_m, dto.indoor,
                &channel, dto.eirp_dbm, &mctx, &mut progress,
            )?;
            io::write_json_gz(&args.output_file_path, &cells)?;
            "heatmap".to_string()
        }
    };

    io::write_user_inputs_csv_gz(
        &args.temp_dir.join("userInputs.csv.gz"),
        &request_id,
        &format!("{:?}", args.request_type),
        &config_summary(&config),
    )?;

    // `exc_thr.csv.gz` (per-link diagnostic export) and `results.kmz`
    // (map overlay) are not produced: both require the exceedance-log
    // replay and KML rendering pipeline the system overview scopes out.
    info!("exc_thr.csv.gz and results.kmz are not produced by this build; see fs_anom.csv.gz and the response JSON");
    info!(output = ?args.output_file_path, "analysis complete");
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("afc-cli: {err:#}");
            ExitCode::FAILURE
        }
    }
}
