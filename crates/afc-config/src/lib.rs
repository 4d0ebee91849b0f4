//! Config/Input State
//!
//! The §4.K / §6 "Configuration file" keys, deserialized from a JSON config
//! document and carrying the source's documented defaults. This crate owns
//! no I/O; `afc-cli` reads the file and hands the parsed bytes to
//! [`AfcConfig::from_json`].

use afc_propagation::{BuildingType, PropagationModel};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("unknown propagation model kind: {0}")]
    UnknownModelKind(String),
    #[error("unknown building-penetration-loss kind: {0}")]
    UnknownBuildingPenetrationKind(String),
    #[error("unknown antenna pattern kind: {0}")]
    UnknownAntennaPatternKind(String),
    #[error("unknown region: {0}")]
    InvalidRegion(String),
    #[error("JSON parse error: {0}")]
    Json(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// `regionStr`: selects the region-polygon asset a real deployment would
/// load (population grid, state/province boundaries). Reading that asset
/// is out of scope (§1); the engine only carries the selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Region {
    Conus,
    Canada,
}

impl Region {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "CONUS" => Ok(Region::Conus),
            "Canada" => Ok(Region::Canada),
            other => Err(ConfigError::InvalidRegion(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyLossConfig {
    pub value_indoor: f64,
    pub value_outdoor: f64,
}

impl Default for BodyLossConfig {
    fn default() -> Self {
        BodyLossConfig { value_indoor: 0.5, value_outdoor: 0.0 }
    }
}

/// `buildingPenetrationLoss.kind`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum BuildingPenetrationLoss {
    #[serde(rename = "ITU-R Rec. P.2109")]
    P2109 { building_type: BuildingType, confidence: f64 },
    #[serde(rename = "Fixed Value")]
    Fixed { value: f64 },
}

impl Default for BuildingPenetrationLoss {
    fn default() -> Self {
        BuildingPenetrationLoss::P2109 { building_type: BuildingType::Traditional, confidence: 0.5 }
    }
}

/// `antennaPattern.kind`: either a caller-supplied tabulated pattern file
/// (read out of scope, §1) or one of the built-in model names §4.D names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum AntennaPatternSelector {
    #[serde(rename = "User Upload")]
    UserUpload(String),
    #[serde(rename = "F.1245")]
    F1245,
    #[serde(rename = "F.1336-omni")]
    F1336Omni,
    Omni,
}

impl Default for AntennaPatternSelector {
    fn default() -> Self {
        AntennaPatternSelector::F1245
    }
}

/// Recognized configuration-file keys (§4.K, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AfcConfig {
    pub region_str: Region,
    pub uls_database: String,
    pub ras_database: String,

    pub propagation_model: PropagationModelConfig,
    pub building_penetration_loss: BuildingPenetrationLoss,
    pub antenna_pattern: AntennaPatternSelector,

    pub min_eirp_dbm: f64,
    pub max_eirp_dbm: f64,
    /// I/N threshold, dB.
    pub threshold_db: f64,
    pub max_link_distance_km: f64,
    pub body_loss: BodyLossConfig,
    pub polarization_mismatch_loss_db: f64,
    pub receiver_feeder_loss_db: f64,
    pub win2_prob_los_threshold: f64,
    pub win2_confidence: f64,
    pub itm_confidence: f64,
    pub p2108_confidence: f64,

    pub close_in_radius_m: f64,
    pub clamp_to_fspl: bool,
    pub winner_combine: bool,
    pub winner_building_los: bool,

    /// Whether the anomalous-FS-record repair table (§7) runs before
    /// dropping a malformed record. Disabled by default, matching the
    /// source (Open Question #2, resolved in DESIGN.md).
    pub fix_anomalous_entries: bool,

    /// I/N-exceedance threshold past which an evaluation is persisted to
    /// `exc_thr.csv.gz` (§6, §7 OR-condition).
    pub visibility_threshold_db: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropagationModelConfig {
    pub kind: PropagationModel,
}

impl Default for AfcConfig {
    fn default() -> Self {
        AfcConfig {
            region_str: Region::Conus,
            uls_database: "uls.db".to_string(),
            ras_database: "ras.db".to_string(),
            propagation_model: PropagationModelConfig { kind: PropagationModel::Fcc6GhzRo },
            building_penetration_loss: BuildingPenetrationLoss::default(),
            antenna_pattern: AntennaPatternSelector::default(),
            min_eirp_dbm: 21.0,
            max_eirp_dbm: 36.0,
            threshold_db: -6.0,
            max_link_distance_km: 130.0,
            body_loss: BodyLossConfig::default(),
            polarization_mismatch_loss_db: 0.0,
            receiver_feeder_loss_db: 0.0,
            win2_prob_los_threshold: 0.5,
            win2_confidence: 0.5,
            itm_confidence: 0.5,
            p2108_confidence: 0.5,
            close_in_radius_m: 1000.0,
            clamp_to_fspl: true,
            winner_combine: false,
            winner_building_los: false,
            fix_anomalous_entries: false,
            visibility_threshold_db: -20.0,
        }
    }
}

impl AfcConfig {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| ConfigError::Json(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Json(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_json() {
        let cfg = AfcConfig::default();
        let json = cfg.to_json_pretty().unwrap();
        let back = AfcConfig::from_json(json.as_bytes()).unwrap();
        assert_eq!(back.max_eirp_dbm, cfg.max_eirp_dbm);
        assert_eq!(back.fix_anomalous_entries, false);
    }

    #[test]
    fn region_parse_rejects_unknown_value() {
        assert!(Region::parse("Mars").is_err());
        assert_eq!(Region::parse("CONUS").unwrap(), Region::Conus);
    }

    #[test]
    fn fix_anomalous_entries_defaults_to_disabled() {
        assert!(!AfcConfig::default().fix_anomalous_entries);
    }
}
