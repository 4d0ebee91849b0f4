//! Engine-wide error type, composing every wrapped crate's error plus the
//! §7 error categories so callers can map a failure straight to a
//! `responseCode`/`shortDescription` pair.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unsupported spectrum: {0}")]
    UnsupportedSpectrum(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("data error: {0}")]
    DataError(String),

    #[error("geometry error: {0}")]
    GeometryError(String),

    #[error("computation error: {0}")]
    ComputationError(String),

    #[error(transparent)]
    Geo(#[from] afc_geo::GeoError),

    #[error(transparent)]
    Terrain(#[from] afc_terrain::TerrainError),

    #[error(transparent)]
    Antenna(#[from] afc_antenna::AntennaError),

    #[error(transparent)]
    Uncertainty(#[from] afc_uncertainty::UncertaintyError),

    #[error(transparent)]
    Propagation(#[from] afc_propagation::PropagationError),

    #[error(transparent)]
    Incumbent(#[from] afc_incumbents::IncumbentError),

    #[error(transparent)]
    ChannelPlan(#[from] afc_channel_plan::ChannelPlanError),

    #[error(transparent)]
    Config(#[from] afc_config::ConfigError),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// `responseCode`/`shortDescription` this error maps to in the §6 response
/// envelope. `0` only ever appears on the success path, never here.
impl EngineError {
    pub fn response_code(&self) -> i32 {
        match self {
            EngineError::InvalidRequest(_) => 100,
            EngineError::UnsupportedSpectrum(_) => 101,
            EngineError::ConfigError(_) | EngineError::Config(_) => 102,
            EngineError::DataError(_) | EngineError::Incumbent(_) => 103,
            EngineError::GeometryError(_) | EngineError::Uncertainty(_) => 104,
            EngineError::ComputationError(_)
            | EngineError::Geo(_)
            | EngineError::Terrain(_)
            | EngineError::Antenna(_)
            | EngineError::Propagation(_)
            | EngineError::ChannelPlan(_) => 105,
        }
    }

    pub fn short_description(&self) -> String {
        self.to_string()
    }
}
