//! RAT-AFC request envelope (§6 "Request (input JSON, RAT-AFC variant)").

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HeightType {
    Agl,
    Amsl,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EllipseLocation {
    pub center: LatLon,
    pub major_axis: f64,
    pub minor_axis: f64,
    pub orientation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearPolygonLocation {
    pub outer_boundary: Vec<LatLon>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadialVertex {
    pub angle: f64,
    pub length: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadialPolygonLocation {
    pub center: LatLon,
    pub outer_boundary: Vec<RadialVertex>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LocationGeometry {
    Ellipse(EllipseLocation),
    LinearPolygon(LinearPolygonLocation),
    RadialPolygon(RadialPolygonLocation),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(flatten)]
    pub geometry: LocationGeometry,
    pub height: f64,
    pub height_type: HeightType,
    pub vertical_uncertainty: f64,
    pub indoor_deployment: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InquiredChannel {
    pub global_operating_class: u32,
    #[serde(default)]
    pub channel_cfi: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InquiredFrequencyRange {
    pub low_frequency: f64,
    pub high_frequency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSpectrumInquiryRequest {
    pub request_id: String,
    #[serde(default)]
    pub device_descriptor: serde_json::Value,
    pub location: Location,
    #[serde(default)]
    pub min_desired_power: Option<f64>,
    #[serde(default)]
    pub inquired_channels: Vec<InquiredChannel>,
    #[serde(default)]
    pub inquired_frequency_range: Vec<InquiredFrequencyRange>,
}

impl AvailableSpectrumInquiryRequest {
    /// The `serialNumber` field of the opaque `deviceDescriptor`, used as
    /// the identity tag in log lines. Absent when the descriptor carries
    /// no such field.
    pub fn serial_number(&self) -> Option<&str> {
        self.device_descriptor.get("serialNumber")?.as_str()
    }

    pub fn validate(&self) -> Result<()> {
        if self.inquired_channels.is_empty() && self.inquired_frequency_range.is_empty() {
            return Err(EngineError::InvalidRequest(
                "at least one of inquiredChannels or inquiredFrequencyRange must be present".to_string(),
            ));
        }
        for range in &self.inquired_frequency_range {
            if range.high_frequency <= range.low_frequency {
                return Err(EngineError::InvalidRequest(format!(
                    "frequency range stop {} must be > start {}",
                    range.high_frequency, range.low_frequency
                )));
            }
            if range.low_frequency < afc_channel_plan::BAND_LOW_MHZ
                || range.high_frequency > afc_channel_plan::BAND_HIGH_MHZ
            {
                return Err(EngineError::InvalidRequest(format!(
                    "frequency range [{}, {}] MHz outside band [{}, {}] MHz",
                    range.low_frequency,
                    range.high_frequency,
                    afc_channel_plan::BAND_LOW_MHZ,
                    afc_channel_plan::BAND_HIGH_MHZ
                )));
            }
        }
        for ch in &self.inquired_channels {
            if ch.global_operating_class != 133 && ch.channel_cfi.as_ref().map(|v| v.is_empty()).unwrap_or(true) {
                return Err(EngineError::UnsupportedSpectrum(format!(
                    "operating class {} requires an explicit channelCfi list",
                    ch.global_operating_class
                )));
            }
        }
        Ok(())
    }

    pub fn is_indoor(&self) -> bool {
        self.location.indoor_deployment != 0
    }
}
