//! RAT-AFC response envelope (§6 "Response (output JSON)").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableChannelInfo {
    pub global_operating_class: u32,
    pub channel_cfi: Vec<u32>,
    pub max_eirp: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrequencyRange {
    pub low_frequency: f64,
    pub high_frequency: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSpectrumInfo {
    pub frequency_range: FrequencyRange,
    pub max_psd: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResponseStatus {
    pub response_code: i32,
    pub short_description: String,
}

impl ResponseStatus {
    pub fn success() -> Self {
        ResponseStatus { response_code: 0, short_description: "success".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSpectrumInquiryResponse {
    pub request_id: String,
    pub available_channel_info: Vec<AvailableChannelInfo>,
    pub available_spectrum_info: Vec<AvailableSpectrumInfo>,
    pub availability_expire_time: String,
    pub response: ResponseStatus,
    /// Non-fatal diagnostics (§4.J "Status message list"); not part of the
    /// frozen wire schema's required fields but carried through so a
    /// caller can surface them without re-deriving status from scratch.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status_messages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableSpectrumInquiryResponseEnvelope {
    pub version: String,
    pub available_spectrum_inquiry_responses: Vec<AvailableSpectrumInquiryResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_status_has_zero_code() {
        let s = ResponseStatus::success();
        assert_eq!(s.response_code, 0);
    }

    #[test]
    fn response_serializes_camel_case() {
        let resp = AvailableSpectrumInquiryResponse {
            request_id: "r1".to_string(),
            available_channel_info: vec![],
            available_spectrum_info: vec![],
            availability_expire_time: "2026-07-29T00:00:00Z".to_string(),
            response: ResponseStatus::success(),
            status_messages: vec![],
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"requestId\""));
        assert!(json.contains("\"availableChannelInfo\""));
        assert!(!json.contains("statusMessages"));
    }
}
