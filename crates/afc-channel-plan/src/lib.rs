//! Channel Plan Builder
//!
//! Expands a request's inquired operating-class/CFI list and inquired
//! frequency ranges into concrete channel rectangles over the U-NII-5
//! through U-NII-8 6 GHz band, `[5945, 7125]` MHz.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const BAND_LOW_MHZ: f64 = 5945.0;
pub const BAND_HIGH_MHZ: f64 = 7125.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelPlanError {
    #[error("CFI {0} has no valid lowest-set-bit position (bandwidth would exceed 160 MHz)")]
    InvalidCfi(u32),
    #[error("CFI {0} expands to a channel exceeding the band upper edge {BAND_HIGH_MHZ} MHz")]
    ChannelExceedsBand(u32),
    #[error("frequency range stop {stop} must be > start {start}")]
    InvalidFrequencyRange { start: f64, stop: f64 },
}

pub type Result<T> = std::result::Result<T, ChannelPlanError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelProvenance {
    InquiredChannel,
    InquiredFrequency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelColor {
    Green,
    Yellow,
    Red,
    Black,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub start_freq_mhz: f64,
    pub stop_freq_mhz: f64,
    pub provenance: ChannelProvenance,
    pub operating_class: Option<u32>,
    pub channel_index: Option<u32>,
    pub eirp_limit_dbm: f64,
    pub color: ChannelColor,
}

impl Channel {
    pub fn bandwidth_mhz(&self) -> f64 {
        self.stop_freq_mhz - self.start_freq_mhz
    }
}

/// Standard 6 GHz operating-class-to-bandwidth mapping this engine assumes
/// when an inquired channel carries no explicit class (20/40/80/160 MHz).
fn operating_class_for_bandwidth(bandwidth_mhz: f64) -> u32 {
    match bandwidth_mhz as u32 {
        20 => 131,
        40 => 132,
        80 => 133,
        160 => 134,
        _ => 133,
    }
}

/// Expands a single Channel Center Frequency Index into `(start, stop)` MHz.
/// `p` is the 1-indexed position of the lowest set bit of `cfi + 1`;
/// bandwidth = `20 * 2^(p-1)`; start = `5945 + 5*(cfi - 2^p + 1)`.
fn expand_cfi_bounds(cfi: u32) -> Result<(f64, f64)> {
    let x = (cfi as u64) + 1;
    let p = x.trailing_zeros() + 1;
    if p > 4 {
        return Err(ChannelPlanError::InvalidCfi(cfi));
    }
    let bandwidth_mhz = 20.0 * 2f64.powi((p - 1) as i32);
    let two_pow_p = 1u64 << p;
    let start_mhz = BAND_LOW_MHZ + 5.0 * (cfi as f64 - two_pow_p as f64 + 1.0);
    let stop_mhz = start_mhz + bandwidth_mhz;
    if stop_mhz > BAND_HIGH_MHZ + f64::EPSILON {
        return Err(ChannelPlanError::ChannelExceedsBand(cfi));
    }
    Ok((start_mhz, stop_mhz))
}

/// Expands one inquired CFI into a channel rectangle.
pub fn expand_cfi(operating_class: u32, cfi: u32, default_eirp_dbm: f64) -> Result<Channel> {
    let (start_mhz, stop_mhz) = expand_cfi_bounds(cfi)?;
    Ok(Channel {
        start_freq_mhz: start_mhz,
        stop_freq_mhz: stop_mhz,
        provenance: ChannelProvenance::InquiredChannel,
        operating_class: Some(operating_class),
        channel_index: Some(cfi),
        eirp_limit_dbm: default_eirp_dbm,
        color: ChannelColor::Green,
    })
}

/// All valid CFIs for one of the four 6 GHz channel bandwidths (MHz),
/// tiling the full band.
fn all_cfis_for_bandwidth(bandwidth_mhz: u32) -> Vec<u32> {
    let p = match bandwidth_mhz {
        20 => 1u32,
        40 => 2,
        80 => 3,
        160 => 4,
        _ => return Vec::new(),
    };
    let two_pow_p = 1u64 << p;
    let mut cfis = Vec::new();
    let mut start_mhz = BAND_LOW_MHZ;
    while start_mhz + bandwidth_mhz as f64 <= BAND_HIGH_MHZ + f64::EPSILON {
        let cfi = ((start_mhz - BAND_LOW_MHZ) / 5.0).round() as i64 + two_pow_p as i64 - 1;
        if cfi >= 0 {
            cfis.push(cfi as u32);
        }
        start_mhz += bandwidth_mhz as f64;
    }
    cfis
}

/// Expands a request's `inquiredChannels` entry: a specific CFI list, or
/// (when empty) every 20/40/80/160 MHz channel tiling the whole band.
pub fn expand_inquired_channels(operating_class: u32, cfi_list: &[u32], default_eirp_dbm: f64) -> Result<Vec<Channel>> {
    if cfi_list.is_empty() {
        let mut out = Vec::new();
        for bw in [20, 40, 80, 160] {
            for cfi in all_cfis_for_bandwidth(bw) {
                out.push(expand_cfi(operating_class_for_bandwidth(bw as f64), cfi, default_eirp_dbm)?);
            }
        }
        Ok(out)
    } else {
        cfi_list
            .iter()
            .map(|&cfi| expand_cfi(operating_class, cfi, default_eirp_dbm))
            .collect()
    }
}

/// Expands a requested `[low_mhz, high_mhz]` range into every 20/40/80/160
/// MHz channel whose rectangle lies entirely within `[low, high] ∩ [5945, 7125]`.
pub fn expand_frequency_range(low_mhz: f64, high_mhz: f64, default_eirp_dbm: f64) -> Result<Vec<Channel>> {
    if high_mhz <= low_mhz {
        return Err(ChannelPlanError::InvalidFrequencyRange { start: low_mhz, stop: high_mhz });
    }
    let clamped_low = low_mhz.max(BAND_LOW_MHZ);
    let clamped_high = high_mhz.min(BAND_HIGH_MHZ);

    let mut out = Vec::new();
    for bw in [20u32, 40, 80, 160] {
        for cfi in all_cfis_for_bandwidth(bw) {
            let (start_mhz, stop_mhz) = expand_cfi_bounds(cfi)?;
            if start_mhz >= clamped_low - f64::EPSILON && stop_mhz <= clamped_high + f64::EPSILON {
                out.push(Channel {
                    start_freq_mhz: start_mhz,
                    stop_freq_mhz: stop_mhz,
                    provenance: ChannelProvenance::InquiredFrequency,
                    operating_class: None,
                    channel_index: None,
                    eirp_limit_dbm: default_eirp_dbm,
                    color: ChannelColor::Green,
                });
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cfi_bandwidth_matches_lowest_set_bit_rule() {
        // cfi=1 -> x=2 -> trailing_zeros=1 -> p=2 -> bw=40
        let (start, stop) = expand_cfi_bounds(1).unwrap();
        assert!((stop - start - 40.0).abs() < 1e-9);
        // cfi=0 -> x=1 -> trailing_zeros=0 -> p=1 -> bw=20
        let (start0, stop0) = expand_cfi_bounds(0).unwrap();
        assert!((stop0 - start0 - 20.0).abs() < 1e-9);
    }

    #[test]
    fn cfi_rejects_out_of_band_channel() {
        // A very large CFI should push the channel past 7125 MHz.
        assert!(expand_cfi_bounds(10_000).is_err());
    }

    #[test]
    fn expand_empty_cfi_list_covers_all_bandwidths() {
        let channels = expand_inquired_channels(133, &[], -10.0).unwrap();
        let has_20 = channels.iter().any(|c| (c.bandwidth_mhz() - 20.0).abs() < 1e-6);
        let has_160 = channels.iter().any(|c| (c.bandwidth_mhz() - 160.0).abs() < 1e-6);
        assert!(has_20 && has_160);
    }

    #[test]
    fn all_channels_lie_within_band() {
        for bw in [20, 40, 80, 160] {
            for cfi in all_cfis_for_bandwidth(bw) {
                let (start, stop) = expand_cfi_bounds(cfi).unwrap();
                assert!(start >= BAND_LOW_MHZ - 1e-9);
                assert!(stop <= BAND_HIGH_MHZ + 1e-9);
            }
        }
    }

    #[test]
    fn frequency_range_expansion_respects_bounds() {
        let channels = expand_frequency_range(5945.0, 6145.0, -10.0).unwrap();
        assert!(!channels.is_empty());
        for c in &channels {
            assert!(c.start_freq_mhz >= 5945.0 - 1e-6);
            assert!(c.stop_freq_mhz <= 6145.0 + 1e-6);
            assert_eq!(c.provenance, ChannelProvenance::InquiredFrequency);
        }
    }

    #[test]
    fn frequency_range_rejects_inverted_bounds() {
        assert!(expand_frequency_range(6000.0, 5990.0, 0.0).is_err());
    }

    #[test]
    fn operating_class_defaults_match_bandwidth() {
        assert_eq!(operating_class_for_bandwidth(20.0), 131);
        assert_eq!(operating_class_for_bandwidth(160.0), 134);
    }
}
