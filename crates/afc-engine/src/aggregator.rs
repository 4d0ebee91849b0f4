//! Result Aggregator (§4.J)
//!
//! Turns the orchestrator's per-channel point-mode output into the §6
//! response envelope: per-operating-class `availableChannelInfo` groups,
//! per-frequency-range PSD tiling with adjacent-equal-segment merging,
//! the 24-hour expiration timestamp, and the non-fatal status message
//! list.

use std::collections::BTreeMap;

use afc_channel_plan::{Channel, ChannelColor, ChannelProvenance};
use chrono::{Duration, Utc};

use crate::orchestrator::EvaluatedChannel;
use crate::request::InquiredFrequencyRange;
use crate::response::{AvailableChannelInfo, AvailableSpectrumInfo, FrequencyRange};

/// Groups `inquired-channel` channels by operating class into the §6
/// `availableChannelInfo` shape. RAS-blacklisted channels are dropped
/// entirely (invariant 9); black (FS-containment-forced) channels are
/// kept with `maxEirp = -inf`, matching scenario S6.
pub fn build_available_channel_info(evaluated: &[EvaluatedChannel]) -> Vec<AvailableChannelInfo> {
    let mut by_class: BTreeMap<u32, (Vec<u32>, Vec<f64>)> = BTreeMap::new();

    for ec in evaluated {
        if ec.ras_blacklisted {
            continue;
        }
        if ec.channel.provenance != ChannelProvenance::InquiredChannel {
            continue;
        }
        let class = ec.channel.operating_class.unwrap_or(133);
        let cfi = ec.channel.channel_index.unwrap_or(0);
        let entry = by_class.entry(class).or_default();
        entry.0.push(cfi);
        entry.1.push(ec.channel.eirp_limit_dbm);
    }

    by_class
        .into_iter()
        .map(|(global_operating_class, (channel_cfi, max_eirp))| AvailableChannelInfo {
            global_operating_class,
            channel_cfi,
            max_eirp,
        })
        .collect()
}

/// One boundary-sorted PSD segment before adjacent-equal merging.
struct PsdSegment {
    start_mhz: f64,
    stop_mhz: f64,
    psd_dbm_per_mhz: f64,
}

/// Tiles one inquired frequency range into unique-overlap segments against
/// every `inquired-frequency` channel that covers part of it, taking, per
/// segment, the minimum over covering channels of
/// `channel.eirpLimit - 10*log10(bandwidthMHz)` (testable property 10),
/// then merges adjacent segments that land on the same PSD value.
fn psd_for_range(range: &InquiredFrequencyRange, channels: &[&Channel]) -> Vec<PsdSegment> {
    let mut boundaries: Vec<f64> = vec![range.low_frequency, range.high_frequency];
    for ch in channels {
        if ch.start_freq_mhz > range.low_frequency && ch.start_freq_mhz < range.high_frequency {
            boundaries.push(ch.start_freq_mhz);
        }
        if ch.stop_freq_mhz > range.low_frequency && ch.stop_freq_mhz < range.high_frequency {
            boundaries.push(ch.stop_freq_mhz);
        }
    }
    boundaries.sort_by(|a, b| a.partial_cmp(b).unwrap());
    boundaries.dedup_by(|a, b| (*a - *b).abs() < 1e-9);

    let mut raw_segments = Vec::new();
    for w in boundaries.windows(2) {
        let (seg_start, seg_stop) = (w[0], w[1]);
        if seg_stop - seg_start < 1e-9 {
            continue;
        }
        let mid = 0.5 * (seg_start + seg_stop);
        let covering_psd: Option<f64> = channels
            .iter()
            .filter(|ch| ch.start_freq_mhz <= mid && ch.stop_freq_mhz >= mid)
            .map(|ch| ch.eirp_limit_dbm - 10.0 * ch.bandwidth_mhz().log10())
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.min(v))));

        if let Some(psd) = covering_psd {
            raw_segments.push(PsdSegment { start_mhz: seg_start, stop_mhz: seg_stop, psd_dbm_per_mhz: psd });
        }
    }

    let mut merged: Vec<PsdSegment> = Vec::with_capacity(raw_segments.len());
    for seg in raw_segments {
        if let Some(last) = merged.last_mut() {
            if (last.psd_dbm_per_mhz - seg.psd_dbm_per_mhz).abs() < 1e-9 && (last.stop_mhz - seg.start_mhz).abs() < 1e-9 {
                last.stop_mhz = seg.stop_mhz;
                continue;
            }
        }
        merged.push(seg);
    }
    merged
}

/// Builds `availableSpectrumInfo` for every requested frequency range,
/// merging adjacent equal-PSD segments. A range with no covering channel
/// anywhere (e.g. fully inside a blacklisted RAS band, scenario S2)
/// contributes no entries.
pub fn build_available_spectrum_info(
    requested_ranges: &[InquiredFrequencyRange],
    evaluated: &[EvaluatedChannel],
) -> Vec<AvailableSpectrumInfo> {
    let freq_channels: Vec<&Channel> = evaluated
        .iter()
        .filter(|ec| !ec.ras_blacklisted && ec.channel.provenance == ChannelProvenance::InquiredFrequency)
        .map(|ec| &ec.channel)
        .collect();

    let mut out = Vec::new();
    for range in requested_ranges {
        for seg in psd_for_range(range, &freq_channels) {
            out.push(AvailableSpectrumInfo {
                frequency_range: FrequencyRange { low_frequency: seg.start_mhz, high_frequency: seg.stop_mhz },
                max_psd: seg.psd_dbm_per_mhz,
            });
        }
    }
    out
}

/// §4.J's 24-hour ISO-8601 UTC expiration, stamped from the caller-supplied
/// "now" (kept out of this pure function so callers control the clock,
/// per the workspace's ban on ambient `Utc::now()` calls inside anything
/// that must stay replayable).
pub fn expiration_from(now: chrono::DateTime<Utc>) -> String {
    (now + Duration::hours(24)).to_rfc3339()
}

/// Convenience wrapper sampling the wall clock; only the CLI binary calls
/// this (library/test code should use [`expiration_from`] with a fixed
/// instant for reproducibility, invariant 2).
pub fn expiration_now() -> String {
    expiration_from(Utc::now())
}

/// `green` if every returned channel is at max EIRP and no ranges were
/// dropped by a RAS, else a short note naming the first non-green channel
/// count. Matches §7's "empty analysis region is not fatal" status-message
/// requirement, generalized to any case worth telling the caller about.
pub fn status_messages(evaluated: &[EvaluatedChannel], fs_in_range: usize) -> Vec<String> {
    let mut messages = Vec::new();
    if fs_in_range == 0 {
        messages.push("no incumbent FS receivers found within range; all channels at maximum EIRP".to_string());
    }
    let blacklisted = evaluated.iter().filter(|ec| ec.ras_blacklisted).count();
    if blacklisted > 0 {
        messages.push(format!("{blacklisted} channel(s) blacklisted by RAS exclusion zone overlap"));
    }
    let black = evaluated
        .iter()
        .filter(|ec| !ec.ras_blacklisted && ec.channel.color == ChannelColor::Black)
        .count();
    if black > 0 {
        messages.push(format!("{black} channel(s) forced to -inf EIRP by FS receiver inside the uncertainty region"));
    }
    messages
}
