//! Interference Computation Engine (§4 System Overview).
//!
//! Wires the geometry (K), terrain (H), antenna (C), spectrum (D),
//! uncertainty (F), propagation (E), incumbent (G), channel-plan (L), and
//! config (K) crates together behind the three analysis modes in
//! [`orchestrator`] and the [`aggregator`] that turns their raw per-channel
//! output into the §6 response envelope.

pub mod aggregator;
pub mod environment;
pub mod error;
pub mod kernel;
pub mod loaders;
pub mod orchestrator;
pub mod progress;
pub mod request;
pub mod response;

use afc_channel_plan::Channel;
use afc_config::AfcConfig;
use afc_geo::GeoPoint;
use afc_incumbents::{FsReceiverSet, RasRegion};
use afc_terrain::TerrainSource;
use afc_uncertainty::{Ellipse, LinearPolygon, RadialPolygon, RadialSpoke, RegionGeometry, UncertaintyRegion};

use environment::EnvironmentSource;
use error::Result;
use orchestrator::ModeContext;
use progress::ProgressSink;
use request::{AvailableSpectrumInquiryRequest, HeightType, LocationGeometry};
use response::{AvailableSpectrumInquiryResponse, ResponseStatus};

/// Converts a request's `location` (§6, one of ellipse/linear-polygon/
/// radial-polygon) into the core's [`UncertaintyRegion`], resolving the
/// declared height convention to the AGL center height the evaluation
/// kernel expects (invariant: `GeoPoint::height_m` is always AGL). RAT-AFC
/// request ellipse/polygon axes are full lengths; the uncertainty crate
/// wants semi-axes, so they are halved here (Open Question, resolved in
/// DESIGN.md).
pub fn build_uncertainty_region(request: &AvailableSpectrumInquiryRequest, terrain: &dyn TerrainSource) -> UncertaintyRegion {
    let loc = &request.location;
    let center_height_m = match loc.height_type {
        HeightType::Agl => loc.height,
        HeightType::Amsl => {
            let center = match &loc.geometry {
                LocationGeometry::Ellipse(e) => e.center,
                LocationGeometry::LinearPolygon(p) => p.outer_boundary[0],
                LocationGeometry::RadialPolygon(p) => p.center,
            };
            let ground_amsl = terrain.height(center.latitude, center.longitude).terrain_amsl_m;
            loc.height - ground_amsl
        }
    };

    match &loc.geometry {
        LocationGeometry::Ellipse(e) => UncertaintyRegion::Ellipse(Ellipse {
            center_lat_deg: e.center.latitude,
            center_lon_deg: e.center.longitude,
            center_height_m,
            semi_major_m: e.major_axis / 2.0,
            semi_minor_m: e.minor_axis / 2.0,
            orientation_from_north_deg: e.orientation,
            height_uncertainty_m: loc.vertical_uncertainty,
        }),
        LocationGeometry::LinearPolygon(p) => UncertaintyRegion::LinearPolygon(LinearPolygon {
            outer_boundary: p.outer_boundary.iter().map(|v| (v.latitude, v.longitude)).collect(),
            center_height_m,
            height_uncertainty_m: loc.vertical_uncertainty,
        }),
        LocationGeometry::RadialPolygon(p) => UncertaintyRegion::RadialPolygon(RadialPolygon {
            center_lat_deg: p.center.latitude,
            center_lon_deg: p.center.longitude,
            center_height_m,
            spokes: p.outer_boundary.iter().map(|v| RadialSpoke { angle_deg: v.angle, length_m: v.length }).collect(),
            height_uncertainty_m: loc.vertical_uncertainty,
        }),
    }
}

/// Expands a request's `inquiredChannels`/`inquiredFrequencyRange` entries
/// into the flat channel list [`orchestrator::point_mode`] sweeps (§4.L).
pub fn build_channel_plan(request: &AvailableSpectrumInquiryRequest, default_eirp_dbm: f64) -> Result<Vec<Channel>> {
    let mut channels = Vec::new();
    for inquired in &request.inquired_channels {
        let cfi_list = inquired.channel_cfi.clone().unwrap_or_default();
        channels.extend(afc_channel_plan::expand_inquired_channels(inquired.global_operating_class, &cfi_list, default_eirp_dbm)?);
    }
    for range in &request.inquired_frequency_range {
        channels.extend(afc_channel_plan::expand_frequency_range(range.low_frequency, range.high_frequency, default_eirp_dbm)?);
    }
    Ok(channels)
}

/// End-to-end point-analysis / AP-analysis driver (§4 control flow,
/// `PointAnalysis`/`APAnalysis`/`AP-AFC` request types): validates the
/// request, builds the geometry and channel plan, runs [`orchestrator::point_mode`],
/// and aggregates the result into the response envelope a caller
/// serializes directly to the RAT-AFC wire format.
pub fn run_point_analysis(
    request: &AvailableSpectrumInquiryRequest,
    config: &AfcConfig,
    fs_set: &FsReceiverSet,
    ras_regions: &[RasRegion],
    terrain: &dyn TerrainSource,
    environment: &dyn EnvironmentSource,
    progress: &mut dyn ProgressSink,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<AvailableSpectrumInquiryResponse> {
    request.validate()?;

    let region = build_uncertainty_region(request, terrain);
    region.validate().map_err(error::EngineError::Uncertainty)?;

    let channels = build_channel_plan(request, config.max_eirp_dbm)?;
    let requested_ranges = request.inquired_frequency_range.clone();

    let mctx = ModeContext { config, fs_set, ras_regions, terrain, environment };
    let evaluated = orchestrator::point_mode(&region, request.is_indoor(), channels, &mctx, progress)?;

    let fs_in_range = fs_set
        .iterate_intersecting(region.center(), (config.max_link_distance_km * 1000.0).max(region.max_dist_m()), f64::MAX)
        .count();

    let available_channel_info = aggregator::build_available_channel_info(&evaluated);
    let available_spectrum_info = aggregator::build_available_spectrum_info(&requested_ranges, &evaluated);
    let status_messages = aggregator::status_messages(&evaluated, fs_in_range);

    Ok(AvailableSpectrumInquiryResponse {
        request_id: request.request_id.clone(),
        available_channel_info,
        available_spectrum_info,
        availability_expire_time: aggregator::expiration_from(now),
        response: ResponseStatus::success(),
        status_messages,
    })
}

/// Builds the §6 failure response envelope for a fatal `EngineError`,
/// carrying no channel/spectrum data (§7: a fatal error always produces a
/// response body, never a bare process exit).
pub fn error_response(request_id: &str, err: &error::EngineError, now: chrono::DateTime<chrono::Utc>) -> AvailableSpectrumInquiryResponse {
    AvailableSpectrumInquiryResponse {
        request_id: request_id.to_string(),
        available_channel_info: Vec::new(),
        available_spectrum_info: Vec::new(),
        availability_expire_time: aggregator::expiration_from(now),
        response: ResponseStatus { response_code: err.response_code(), short_description: err.short_description() },
        status_messages: Vec::new(),
    }
}
