//! Incumbent Set
//!
//! The Fixed Service (FS) receiver registry, kept as an id-sorted,
//! binary-searchable list, plus the Radio Astronomy Station (RAS)
//! exclusion-zone variants.

use afc_antenna::AntennaPattern;
use afc_geo::{haversine_m, GeoPoint, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IncumbentError {
    #[error("stop frequency {stop} must be >= start frequency {start}")]
    InvalidFrequencyRange { start: f64, stop: f64 },
    #[error("bandwidth must be positive, got {0}")]
    InvalidBandwidth(f64),
    #[error("non-finite position field: {0}")]
    NonFinitePosition(&'static str),
    #[error("receiver ids must be strictly increasing: {prev} then {next}")]
    OutOfOrder { prev: i64, next: i64 },
    #[error("no FS receiver with id {0}")]
    NotFound(i64),
    #[error(transparent)]
    Geo(#[from] afc_geo::GeoError),
}

pub type Result<T> = std::result::Result<T, IncumbentError>;

/// An incumbent Fixed Service microwave receiver to protect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsReceiver {
    pub id: i64,
    pub callsign: String,
    pub radio_service_code: String,

    pub rx_lon_deg: f64,
    pub rx_lat_deg: f64,
    pub rx_height_agl_m: f64,
    pub tx_lon_deg: f64,
    pub tx_lat_deg: f64,
    pub tx_height_m: f64,

    pub start_freq_hz: f64,
    pub stop_freq_hz: f64,
    pub peak_gain_dbi: f64,
    pub antenna_pattern: AntennaPattern,
    pub feeder_loss_db: f64,
    pub noise_figure_db: f64,

    rx_ecef: Vec3,
    tx_ecef: Vec3,
    boresight: Vec3,
    link_distance_m: f64,
    noise_floor_dbw: f64,
}

/// Boltzmann's constant, J/K.
const BOLTZMANN_J_PER_K: f64 = 1.380649e-23;
/// Standard reference noise temperature, K.
const REFERENCE_NOISE_TEMP_K: f64 = 290.0;

impl FsReceiver {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: i64,
        callsign: String,
        radio_service_code: String,
        rx_lon_deg: f64,
        rx_lat_deg: f64,
        rx_height_agl_m: f64,
        tx_lon_deg: f64,
        tx_lat_deg: f64,
        tx_height_m: f64,
        start_freq_hz: f64,
        stop_freq_hz: f64,
        peak_gain_dbi: f64,
        antenna_pattern: AntennaPattern,
        feeder_loss_db: f64,
        noise_figure_db: f64,
    ) -> Result<Self> {
        if stop_freq_hz < start_freq_hz {
            return Err(IncumbentError::InvalidFrequencyRange { start: start_freq_hz, stop: stop_freq_hz });
        }
        let bandwidth_hz = stop_freq_hz - start_freq_hz;
        if bandwidth_hz <= 0.0 {
            return Err(IncumbentError::InvalidBandwidth(bandwidth_hz));
        }
        for (name, v) in [
            ("rx_lon_deg", rx_lon_deg),
            ("rx_lat_deg", rx_lat_deg),
            ("rx_height_agl_m", rx_height_agl_m),
            ("tx_lon_deg", tx_lon_deg),
            ("tx_lat_deg", tx_lat_deg),
            ("tx_height_m", tx_height_m),
        ] {
            if !v.is_finite() {
                return Err(IncumbentError::NonFinitePosition(name));
            }
        }

        let rx_point = GeoPoint::new(rx_lat_deg, rx_lon_deg, rx_height_agl_m);
        let tx_point = GeoPoint::new(tx_lat_deg, tx_lon_deg, tx_height_m);
        let rx_ecef = rx_point.to_ecef()?;
        let tx_ecef = tx_point.to_ecef()?;
        let boresight = tx_ecef
            .sub(&rx_ecef)
            .normalize()
            .unwrap_or(Vec3::new(1.0, 0.0, 0.0));
        let link_distance_m = haversine_m(rx_point, tx_point);

        let noise_floor_dbw =
            10.0 * (BOLTZMANN_J_PER_K * REFERENCE_NOISE_TEMP_K * bandwidth_hz).log10() + noise_figure_db;

        Ok(FsReceiver {
            id,
            callsign,
            radio_service_code,
            rx_lon_deg,
            rx_lat_deg,
            rx_height_agl_m,
            tx_lon_deg,
            tx_lat_deg,
            tx_height_m,
            start_freq_hz,
            stop_freq_hz,
            peak_gain_dbi,
            antenna_pattern,
            feeder_loss_db,
            noise_figure_db,
            rx_ecef,
            tx_ecef,
            boresight,
            link_distance_m,
            noise_floor_dbw,
        })
    }

    pub fn bandwidth_hz(&self) -> f64 {
        self.stop_freq_hz - self.start_freq_hz
    }

    pub fn rx_point(&self) -> GeoPoint {
        GeoPoint::new(self.rx_lat_deg, self.rx_lon_deg, self.rx_height_agl_m)
    }

    pub fn tx_point(&self) -> GeoPoint {
        GeoPoint::new(self.tx_lat_deg, self.tx_lon_deg, self.tx_height_m)
    }

    pub fn rx_ecef(&self) -> Vec3 {
        self.rx_ecef
    }

    pub fn tx_ecef(&self) -> Vec3 {
        self.tx_ecef
    }

    /// Unit vector from the receiver toward the paired transmitter
    /// (the receive antenna's boresight direction).
    pub fn boresight(&self) -> Vec3 {
        self.boresight
    }

    pub fn link_distance_m(&self) -> f64 {
        self.link_distance_m
    }

    pub fn noise_floor_dbw(&self) -> f64 {
        self.noise_floor_dbw
    }

    /// Off-boresight angle (degrees) between this receiver's boresight and
    /// the direction toward `point`.
    pub fn off_boresight_deg(&self, point: GeoPoint) -> Result<f64> {
        let to_point = point.to_ecef()?.sub(&self.rx_ecef);
        let to_point_n = to_point
            .normalize()
            .ok_or(IncumbentError::NonFinitePosition("off_boresight direction"))?;
        let cos_angle = self.boresight.dot(&to_point_n).clamp(-1.0, 1.0);
        Ok(cos_angle.acos().to_degrees())
    }
}

/// An id-sorted, binary-searchable registry of FS receivers.
#[derive(Debug, Clone, Default)]
pub struct FsReceiverSet {
    receivers: Vec<FsReceiver>,
}

impl FsReceiverSet {
    /// Builds a registry from receivers already sorted by ascending id;
    /// fails if the ordering invariant does not hold.
    pub fn from_sorted(receivers: Vec<FsReceiver>) -> Result<Self> {
        for w in receivers.windows(2) {
            if w[1].id <= w[0].id {
                return Err(IncumbentError::OutOfOrder { prev: w[0].id, next: w[1].id });
            }
        }
        Ok(FsReceiverSet { receivers })
    }

    /// Builds a registry from receivers in arbitrary order, sorting by id.
    pub fn from_unsorted(mut receivers: Vec<FsReceiver>) -> Self {
        receivers.sort_by_key(|r| r.id);
        FsReceiverSet { receivers }
    }

    pub fn len(&self) -> usize {
        self.receivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receivers.is_empty()
    }

    /// Binary-searches for the receiver with this id (invariant 7: never
    /// silent about an absent id).
    pub fn find_by_id(&self, id: i64) -> Result<&FsReceiver> {
        self.receivers
            .binary_search_by_key(&id, |r| r.id)
            .map(|idx| &self.receivers[idx])
            .map_err(|_| IncumbentError::NotFound(id))
    }

    /// FS receivers within `radius_m` of `center` whose assigned band
    /// overlaps `[0, max_freq_hz]` and whose link distance is positive.
    pub fn iterate_intersecting<'a>(
        &'a self,
        center: GeoPoint,
        radius_m: f64,
        max_freq_hz: f64,
    ) -> impl Iterator<Item = &'a FsReceiver> + 'a {
        self.receivers.iter().filter(move |r| {
            r.link_distance_m > 0.0
                && r.start_freq_hz <= max_freq_hz
                && haversine_m(center, r.rx_point()) <= radius_m
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &FsReceiver> {
        self.receivers.iter()
    }
}

// ---------------------------------------------------------------------
// RAS exclusion zones
// ---------------------------------------------------------------------

/// An axis-aligned lat/lon bounding box, degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLonBox {
    pub min_lat_deg: f64,
    pub max_lat_deg: f64,
    pub min_lon_deg: f64,
    pub max_lon_deg: f64,
}

impl LatLonBox {
    fn contains(&self, p: GeoPoint) -> bool {
        p.lat_deg >= self.min_lat_deg
            && p.lat_deg <= self.max_lat_deg
            && p.lon_deg >= self.min_lon_deg
            && p.lon_deg <= self.max_lon_deg
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RasGeometry {
    /// One or two axis-aligned lon/lat boxes.
    RectangleSet(Vec<LatLonBox>),
    /// A fixed-radius circle around a center point.
    FixedRadiusCircle { center_lat_deg: f64, center_lon_deg: f64, radius_m: f64 },
    /// A horizon-distance circle: `radius = sqrt(2*R*4/3)*(sqrt(h_ras) + sqrt(h_tx))`.
    HorizonDistanceCircle { center_lat_deg: f64, center_lon_deg: f64, h_ras_m: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasRegion {
    pub geometry: RasGeometry,
    pub start_freq_hz: f64,
    pub stop_freq_hz: f64,
}

impl RasRegion {
    /// `4/3`-earth effective-radius factor used by the horizon-distance
    /// formula, applied to the mean earth radius.
    fn effective_radius_m() -> f64 {
        afc_geo::EARTH_RADIUS_M * 4.0 / 3.0
    }

    /// Whether the uncertainty region (approximated here by `center` and
    /// `max_dist_m`, the farthest boundary distance from its centroid,
    /// extended by `tx_height_agl_m` for the horizon-distance variant)
    /// intersects this RAS.
    pub fn intersects(&self, center: GeoPoint, max_dist_m: f64, tx_height_agl_m: f64) -> bool {
        match &self.geometry {
            RasGeometry::RectangleSet(boxes) => {
                // Conservative check: the uncertainty region's centroid lies
                // in a box, or its extent (circle of max_dist_m) reaches one.
                boxes.iter().any(|b| {
                    if b.contains(center) {
                        return true;
                    }
                    let clamped = GeoPoint::new(
                        center.lat_deg.clamp(b.min_lat_deg, b.max_lat_deg),
                        center.lon_deg.clamp(b.min_lon_deg, b.max_lon_deg),
                        center.height_m,
                    );
                    haversine_m(center, clamped) <= max_dist_m
                })
            }
            RasGeometry::FixedRadiusCircle { center_lat_deg, center_lon_deg, radius_m } => {
                let ras_center = GeoPoint::new(*center_lat_deg, *center_lon_deg, center.height_m);
                haversine_m(center, ras_center) <= radius_m + max_dist_m
            }
            RasGeometry::HorizonDistanceCircle { center_lat_deg, center_lon_deg, h_ras_m } => {
                let ras_center = GeoPoint::new(*center_lat_deg, *center_lon_deg, center.height_m);
                let radius_m = (2.0 * Self::effective_radius_m()).sqrt()
                    * (h_ras_m.max(0.0).sqrt() + tx_height_agl_m.max(0.0).sqrt());
                haversine_m(center, ras_center) <= radius_m + max_dist_m
            }
        }
    }

    pub fn overlaps_band(&self, start_freq_hz: f64, stop_freq_hz: f64) -> bool {
        self.start_freq_hz < stop_freq_hz && self.stop_freq_hz > start_freq_hz
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_receiver(id: i64, start_freq_hz: f64) -> FsReceiver {
        FsReceiver::new(
            id,
            format!("TEST{id}"),
            "FX".to_string(),
            -74.0,
            40.0,
            30.0,
            -74.01,
            40.01,
            50.0,
            start_freq_hz,
            start_freq_hz + 20e6,
            38.0,
            AntennaPattern::Omni,
            2.0,
            4.0,
        )
        .unwrap()
    }

    #[test]
    fn rejects_inverted_frequency_range() {
        let result = FsReceiver::new(
            1,
            "X".to_string(),
            "FX".to_string(),
            0.0,
            0.0,
            10.0,
            0.0,
            0.0,
            10.0,
            6e9,
            5e9,
            30.0,
            AntennaPattern::Omni,
            1.0,
            3.0,
        );
        assert!(result.is_err());
    }

    #[test]
    fn noise_floor_matches_closed_form() {
        let r = sample_receiver(1, 6e9);
        let expected = 10.0 * (BOLTZMANN_J_PER_K * REFERENCE_NOISE_TEMP_K * 20e6).log10() + 4.0;
        assert!((r.noise_floor_dbw() - expected).abs() < 1e-9);
    }

    #[test]
    fn set_rejects_out_of_order_ids() {
        let receivers = vec![sample_receiver(2, 6e9), sample_receiver(1, 6e9)];
        assert!(FsReceiverSet::from_sorted(receivers).is_err());
    }

    #[test]
    fn find_by_id_binary_searches() {
        let receivers = vec![sample_receiver(1, 6e9), sample_receiver(5, 6e9), sample_receiver(10, 6e9)];
        let set = FsReceiverSet::from_sorted(receivers).unwrap();
        assert!(set.find_by_id(5).is_ok());
        assert!(matches!(set.find_by_id(6), Err(IncumbentError::NotFound(6))));
    }

    #[test]
    fn iterate_intersecting_filters_by_radius_and_frequency() {
        let receivers = vec![sample_receiver(1, 5.9e9), sample_receiver(2, 6.5e9)];
        let set = FsReceiverSet::from_unsorted(receivers);
        let center = GeoPoint::new(40.0, -74.0, 0.0);
        let found: Vec<_> = set.iterate_intersecting(center, 5_000_000.0, 6.0e9).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 1);
    }

    #[test]
    fn rectangle_ras_intersects_when_center_inside() {
        let ras = RasRegion {
            geometry: RasGeometry::RectangleSet(vec![LatLonBox {
                min_lat_deg: 39.0,
                max_lat_deg: 41.0,
                min_lon_deg: -75.0,
                max_lon_deg: -73.0,
            }]),
            start_freq_hz: 6e9,
            stop_freq_hz: 6.1e9,
        };
        assert!(ras.intersects(GeoPoint::new(40.0, -74.0, 0.0), 100.0, 10.0));
    }

    #[test]
    fn horizon_distance_circle_scales_with_heights() {
        let ras = RasRegion {
            geometry: RasGeometry::HorizonDistanceCircle { center_lat_deg: 40.0, center_lon_deg: -74.0, h_ras_m: 100.0 },
            start_freq_hz: 6e9,
            stop_freq_hz: 6.1e9,
        };
        let far_point = GeoPoint::new(40.5, -74.0, 0.0); // ~55km away
        assert!(!ras.intersects(far_point, 0.0, 10.0));
        assert!(ras.intersects(far_point, 0.0, 1_000_000.0)); // huge tx height dominates
    }

    #[test]
    fn band_overlap_detects_disjoint_ranges() {
        let ras = RasRegion {
            geometry: RasGeometry::FixedRadiusCircle { center_lat_deg: 0.0, center_lon_deg: 0.0, radius_m: 1.0 },
            start_freq_hz: 6e9,
            stop_freq_hz: 6.02e9,
        };
        assert!(!ras.overlaps_band(6.03e9, 6.05e9));
        assert!(ras.overlaps_band(6.01e9, 6.05e9));
    }
}
