//! Uncertainty Region
//!
//! Geometry of the 3-D footprint a prospective transmitter's location may
//! occupy: an ellipse, a linear polygon, or a radial polygon, each
//! extruded by a vertical uncertainty band about a center height.

use afc_geo::{destination_point, haversine_m, GeoPoint};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UncertaintyError {
    #[error("polygon must have at least 3 vertices, got {0}")]
    TooFewVertices(usize),
    #[error("ellipse semi-axes must be positive (major={0}, minor={1})")]
    InvalidAxes(f64, f64),
}

pub type Result<T> = std::result::Result<T, UncertaintyError>;

/// The closest-boundary-point query result: the projected point and whether
/// the query point was already inside the region (in which case the region
/// is not shrunk toward it).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPoint {
    pub point: GeoPoint,
    pub contains: bool,
}

/// Shared contract every uncertainty-region variant implements.
pub trait RegionGeometry {
    fn center(&self) -> GeoPoint;
    fn max_dist_m(&self) -> f64;
    fn height_uncertainty_m(&self) -> f64;
    fn closest_point(&self, query: GeoPoint) -> ClosestPoint;
    fn boundary(&self) -> Vec<GeoPoint>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    pub center_lat_deg: f64,
    pub center_lon_deg: f64,
    pub center_height_m: f64,
    pub semi_major_m: f64,
    pub semi_minor_m: f64,
    pub orientation_from_north_deg: f64,
    pub height_uncertainty_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearPolygon {
    pub outer_boundary: Vec<(f64, f64)>, // (lat_deg, lon_deg)
    pub center_height_m: f64,
    pub height_uncertainty_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadialSpoke {
    pub angle_deg: f64,
    pub length_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadialPolygon {
    pub center_lat_deg: f64,
    pub center_lon_deg: f64,
    pub center_height_m: f64,
    pub spokes: Vec<RadialSpoke>,
    pub height_uncertainty_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UncertaintyRegion {
    Ellipse(Ellipse),
    LinearPolygon(LinearPolygon),
    RadialPolygon(RadialPolygon),
}

impl UncertaintyRegion {
    pub fn validate(&self) -> Result<()> {
        match self {
            UncertaintyRegion::Ellipse(e) => {
                if e.semi_major_m <= 0.0 || e.semi_minor_m <= 0.0 {
                    return Err(UncertaintyError::InvalidAxes(e.semi_major_m, e.semi_minor_m));
                }
                Ok(())
            }
            UncertaintyRegion::LinearPolygon(p) => {
                if p.outer_boundary.len() < 3 {
                    return Err(UncertaintyError::TooFewVertices(p.outer_boundary.len()));
                }
                Ok(())
            }
            UncertaintyRegion::RadialPolygon(p) => {
                if p.spokes.len() < 3 {
                    return Err(UncertaintyError::TooFewVertices(p.spokes.len()));
                }
                Ok(())
            }
        }
    }

    fn as_geometry(&self) -> Box<dyn RegionGeometry + '_> {
        match self {
            UncertaintyRegion::Ellipse(e) => Box::new(e.clone()),
            UncertaintyRegion::LinearPolygon(p) => Box::new(p.clone()),
            UncertaintyRegion::RadialPolygon(p) => Box::new(p.to_linear_polygon()),
        }
    }
}

impl RegionGeometry for UncertaintyRegion {
    fn center(&self) -> GeoPoint {
        self.as_geometry().center()
    }
    fn max_dist_m(&self) -> f64 {
        self.as_geometry().max_dist_m()
    }
    fn height_uncertainty_m(&self) -> f64 {
        self.as_geometry().height_uncertainty_m()
    }
    fn closest_point(&self, query: GeoPoint) -> ClosestPoint {
        self.as_geometry().closest_point(query)
    }
    fn boundary(&self) -> Vec<GeoPoint> {
        self.as_geometry().boundary()
    }
}

// ---------------------------------------------------------------------
// Ellipse
// ---------------------------------------------------------------------

const METERS_PER_DEG_LAT: f64 = 111_320.0;
const ELLIPSE_SAMPLE_COUNT: usize = 360;

impl Ellipse {
    fn meters_per_deg_lon(&self) -> f64 {
        METERS_PER_DEG_LAT * self.center_lat_deg.to_radians().cos().max(1e-6)
    }

    fn local_to_geo(&self, east_m: f64, north_m: f64) -> GeoPoint {
        let dlat = north_m / METERS_PER_DEG_LAT;
        let dlon = east_m / self.meters_per_deg_lon();
        GeoPoint::new(
            self.center_lat_deg + dlat,
            self.center_lon_deg + dlon,
            self.center_height_m,
        )
    }

    fn geo_to_local(&self, p: GeoPoint) -> (f64, f64) {
        let north_m = (p.lat_deg - self.center_lat_deg) * METERS_PER_DEG_LAT;
        let east_m = (p.lon_deg - self.center_lon_deg) * self.meters_per_deg_lon();
        (east_m, north_m)
    }

    /// Point on the boundary at parametric angle `t` radians.
    fn boundary_point_at(&self, t: f64) -> (f64, f64) {
        let theta = self.orientation_from_north_deg.to_radians();
        let a = self.semi_major_m;
        let b = self.semi_minor_m;
        let east = a * t.cos() * theta.sin() + b * t.sin() * theta.cos();
        let north = a * t.cos() * theta.cos() - b * t.sin() * theta.sin();
        (east, north)
    }

    fn contains_local(&self, east_m: f64, north_m: f64) -> bool {
        let theta = self.orientation_from_north_deg.to_radians();
        // Rotate (east, north) into the (major, minor) axis frame.
        let u = east_m * theta.sin() + north_m * theta.cos();
        let v = east_m * theta.cos() - north_m * theta.sin();
        (u / self.semi_major_m).powi(2) + (v / self.semi_minor_m).powi(2) <= 1.0
    }
}

impl RegionGeometry for Ellipse {
    fn center(&self) -> GeoPoint {
        GeoPoint::new(self.center_lat_deg, self.center_lon_deg, self.center_height_m)
    }

    fn max_dist_m(&self) -> f64 {
        self.semi_major_m.max(self.semi_minor_m)
    }

    fn height_uncertainty_m(&self) -> f64 {
        self.height_uncertainty_m
    }

    fn closest_point(&self, query: GeoPoint) -> ClosestPoint {
        let (qe, qn) = self.geo_to_local(query);
        let contains = self.contains_local(qe, qn);

        // Coarse angular scan followed by golden-section refinement between
        // the two best neighboring samples.
        let mut best_t = 0.0;
        let mut best_d2 = f64::MAX;
        for i in 0..ELLIPSE_SAMPLE_COUNT {
            let t = afc_geo::TWO_PI * i as f64 / ELLIPSE_SAMPLE_COUNT as f64;
            let (e, n) = self.boundary_point_at(t);
            let d2 = (e - qe).powi(2) + (n - qn).powi(2);
            if d2 < best_d2 {
                best_d2 = d2;
                best_t = t;
            }
        }

        let step = afc_geo::TWO_PI / ELLIPSE_SAMPLE_COUNT as f64;
        let mut lo = best_t - step;
        let mut hi = best_t + step;
        let dist_sq = |t: f64| {
            let (e, n) = self.boundary_point_at(t);
            (e - qe).powi(2) + (n - qn).powi(2)
        };
        for _ in 0..40 {
            let m1 = lo + (hi - lo) / 3.0;
            let m2 = hi - (hi - lo) / 3.0;
            if dist_sq(m1) < dist_sq(m2) {
                hi = m2;
            } else {
                lo = m1;
            }
        }
        let t_final = (lo + hi) / 2.0;
        let (e, n) = self.boundary_point_at(t_final);

        ClosestPoint {
            point: self.local_to_geo(e, n),
            contains,
        }
    }

    fn boundary(&self) -> Vec<GeoPoint> {
        (0..ELLIPSE_SAMPLE_COUNT)
            .map(|i| {
                let t = afc_geo::TWO_PI * i as f64 / ELLIPSE_SAMPLE_COUNT as f64;
                let (e, n) = self.boundary_point_at(t);
                self.local_to_geo(e, n)
            })
            .collect()
    }
}

// ---------------------------------------------------------------------
// Linear polygon
// ---------------------------------------------------------------------

impl LinearPolygon {
    /// Shoelace-formula centroid, computed directly on (lon, lat) degrees
    /// as the source's invariant specifies.
    fn centroid_lat_lon(&self) -> (f64, f64) {
        let pts = &self.outer_boundary;
        let n = pts.len();
        let mut area2 = 0.0;
        let mut cx = 0.0;
        let mut cy = 0.0;
        for i in 0..n {
            let (lat0, lon0) = pts[i];
            let (lat1, lon1) = pts[(i + 1) % n];
            let cross = lon0 * lat1 - lon1 * lat0;
            area2 += cross;
            cx += (lon0 + lon1) * cross;
            cy += (lat0 + lat1) * cross;
        }
        if area2.abs() < 1e-12 {
            // Degenerate polygon: fall back to the vertex average.
            let lat_avg = pts.iter().map(|(lat, _)| lat).sum::<f64>() / n as f64;
            let lon_avg = pts.iter().map(|(_, lon)| lon).sum::<f64>() / n as f64;
            return (lat_avg, lon_avg);
        }
        let area = area2 / 2.0;
        (cy / (6.0 * area), cx / (6.0 * area))
    }

    fn contains_point(&self, query: GeoPoint) -> bool {
        // Ray casting in (lon, lat) degree space.
        let pts = &self.outer_boundary;
        let n = pts.len();
        let (qy, qx) = (query.lat_deg, query.lon_deg);
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (yi, xi) = pts[i];
            let (yj, xj) = pts[j];
            if (yi > qy) != (yj > qy) {
                let x_intersect = xi + (qy - yi) / (yj - yi) * (xj - xi);
                if qx < x_intersect {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }
}

impl RegionGeometry for LinearPolygon {
    fn center(&self) -> GeoPoint {
        let (lat, lon) = self.centroid_lat_lon();
        GeoPoint::new(lat, lon, self.center_height_m)
    }

    fn max_dist_m(&self) -> f64 {
        let centroid = self.center();
        self.outer_boundary
            .iter()
            .map(|(lat, lon)| haversine_m(centroid, GeoPoint::new(*lat, *lon, self.center_height_m)))
            .fold(0.0, f64::max)
    }

    fn height_uncertainty_m(&self) -> f64 {
        self.height_uncertainty_m
    }

    fn closest_point(&self, query: GeoPoint) -> ClosestPoint {
        let contains = self.contains_point(query);
        let pts = &self.outer_boundary;
        let n = pts.len();

        let mut best_point = GeoPoint::new(pts[0].0, pts[0].1, self.center_height_m);
        let mut best_dist = f64::MAX;
        for i in 0..n {
            let a = pts[i];
            let b = pts[(i + 1) % n];
            let proj = project_onto_segment(query, a, b, self.center_height_m);
            let d = haversine_m(query, proj);
            if d < best_dist {
                best_dist = d;
                best_point = proj;
            }
        }

        ClosestPoint { point: best_point, contains }
    }

    fn boundary(&self) -> Vec<GeoPoint> {
        self.outer_boundary
            .iter()
            .map(|(lat, lon)| GeoPoint::new(*lat, *lon, self.center_height_m))
            .collect()
    }
}

fn project_onto_segment(query: GeoPoint, a: (f64, f64), b: (f64, f64), height_m: f64) -> GeoPoint {
    // Local equirectangular approximation around `a`, adequate at the small
    // spatial scales an uncertainty region spans.
    let lat_scale = METERS_PER_DEG_LAT;
    let lon_scale = METERS_PER_DEG_LAT * a.0.to_radians().cos().max(1e-6);

    let ax = 0.0;
    let ay = 0.0;
    let bx = (b.1 - a.1) * lon_scale;
    let by = (b.0 - a.0) * lat_scale;
    let qx = (query.lon_deg - a.1) * lon_scale;
    let qy = (query.lat_deg - a.0) * lat_scale;

    let dx = bx - ax;
    let dy = by - ay;
    let len2 = dx * dx + dy * dy;
    let t = if len2 > 0.0 {
        (((qx - ax) * dx + (qy - ay) * dy) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let px = ax + t * dx;
    let py = ay + t * dy;

    GeoPoint::new(a.0 + py / lat_scale, a.1 + px / lon_scale, height_m)
}

// ---------------------------------------------------------------------
// Radial polygon
// ---------------------------------------------------------------------

impl RadialPolygon {
    pub fn to_linear_polygon(&self) -> LinearPolygon {
        let center = GeoPoint::new(self.center_lat_deg, self.center_lon_deg, self.center_height_m);
        let outer_boundary = self
            .spokes
            .iter()
            .map(|s| {
                let dest = destination_point(center, s.angle_deg, s.length_m);
                (dest.lat_deg, dest.lon_deg)
            })
            .collect();
        LinearPolygon {
            outer_boundary,
            center_height_m: self.center_height_m,
            height_uncertainty_m: self.height_uncertainty_m,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ellipse_max_dist_is_semi_major() {
        let e = Ellipse {
            center_lat_deg: 40.0,
            center_lon_deg: -74.0,
            center_height_m: 0.0,
            semi_major_m: 500.0,
            semi_minor_m: 200.0,
            orientation_from_north_deg: 30.0,
            height_uncertainty_m: 10.0,
        };
        assert!((e.max_dist_m() - 500.0).abs() < 1.0);
    }

    #[test]
    fn ellipse_closest_point_outside_is_on_boundary_direction() {
        let e = Ellipse {
            center_lat_deg: 0.0,
            center_lon_deg: 0.0,
            center_height_m: 0.0,
            semi_major_m: 100.0,
            semi_minor_m: 100.0,
            orientation_from_north_deg: 0.0,
            height_uncertainty_m: 0.0,
        };
        let far = GeoPoint::new(0.01, 0.0, 0.0); // ~1.1km north, well outside
        let cp = e.closest_point(far);
        assert!(!cp.contains);
        // For a circle, closest point should be ~100m from center, same bearing.
        let center = e.center();
        let d = haversine_m(center, cp.point);
        assert!((d - 100.0).abs() < 2.0);
    }

    #[test]
    fn ellipse_contains_center_point() {
        let e = Ellipse {
            center_lat_deg: 0.0,
            center_lon_deg: 0.0,
            center_height_m: 0.0,
            semi_major_m: 100.0,
            semi_minor_m: 50.0,
            orientation_from_north_deg: 0.0,
            height_uncertainty_m: 0.0,
        };
        let cp = e.closest_point(GeoPoint::new(0.0, 0.0, 0.0));
        assert!(cp.contains);
    }

    #[test]
    fn square_polygon_centroid_sanity() {
        let eps = 0.001;
        let poly = LinearPolygon {
            outer_boundary: vec![
                (40.0 - eps, -74.0 - eps),
                (40.0 - eps, -74.0 + eps),
                (40.0 + eps, -74.0 + eps),
                (40.0 + eps, -74.0 - eps),
            ],
            center_height_m: 0.0,
            height_uncertainty_m: 0.0,
        };
        let (lat, lon) = poly.centroid_lat_lon();
        assert!((lat - 40.0).abs() < 1e-9);
        assert!((lon - (-74.0)).abs() < 1e-9);
    }

    #[test]
    fn closest_point_never_farther_than_any_vertex() {
        let poly = LinearPolygon {
            outer_boundary: vec![(0.0, 0.0), (0.0, 0.01), (0.01, 0.01), (0.01, 0.0)],
            center_height_m: 0.0,
            height_uncertainty_m: 0.0,
        };
        let query = GeoPoint::new(0.05, 0.05, 0.0);
        let cp = poly.closest_point(query);
        let closest_dist = haversine_m(query, cp.point);
        let max_vertex_dist = poly
            .outer_boundary
            .iter()
            .map(|(lat, lon)| haversine_m(query, GeoPoint::new(*lat, *lon, 0.0)))
            .fold(0.0, f64::max);
        assert!(closest_dist <= max_vertex_dist + 1e-6);
    }

    #[test]
    fn radial_polygon_converts_to_linear() {
        let rp = RadialPolygon {
            center_lat_deg: 10.0,
            center_lon_deg: 10.0,
            center_height_m: 5.0,
            spokes: vec![
                RadialSpoke { angle_deg: 0.0, length_m: 100.0 },
                RadialSpoke { angle_deg: 90.0, length_m: 100.0 },
                RadialSpoke { angle_deg: 180.0, length_m: 100.0 },
                RadialSpoke { angle_deg: 270.0, length_m: 100.0 },
            ],
            height_uncertainty_m: 5.0,
        };
        let linear = rp.to_linear_polygon();
        assert_eq!(linear.outer_boundary.len(), 4);
        let max_dist = linear.max_dist_m();
        assert!((max_dist - 100.0).abs() < 2.0);
    }

    #[test]
    fn validate_rejects_degenerate_shapes() {
        let e = UncertaintyRegion::Ellipse(Ellipse {
            center_lat_deg: 0.0,
            center_lon_deg: 0.0,
            center_height_m: 0.0,
            semi_major_m: 0.0,
            semi_minor_m: 10.0,
            orientation_from_north_deg: 0.0,
            height_uncertainty_m: 0.0,
        });
        assert!(e.validate().is_err());

        let p = UncertaintyRegion::LinearPolygon(LinearPolygon {
            outer_boundary: vec![(0.0, 0.0), (0.0, 1.0)],
            center_height_m: 0.0,
            height_uncertainty_m: 0.0,
        });
        assert!(p.validate().is_err());
    }
}
