//! Geodesy & Vector primitives
//!
//! WGS-84 (spherical mean-radius) geodetic/ECEF conversions, basic vector
//! algebra, and deterministic great-circle sampling shared by every other
//! component of the interference engine.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use thiserror::Error;

/// Mean earth radius used throughout the engine (WGS-84 mean radius), meters.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    #[error("non-finite coordinate: {0}")]
    NonFinite(&'static str),
    #[error("sample count must be >= 2, got {0}")]
    TooFewSamples(usize),
}

pub type Result<T> = std::result::Result<T, GeoError>;

/// A point in Earth-Centered Earth-Fixed coordinates, meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Vec3 { x, y, z }
    }

    pub fn add(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn sub(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn scale(&self, s: f64) -> Vec3 {
        Vec3::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn dot(&self, other: &Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Normalized copy of this vector; returns `None` for a zero vector.
    pub fn normalize(&self) -> Option<Vec3> {
        let n = self.norm();
        if n <= 0.0 || !n.is_finite() {
            None
        } else {
            Some(self.scale(1.0 / n))
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// A geodetic position (degrees, degrees, meters above a spherical earth).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub height_m: f64,
}

impl GeoPoint {
    pub fn new(lat_deg: f64, lon_deg: f64, height_m: f64) -> Self {
        GeoPoint { lat_deg, lon_deg, height_m }
    }

    pub fn is_finite(&self) -> bool {
        self.lat_deg.is_finite() && self.lon_deg.is_finite() && self.height_m.is_finite()
    }

    pub fn to_ecef(&self) -> Result<Vec3> {
        if !self.is_finite() {
            return Err(GeoError::NonFinite("GeoPoint"));
        }
        let lat = self.lat_deg.to_radians();
        let lon = self.lon_deg.to_radians();
        let r = EARTH_RADIUS_M + self.height_m;
        Ok(Vec3::new(
            r * lat.cos() * lon.cos(),
            r * lat.cos() * lon.sin(),
            r * lat.sin(),
        ))
    }

    pub fn from_ecef(v: Vec3) -> Result<GeoPoint> {
        if !v.is_finite() {
            return Err(GeoError::NonFinite("Vec3"));
        }
        let r_xy = (v.x * v.x + v.y * v.y).sqrt();
        let lon = v.y.atan2(v.x).to_degrees();
        let lat = v.z.atan2(r_xy).to_degrees();
        let height = v.norm() - EARTH_RADIUS_M;
        Ok(GeoPoint::new(lat, lon, height))
    }
}

/// Great-circle distance between two geodetic points, ignoring height, meters.
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat_deg.to_radians();
    let lat2 = b.lat_deg.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.lon_deg - a.lon_deg).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.min(1.0).max(0.0).sqrt().asin();
    EARTH_RADIUS_M * c
}

/// Initial bearing (degrees clockwise from true north) from `a` to `b`.
pub fn initial_bearing_deg(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat_deg.to_radians();
    let lat2 = b.lat_deg.to_radians();
    let dlon = (b.lon_deg - a.lon_deg).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    let bearing = y.atan2(x).to_degrees();
    (bearing + 360.0) % 360.0
}

/// Destination point starting at `origin`, traveling `distance_m` along
/// initial bearing `bearing_deg`. Height is carried through unchanged.
pub fn destination_point(origin: GeoPoint, bearing_deg: f64, distance_m: f64) -> GeoPoint {
    let ang_dist = distance_m / EARTH_RADIUS_M;
    let bearing = bearing_deg.to_radians();
    let lat1 = origin.lat_deg.to_radians();
    let lon1 = origin.lon_deg.to_radians();

    let lat2 = (lat1.sin() * ang_dist.cos() + lat1.cos() * ang_dist.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * ang_dist.sin() * lat1.cos())
            .atan2(ang_dist.cos() - lat1.sin() * lat2.sin());

    GeoPoint::new(lat2.to_degrees(), normalize_lon(lon2.to_degrees()), origin.height_m)
}

fn normalize_lon(lon_deg: f64) -> f64 {
    let mut l = lon_deg;
    while l > 180.0 {
        l -= 360.0;
    }
    while l < -180.0 {
        l += 360.0;
    }
    l
}

/// Deterministic great-circle sampling between two geodetic points.
///
/// Produces exactly `n` points, uniformly spaced in central angle, with the
/// first and last points exactly equal to `from`/`to`. Heights are linearly
/// interpolated between the endpoints.
pub fn great_circle_sample(from: GeoPoint, to: GeoPoint, n: usize) -> Result<Vec<GeoPoint>> {
    if n < 2 {
        return Err(GeoError::TooFewSamples(n));
    }
    if !from.is_finite() || !to.is_finite() {
        return Err(GeoError::NonFinite("great_circle_sample endpoint"));
    }

    let total_dist = haversine_m(from, to);
    let bearing = if total_dist > 0.0 {
        initial_bearing_deg(from, to)
    } else {
        0.0
    };

    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let frac = i as f64 / (n - 1) as f64;
        if i == 0 {
            out.push(from);
        } else if i == n - 1 {
            out.push(to);
        } else {
            let mut p = destination_point(from, bearing, total_dist * frac);
            p.height_m = from.height_m + (to.height_m - from.height_m) * frac;
            out.push(p);
        }
    }
    Ok(out)
}

/// Angle (degrees, 0 = straight up) between local "up" at `origin` and the
/// line of sight from `origin` to `target`. Used as the incumbent-side
/// elevation angle for building-penetration and antenna-discrimination
/// calculations.
pub fn elevation_angle_deg(origin: GeoPoint, target: GeoPoint) -> Result<f64> {
    let o = origin.to_ecef()?;
    let t = target.to_ecef()?;
    let up = o.normalize().ok_or(GeoError::NonFinite("origin ECEF"))?;
    let los = t.sub(&o);
    let los_n = los.normalize().ok_or(GeoError::NonFinite("line of sight"))?;
    let cos_zenith = up.dot(&los_n).clamp(-1.0, 1.0);
    let zenith_rad = cos_zenith.acos();
    Ok(90.0 - zenith_rad.to_degrees())
}

pub const TWO_PI: f64 = 2.0 * PI;
