//! Terrain Provider
//!
//! Resolves per-point ground elevation and optional building height, with
//! source tagging, and samples elevation profiles along a great circle for
//! the propagation kernel.
//!
//! Reading real raster/terrain-tile formats is out of scope for this
//! engine (§1): [`TileLayer`] is the trait a real LiDAR/3DEP/SRTM/global
//! reader would implement; [`LayeredTerrain`] only owns the
//! resolution-precedence chain over whatever layers are plugged in.

use afc_geo::{great_circle_sample, GeoPoint};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TerrainError {
    #[error("invalid profile sample count: {0}")]
    TooFewSamples(usize),
    #[error(transparent)]
    Geo(#[from] afc_geo::GeoError),
}

pub type Result<T> = std::result::Result<T, TerrainError>;

/// Provenance of a resolved terrain sample, in the precedence order the
/// resolver walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerrainSourceTag {
    Lidar,
    ThreeDep,
    Srtm,
    Global,
    Unknown,
}

/// A resolved terrain sample: ground height AMSL, optional building height
/// above ground, and which layer produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerrainSample {
    pub terrain_amsl_m: f64,
    pub building_height_m: Option<f64>,
    pub source: TerrainSourceTag,
}

impl TerrainSample {
    pub fn unknown() -> Self {
        TerrainSample {
            terrain_amsl_m: 0.0,
            building_height_m: None,
            source: TerrainSourceTag::Unknown,
        }
    }

    pub fn is_building(&self) -> bool {
        self.building_height_m.map(|h| h > 0.0).unwrap_or(false)
    }
}

/// A single terrain/building data layer, queried by the resolution chain.
/// `None` means "this layer has no data at this point", not an error.
pub trait TileLayer: Send + Sync {
    fn tag(&self) -> TerrainSourceTag;
    fn sample(&self, lat_deg: f64, lon_deg: f64) -> Option<TerrainSample>;
}

/// The public contract every terrain provider exposes.
pub trait TerrainSource: Send + Sync {
    fn height(&self, lat_deg: f64, lon_deg: f64) -> TerrainSample;

    /// `N` AMSL heights (with buildings) along the great circle from `from`
    /// to `to`. Endpoints equal `height(endpoint)` unless building
    /// suppression applies (see [`height_profile_suppressed`]).
    fn height_profile(&self, from: GeoPoint, to: GeoPoint, n: usize) -> Result<Vec<TerrainSample>> {
        height_profile_suppressed(self, from, to, n, 2)
    }
}

/// Samples a great-circle profile, suppressing building heights within
/// `suppression_steps` samples of either endpoint when that endpoint itself
/// sits inside a building footprint. This avoids the transmitter or
/// receiver's own rooftop/structure self-shadowing the path.
pub fn height_profile_suppressed<T: TerrainSource + ?Sized>(
    source: &T,
    from: GeoPoint,
    to: GeoPoint,
    n: usize,
    suppression_steps: usize,
) -> Result<Vec<TerrainSample>> {
    if n < 2 {
        return Err(TerrainError::TooFewSamples(n));
    }
    let points = great_circle_sample(from, to, n)?;
    let start_in_building = source.height(from.lat_deg, from.lon_deg).is_building();
    let end_in_building = source.height(to.lat_deg, to.lon_deg).is_building();

    let mut out = Vec::with_capacity(n);
    for (i, p) in points.iter().enumerate() {
        let mut sample = source.height(p.lat_deg, p.lon_deg);
        let near_start = i < suppression_steps;
        let near_end = i + suppression_steps >= n;
        if (near_start && start_in_building) || (near_end && end_in_building) {
            sample.building_height_m = None;
        }
        out.push(sample);
    }
    Ok(out)
}

/// Production terrain resolver: walks a list of [`TileLayer`]s in the
/// caller-supplied order (expected LiDAR -> 3DEP -> SRTM -> global) and
/// falls back to a zero-height `Unknown` sample.
pub struct LayeredTerrain {
    layers: Vec<Box<dyn TileLayer>>,
}

impl LayeredTerrain {
    pub fn new(layers: Vec<Box<dyn TileLayer>>) -> Self {
        LayeredTerrain { layers }
    }
}

impl TerrainSource for LayeredTerrain {
    fn height(&self, lat_deg: f64, lon_deg: f64) -> TerrainSample {
        for layer in &self.layers {
            if let Some(sample) = layer.sample(lat_deg, lon_deg) {
                return sample;
            }
        }
        TerrainSample::unknown()
    }
}

/// Procedurally generated terrain for tests: smooth fractal hills plus a
/// small set of rectangular "buildings", so propagation/orchestrator tests
/// can exercise terrain-dependent code paths without real tile data.
pub struct SyntheticTerrain {
    base_level_m: f64,
    amplitude_m: f64,
    buildings: Vec<(f64, f64, f64, f64, f64)>, // (min_lat, max_lat, min_lon, max_lon, height_m)
}

impl SyntheticTerrain {
    pub fn flat(base_level_m: f64) -> Self {
        SyntheticTerrain {
            base_level_m,
            amplitude_m: 0.0,
            buildings: Vec::new(),
        }
    }

    pub fn rolling_hills(base_level_m: f64, amplitude_m: f64) -> Self {
        SyntheticTerrain {
            base_level_m,
            amplitude_m,
            buildings: Vec::new(),
        }
    }

    pub fn with_building(mut self, min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64, height_m: f64) -> Self {
        self.buildings.push((min_lat, max_lat, min_lon, max_lon, height_m));
        self
    }
}

impl TerrainSource for SyntheticTerrain {
    fn height(&self, lat_deg: f64, lon_deg: f64) -> TerrainSample {
        let elevation = self.base_level_m
            + self.amplitude_m * (lat_deg.to_radians() * 37.0).sin() * (lon_deg.to_radians() * 23.0).cos();

        let building_height_m = self
            .buildings
            .iter()
            .find(|(min_lat, max_lat, min_lon, max_lon, _)| {
                lat_deg >= *min_lat && lat_deg <= *max_lat && lon_deg >= *min_lon && lon_deg <= *max_lon
            })
            .map(|(.., h)| *h);

        TerrainSample {
            terrain_amsl_m: elevation,
            building_height_m,
            source: TerrainSourceTag::Unknown,
        }
    }
}
