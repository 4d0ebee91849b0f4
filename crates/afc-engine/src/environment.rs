//! Clutter/morphology environment classification.
//!
//! Resolving real urban/suburban/rural/barren morphology is a
//! population-density-grid lookup, which is out of scope (§1); this module
//! only defines the trait boundary a real grid reader would implement,
//! plus a fixed-value implementation for requests that supply a single
//! environment for the whole analysis region.

use afc_geo::GeoPoint;
use afc_propagation::Environment;

/// Resolves the clutter/morphology environment at a point. A real
/// implementation would consult a population-density or land-use raster;
/// that reader is an external collaborator (§1).
pub trait EnvironmentSource: Send + Sync {
    fn environment_at(&self, point: GeoPoint) -> Environment;
}

/// Returns the same environment everywhere, for deployments or tests that
/// do not wire up a real morphology grid.
pub struct FixedEnvironment(pub Environment);

impl EnvironmentSource for FixedEnvironment {
    fn environment_at(&self, _point: GeoPoint) -> Environment {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_environment_is_constant() {
        let env = FixedEnvironment(Environment::Urban);
        let a = env.environment_at(GeoPoint::new(0.0, 0.0, 0.0));
        let b = env.environment_at(GeoPoint::new(40.0, -74.0, 0.0));
        assert_eq!(a, b);
    }
}
