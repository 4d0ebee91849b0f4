//! Antenna Discrimination
//!
//! Off-boresight receive-gain models for incumbent FS antennas: the ITU-R
//! F.1245 reference envelope, a simplified ITU-R F.1336 omnidirectional
//! average pattern, a flat omni model, and a tabulated/interpolated
//! boresight pattern.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AntennaError {
    #[error("non-positive frequency: {0} Hz")]
    InvalidFrequency(f64),
    #[error("tabulated pattern must have at least one point")]
    EmptyTable,
}

pub type Result<T> = std::result::Result<T, AntennaError>;

/// Discrimination pattern variant, matching the FsReceiver `antenna-pattern
/// variant` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AntennaPattern {
    /// ITU-R F.1245 reference envelope, parameterized by peak boresight gain.
    F1245 { peak_gain_dbi: f64 },
    /// Simplified ITU-R F.1336 omnidirectional-average pattern.
    F1336Omni { peak_gain_dbi: f64 },
    /// Flat 0 dB pattern.
    Omni,
    /// Tabulated (angle_deg, gain_offset_db) pairs sorted ascending by
    /// angle, interpreted relative to `peak_gain_dbi`.
    Tabulated {
        peak_gain_dbi: f64,
        points: Vec<(f64, f64)>,
    },
}

impl AntennaPattern {
    /// Receive gain (dBi) toward a direction `off_boresight_deg` away from
    /// the antenna's pointing vector, at elevation angle `elevation_deg`
    /// (used only by the F.1336 omni model) and frequency `freq_hz`.
    pub fn gain(&self, off_boresight_deg: f64, elevation_deg: f64, freq_hz: f64) -> Result<f64> {
        if freq_hz <= 0.0 || !freq_hz.is_finite() {
            return Err(AntennaError::InvalidFrequency(freq_hz));
        }
        let theta = off_boresight_deg.abs().min(180.0);
        match self {
            AntennaPattern::F1245 { peak_gain_dbi } => Ok(f1245_envelope(theta, *peak_gain_dbi)),
            AntennaPattern::F1336Omni { peak_gain_dbi } => {
                Ok(f1336_omni(elevation_deg.abs().min(90.0), *peak_gain_dbi))
            }
            AntennaPattern::Omni => Ok(0.0),
            AntennaPattern::Tabulated { peak_gain_dbi, points } => {
                tabulated_gain(theta, *peak_gain_dbi, points)
            }
        }
    }
}

/// ITU-R F.1245 reference radiation pattern envelope for microwave FS
/// antennas. `d_over_lambda` (antenna diameter in wavelengths) is derived
/// from peak gain via the standard aperture-efficiency relation
/// `Gmax = 10*log10(eta*(pi*D/lambda)^2)`, eta = 0.7, the value the
/// recommendation itself assumes for its envelope derivation.
fn f1245_envelope(theta_deg: f64, peak_gain_dbi: f64) -> f64 {
    const ETA: f64 = 0.7;
    let d_over_lambda = (1.0 / std::f64::consts::PI)
        * (10f64.powf(peak_gain_dbi / 10.0) / ETA).max(1.0).sqrt();

    let g1 = 2.0 + 15.0 * d_over_lambda.log10();
    let phi_m = if peak_gain_dbi > g1 {
        20.0 * (peak_gain_dbi - g1).sqrt() / d_over_lambda
    } else {
        0.0
    };
    let phi_r = 15.85 * d_over_lambda.powf(-0.6);

    if theta_deg < phi_m {
        peak_gain_dbi - 2.5e-3 * (d_over_lambda * theta_deg).powi(2)
    } else if theta_deg < phi_r.max(phi_m) {
        g1
    } else if theta_deg < 48.0 {
        32.0 - 25.0 * theta_deg.log10()
    } else {
        -10.0
    }
}

/// Simplified ITU-R F.1336 omnidirectional-average elevation pattern.
/// The 3 dB beamwidth is estimated from peak gain via the Recommendation's
/// own omnidirectional-gain relation, then a parabolic main lobe rolls off
/// into a logarithmic tail, continuous at the boundary.
fn f1336_omni(elevation_deg: f64, peak_gain_dbi: f64) -> f64 {
    let theta3 = (107.6 * 10f64.powf(-0.1 * peak_gain_dbi)).clamp(0.5, 90.0);
    let theta = elevation_deg.max(1e-6);

    let g = if theta <= theta3 {
        peak_gain_dbi - 12.0 * (theta / theta3).powi(2)
    } else {
        peak_gain_dbi - 12.0 - 10.0 * (theta / theta3).log10()
    };
    g.max(-10.0)
}

/// Piecewise-linear interpolation over a sorted (angle_deg, gain_offset_db)
/// table, offset by `peak_gain_dbi`. Angles outside the table range are
/// linearly extrapolated from the two nearest boundary points.
fn tabulated_gain(theta_deg: f64, peak_gain_dbi: f64, points: &[(f64, f64)]) -> Result<f64> {
    if points.is_empty() {
        return Err(AntennaError::EmptyTable);
    }
    if points.len() == 1 {
        return Ok(peak_gain_dbi + points[0].1);
    }

    if theta_deg <= points[0].0 {
        let (x0, y0) = points[0];
        let (x1, y1) = points[1];
        return Ok(peak_gain_dbi + extrapolate(theta_deg, x0, y0, x1, y1));
    }
    let last = points.len() - 1;
    if theta_deg >= points[last].0 {
        let (x0, y0) = points[last - 1];
        let (x1, y1) = points[last];
        return Ok(peak_gain_dbi + extrapolate(theta_deg, x0, y0, x1, y1));
    }

    for w in points.windows(2) {
        let (x0, y0) = w[0];
        let (x1, y1) = w[1];
        if theta_deg >= x0 && theta_deg <= x1 {
            let frac = if x1 > x0 { (theta_deg - x0) / (x1 - x0) } else { 0.0 };
            return Ok(peak_gain_dbi + y0 + frac * (y1 - y0));
        }
    }
    unreachable!("theta_deg within table bounds but no segment matched")
}

fn extrapolate(x: f64, x0: f64, y0: f64, x1: f64, y1: f64) -> f64 {
    if (x1 - x0).abs() < f64::EPSILON {
        return y0;
    }
    let slope = (y1 - y0) / (x1 - x0);
    y0 + slope * (x - x0)
}
