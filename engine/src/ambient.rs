//! Ambient, non-core ocean model implementations.
//!
//! Concrete `SoundSpeedProfile`/`Boundary` implementations otherwise live
//! in `ocean-scenarios` as demonstration code. This module is the one
//! exception: the HTTP service (`main.rs`) needs *some* concrete profile
//! to actually run a submitted `RunRequest`, and since `ocean-scenarios`
//! already depends on `engine` (to drive the wave queue), `engine`
//! cannot depend back on `ocean-scenarios` without a cycle. These are
//! kept deliberately tiny (closed-form formulas only, no file loading,
//! no interpolation); `ocean-scenarios` reuses them rather than
//! duplicating, and adds the sloped-bottom boundary and named scenario
//! presets on top.

use crate::geo::{Position1, EARTH_RADIUS};
use crate::ocean::{Boundary, BoundaryNormal, Gradient1, SoundSpeedProfile};

/// Constant sound speed everywhere. Rays travel as great circles.
pub struct IsovelocityProfile {
    pub sound_speed_mps: f64,
}

impl SoundSpeedProfile for IsovelocityProfile {
    fn sound_speed(&self, _position: &Position1) -> (f64, Gradient1) {
        (self.sound_speed_mps, Gradient1::default())
    }

    fn attenuation(&self, _position: &Position1, frequencies_hz: &[f64], _distance_m: f64) -> Vec<f64> {
        vec![0.0; frequencies_hz.len()]
    }
}

/// Munk canonical N²-linear SOFAR-channel profile (Pedersen-style closed
/// form). `c(z) = c1 (1 + eps (eta - 1 + e^-eta))`, `eta = 2(z - z1)/b`,
/// `z` positive-down depth.
pub struct MunkProfile {
    /// Sound speed at the channel axis, m/s (canonical: 1500).
    pub axis_speed_mps: f64,
    /// Depth of the channel axis, meters positive-down (canonical: 1300).
    pub axis_depth_m: f64,
    /// Profile scale depth, meters (canonical: 1300).
    pub scale_depth_m: f64,
    /// Perturbation coefficient (canonical: 0.00737).
    pub epsilon: f64,
}

impl Default for MunkProfile {
    fn default() -> Self {
        Self { axis_speed_mps: 1500.0, axis_depth_m: 1300.0, scale_depth_m: 1300.0, epsilon: 0.00737 }
    }
}

impl SoundSpeedProfile for MunkProfile {
    fn sound_speed(&self, position: &Position1) -> (f64, Gradient1) {
        let depth = -position.altitude();
        let eta = 2.0 * (depth - self.axis_depth_m) / self.scale_depth_m;
        let speed = self.axis_speed_mps * (1.0 + self.epsilon * (eta - 1.0 + (-eta).exp()));

        // d(speed)/d(depth), then convert to d(speed)/d(rho) = -d/d(depth).
        let d_speed_d_depth =
            self.axis_speed_mps * self.epsilon * (2.0 / self.scale_depth_m) * (1.0 - (-eta).exp());
        let gradient = Gradient1 { rho: -d_speed_d_depth, theta: 0.0, phi: 0.0 };
        (speed, gradient)
    }

    fn attenuation(&self, _position: &Position1, frequencies_hz: &[f64], _distance_m: f64) -> Vec<f64> {
        vec![0.0; frequencies_hz.len()]
    }
}

/// A flat boundary at a constant altitude (0 for the sea surface, a
/// negative constant for a flat bottom), with a constant per-frequency
/// reflection loss independent of grazing angle — the simplest instance
/// of the `Boundary` contract.
pub struct FlatBoundary {
    pub altitude_m: f64,
    pub loss_db: f64,
}

impl Boundary for FlatBoundary {
    fn height(&self, _position: &Position1) -> (f64, BoundaryNormal) {
        (EARTH_RADIUS + self.altitude_m, BoundaryNormal { rho: 1.0, theta: 0.0, phi: 0.0 })
    }

    fn reflect_loss(&self, _position: &Position1, frequencies_hz: &[f64], _grazing_angle_rad: f64) -> (Vec<f64>, Vec<f64>) {
        (vec![self.loss_db; frequencies_hz.len()], vec![0.0; frequencies_hz.len()])
    }
}

/// A bottom loss model with a simple grazing-angle dependence (Lambert's
/// law style: loss grows as grazing angle steepens away from the critical
/// angle), used where a constant-loss `FlatBoundary` would be too crude.
pub struct RayleighBottom {
    pub altitude_m: f64,
    pub critical_angle_deg: f64,
    pub loss_db_per_degree: f64,
}

impl Boundary for RayleighBottom {
    fn height(&self, _position: &Position1) -> (f64, BoundaryNormal) {
        (EARTH_RADIUS + self.altitude_m, BoundaryNormal { rho: 1.0, theta: 0.0, phi: 0.0 })
    }

    fn reflect_loss(&self, _position: &Position1, frequencies_hz: &[f64], grazing_angle_rad: f64) -> (Vec<f64>, Vec<f64>) {
        let grazing_deg = grazing_angle_rad.to_degrees();
        let excess = (grazing_deg - self.critical_angle_deg).max(0.0);
        let loss = excess * self.loss_db_per_degree;
        (vec![loss; frequencies_hz.len()], vec![0.0; frequencies_hz.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn munk_profile_minimizes_near_axis_depth() {
        let profile = MunkProfile::default();
        let axis = Position1::from_latlon(0.0, 0.0, -profile.axis_depth_m);
        let shallow = Position1::from_latlon(0.0, 0.0, -500.0);
        let (c_axis, _) = profile.sound_speed(&axis);
        let (c_shallow, _) = profile.sound_speed(&shallow);
        assert!(c_axis < c_shallow);
    }

    #[test]
    fn isovelocity_gradient_is_zero() {
        let profile = IsovelocityProfile { sound_speed_mps: 1500.0 };
        let p = Position1::from_latlon(10.0, 10.0, -50.0);
        let (c, grad) = profile.sound_speed(&p);
        assert_eq!(c, 1500.0);
        assert_eq!(grad.rho, 0.0);
    }
}
