//! Pure-query ocean model contract.
//!
//! The engine consumes an ocean, it doesn't define one. Concrete analytic
//! profiles (isovelocity, Munk N²-linear, flat/sloped boundaries) are
//! ambient demonstration code in `ocean-scenarios`; none of that belongs
//! in this crate.

use crate::geo::Position1;

/// Gradient of a scalar field at a point, in spherical earth coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gradient1 {
    pub rho: f64,
    pub theta: f64,
    pub phi: f64,
}

/// Sound-speed profile: given a position, returns sound speed and its
/// spatial gradient. Implementations are expected to be cheap — this is
/// called once per ray per step.
pub trait SoundSpeedProfile: Send + Sync {
    fn sound_speed(&self, position: &Position1) -> (f64, Gradient1);

    /// Path-integrated attenuation in dB for a ray segment of the given
    /// distance at the given frequencies, evaluated at `position`.
    fn attenuation(&self, position: &Position1, frequencies_hz: &[f64], distance_m: f64) -> Vec<f64>;
}

/// Outward unit normal plus boundary height, in spherical earth coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundaryNormal {
    pub rho: f64,
    pub theta: f64,
    pub phi: f64,
}

/// A boundary (surface or bottom): height/normal query plus reflection-loss
/// query. Same contract for both boundaries.
pub trait Boundary: Send + Sync {
    /// Height of the boundary above the reference sphere (meters) and the
    /// outward unit normal at the horizontal location of `position`.
    fn height(&self, position: &Position1) -> (f64, BoundaryNormal);

    /// Per-frequency amplitude attenuation (dB) and phase shift (radians) as
    /// a function of grazing angle (radians). Bottom boundaries return a
    /// phase vector too; surface reflection loss in this engine ignores it
    /// and applies an unconditional −π shift instead.
    fn reflect_loss(
        &self,
        position: &Position1,
        frequencies_hz: &[f64],
        grazing_angle_rad: f64,
    ) -> (Vec<f64>, Vec<f64>);
}

/// Optional volume scattering layer. Not exercised by the core step
/// loop beyond giving listeners a hook; no bundled scenario uses one.
pub trait VolumeLayer: Send + Sync {
    fn depth(&self, position: &Position1) -> f64;
}
