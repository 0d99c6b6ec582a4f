//! Spherical earth position and slowness vectors.
//!
//! Everything in the propagator lives in spherical earth coordinates:
//! ρ = radius from earth center (m), θ = colatitude (rad, 0 at the north
//! pole), φ = longitude (rad, east-positive). Conversions to/from
//! (latitude, longitude, altitude) are mechanical and kept at this boundary
//! so the rest of the core never has to think about degrees.

use std::f64::consts::PI;

/// Mean earth radius, meters. Matches the reference sphere used throughout
/// the propagator; altitude is height above this sphere, not above a geoid.
pub const EARTH_RADIUS: f64 = 6371000.0;

#[inline]
pub fn to_radians(deg: f64) -> f64 {
    deg * PI / 180.0
}

#[inline]
pub fn to_degrees(rad: f64) -> f64 {
    rad * 180.0 / PI
}

/// A single point in spherical earth coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position1 {
    pub rho: f64,
    pub theta: f64,
    pub phi: f64,
}

impl Position1 {
    pub fn from_latlon(lat_deg: f64, lon_deg: f64, altitude_m: f64) -> Self {
        Self {
            rho: EARTH_RADIUS + altitude_m,
            theta: to_radians(90.0 - lat_deg),
            phi: to_radians(lon_deg),
        }
    }

    pub fn latitude(&self) -> f64 {
        90.0 - to_degrees(self.theta)
    }

    pub fn longitude(&self) -> f64 {
        to_degrees(self.phi)
    }

    pub fn altitude(&self) -> f64 {
        self.rho - EARTH_RADIUS
    }

    /// Exact great-circle chord distance (straight-line, through the earth)
    /// between two positions, reusing `sin(theta)` the way the frame caches
    /// it per target to avoid recomputing it for every ray.
    pub fn chord_distance2(&self, other: &Position1, sin_theta_self: f64, sin_theta_other: f64) -> f64 {
        let z1 = self.rho * self.theta.cos();
        let x1 = self.rho * sin_theta_self * self.phi.cos();
        let y1 = self.rho * sin_theta_self * self.phi.sin();

        let z2 = other.rho * other.theta.cos();
        let x2 = other.rho * sin_theta_other * other.phi.cos();
        let y2 = other.rho * sin_theta_other * other.phi.sin();

        (x1 - x2).powi(2) + (y1 - y2).powi(2) + (z1 - z2).powi(2)
    }

    /// Convenience wrapper on `chord_distance2` for callers (e.g. dead
    /// reckoning) that don't already have a cached `sin(theta)`.
    pub fn straight_line_distance(&self, other: &Position1) -> f64 {
        self.chord_distance2(other, self.theta.sin(), other.theta.sin()).sqrt()
    }
}

/// A slowness vector: direction divided by local sound speed. Natural ODE
/// state variable because the right-hand sides become simple in ∇c.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Slowness1 {
    pub rho: f64,
    pub theta: f64,
    pub phi: f64,
}

impl Slowness1 {
    /// Build a unit-direction slowness vector from depression/elevation and
    /// azimuth launch angles (degrees) and a local sound speed.
    pub fn from_angles(de_deg: f64, az_deg: f64, sound_speed: f64) -> Self {
        let de = to_radians(de_deg);
        let az = to_radians(az_deg);
        // Rho points up (positive altitude); az is clockwise from north.
        let rho_dir = de.sin();
        let horiz = de.cos();
        let theta_dir = -horiz * az.cos(); // colatitude decreases northward
        let phi_dir = horiz * az.sin();
        Self {
            rho: rho_dir / sound_speed,
            theta: theta_dir / sound_speed,
            phi: phi_dir / sound_speed,
        }
    }

    /// Magnitude of the direction (not slowness) this vector encodes, given
    /// the sound speed it was built with: |direction| = |slowness| * c.
    pub fn magnitude(&self) -> f64 {
        (self.rho * self.rho + self.theta * self.theta + self.phi * self.phi).sqrt()
    }

    /// Depression/elevation angle (radians, positive up) of the direction
    /// this slowness vector encodes, independent of sound speed scale.
    pub fn de_angle(&self) -> f64 {
        let horiz = (self.theta * self.theta + self.phi * self.phi).sqrt();
        self.rho.atan2(horiz)
    }

    /// Azimuth angle (radians, clockwise from north) of the direction this
    /// slowness vector encodes.
    pub fn az_angle(&self) -> f64 {
        self.phi.atan2(-self.theta)
    }
}

impl std::ops::Add for Slowness1 {
    type Output = Slowness1;
    fn add(self, rhs: Slowness1) -> Slowness1 {
        Slowness1 { rho: self.rho + rhs.rho, theta: self.theta + rhs.theta, phi: self.phi + rhs.phi }
    }
}

impl std::ops::Sub for Slowness1 {
    type Output = Slowness1;
    fn sub(self, rhs: Slowness1) -> Slowness1 {
        Slowness1 { rho: self.rho - rhs.rho, theta: self.theta - rhs.theta, phi: self.phi - rhs.phi }
    }
}

impl std::ops::Mul<f64> for Slowness1 {
    type Output = Slowness1;
    fn mul(self, s: f64) -> Slowness1 {
        Slowness1 { rho: self.rho * s, theta: self.theta * s, phi: self.phi * s }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latlon_roundtrip() {
        let p = Position1::from_latlon(45.0, -45.0, -1000.0);
        assert!((p.latitude() - 45.0).abs() < 1e-9);
        assert!((p.longitude() - (-45.0)).abs() < 1e-9);
        assert!((p.altitude() - (-1000.0)).abs() < 1e-9);
    }

    #[test]
    fn de_angle_roundtrip() {
        let s = Slowness1::from_angles(20.0, 30.0, 1500.0);
        assert!((to_degrees(s.de_angle()) - 20.0).abs() < 1e-6);
        assert!((to_degrees(s.az_angle()) - 30.0).abs() < 1e-6);
    }
}
