//! A single (DE × AZ) grid of ray state — one "frame" of the wave queue.
//!
//! Every cell carries position, slowness, their time-derivatives (for
//! AB3), local sound speed and gradient, path-integrated
//! attenuation/phase per frequency, reflection counters, edge flag, and
//! squared distance to every target.

use crate::geo::{Position1, Slowness1};
use crate::ocean::Gradient1;

/// Per-cell reflection/fold bookkeeping. Monotonically non-decreasing
/// along a ray.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub surface: u32,
    pub bottom: u32,
    pub caustic: u32,
    pub upper_vertex: u32,
    pub lower_vertex: u32,
}

/// A dense (DE × AZ) grid of ray state at one instant in time.
#[derive(Debug, Clone)]
pub struct WavefrontFrame {
    pub num_de: usize,
    pub num_az: usize,
    pub num_freq: usize,
    pub num_targets: usize,

    pub position: Vec<Position1>,
    pub slowness: Vec<Slowness1>,
    pub pos_gradient: Vec<Slowness1>,
    pub ndir_gradient: Vec<Slowness1>,

    pub sound_speed: Vec<f64>,
    pub sound_gradient: Vec<Gradient1>,

    /// Flat (cell, frequency) attenuation in dB, path-integrated.
    pub attenuation: Vec<f64>,
    /// Flat (cell, frequency) phase in radians, path-integrated.
    pub phase: Vec<f64>,

    pub counters: Vec<Counters>,
    pub on_edge: Vec<bool>,

    /// Flat (cell, target) squared geodesic distance.
    pub distance2: Vec<f64>,

    pub source_de_deg: Vec<f64>,
    pub source_az_deg: Vec<f64>,
}

impl WavefrontFrame {
    pub fn new(num_de: usize, num_az: usize, num_freq: usize, num_targets: usize) -> Self {
        let n = num_de * num_az;
        Self {
            num_de,
            num_az,
            num_freq,
            num_targets,
            position: vec![Position1 { rho: 0.0, theta: 0.0, phi: 0.0 }; n],
            slowness: vec![Slowness1::default(); n],
            pos_gradient: vec![Slowness1::default(); n],
            ndir_gradient: vec![Slowness1::default(); n],
            sound_speed: vec![0.0; n],
            sound_gradient: vec![Gradient1::default(); n],
            attenuation: vec![0.0; n * num_freq],
            phase: vec![0.0; n * num_freq],
            counters: vec![Counters::default(); n],
            on_edge: vec![true; n],
            distance2: vec![f64::INFINITY; n * num_targets],
            source_de_deg: vec![0.0; num_de],
            source_az_deg: vec![0.0; num_az],
        }
    }

    #[inline]
    pub fn idx(&self, de: usize, az: usize) -> usize {
        de * self.num_az + az
    }

    #[inline]
    pub fn freq_idx(&self, de: usize, az: usize, f: usize) -> usize {
        self.idx(de, az) * self.num_freq + f
    }

    #[inline]
    pub fn target_idx(&self, de: usize, az: usize, t: usize) -> usize {
        self.idx(de, az) * self.num_targets + t
    }

    pub fn attenuation_at(&self, de: usize, az: usize) -> &[f64] {
        let i = self.idx(de, az) * self.num_freq;
        &self.attenuation[i..i + self.num_freq]
    }

    pub fn phase_at(&self, de: usize, az: usize) -> &[f64] {
        let i = self.idx(de, az) * self.num_freq;
        &self.phase[i..i + self.num_freq]
    }

    pub fn phase_at_mut(&mut self, de: usize, az: usize) -> &mut [f64] {
        let i = self.idx(de, az) * self.num_freq;
        &mut self.phase[i..i + self.num_freq]
    }

    pub fn attenuation_at_mut(&mut self, de: usize, az: usize) -> &mut [f64] {
        let i = self.idx(de, az) * self.num_freq;
        &mut self.attenuation[i..i + self.num_freq]
    }

    pub fn distance2_at(&self, de: usize, az: usize, t: usize) -> f64 {
        self.distance2[self.target_idx(de, az, t)]
    }

    /// Copy path-integrated accumulator fields (attenuation, phase,
    /// counters) from another frame's cell into this frame's cell, used
    /// when rotating the queue forward.
    pub fn copy_accumulators_from(&mut self, src: &WavefrontFrame, de: usize, az: usize) {
        let i = self.idx(de, az);
        self.counters[i] = src.counters[i];
        let base_dst = i * self.num_freq;
        let base_src = src.idx(de, az) * self.num_freq;
        for f in 0..self.num_freq {
            self.attenuation[base_dst + f] = src.attenuation[base_src + f];
            self.phase[base_dst + f] = src.phase[base_src + f];
        }
    }
}
