//! Hybrid-Gaussian beam spreading model.
//!
//! Reproduces the constants (`SPREADING_WIDTH = 2π`,
//! `THRESHOLD ≈ 1.002305238`), the precomputed per-cell DE/AZ
//! normalization grid, the outward-walk-until-family-change structure in
//! both DE and AZ, and the 0.25× weight reduction applied to cells past
//! a caustic. The per-frequency Gaussian kernel's exact closed form is
//! reconstructed here from the surrounding call pattern. A fan whose
//! first and last AZ samples differ by exactly 2π is treated as circular:
//! the outward AZ walk wraps at the seam and a duplicate bitmap stops
//! either direction from re-counting the cell the other direction already
//! visited there.

use std::f64::consts::PI;

use crate::wavefront::WavefrontFrame;

pub const SPREADING_WIDTH: f64 = 2.0 * PI;
pub const THRESHOLD: f64 = 1.002305238;

/// Precomputed per-cell normalization factors converting beam amplitude
/// to spreading-loss intensity.
pub struct HybridGaussianSpreading {
    num_de: usize,
    num_az: usize,
    /// DE angular increment in radians, per DE row (wraps at the last row).
    norm_de_step: Vec<f64>,
    /// AZ angular increment in radians, per AZ column (wraps at the last
    /// column).
    norm_az_step: Vec<f64>,
    /// True when the AZ fan is a full 360° circle (first and last samples
    /// are the same physical direction, 2π apart).
    az_is_circular: bool,
    /// Flat (de, az) normalization grid.
    norm: Vec<f64>,
}

impl HybridGaussianSpreading {
    pub fn new(source_de_rad: &[f64], source_az_rad: &[f64]) -> Self {
        let num_de = source_de_rad.len();
        let num_az = source_az_rad.len();

        let mut norm_de_step = vec![0.0; num_de];
        for d in 0..num_de.saturating_sub(1) {
            norm_de_step[d] = source_de_rad[d + 1] - source_de_rad[d];
        }
        if num_de > 1 {
            norm_de_step[num_de - 1] = norm_de_step[0];
        }

        let az_is_circular = num_az > 2 && (source_az_rad[num_az - 1] - source_az_rad[0] - 2.0 * PI).abs() < 1e-6;

        let mut norm_az_step = vec![0.0; num_az];
        for a in 0..num_az.saturating_sub(1) {
            norm_az_step[a] = source_az_rad[a + 1] - source_az_rad[a];
        }
        if num_az > 1 {
            norm_az_step[num_az - 1] = norm_az_step[0];
        }

        let mut norm = vec![0.0; num_de * num_az];
        let sqrt_2pi = (2.0 * PI).sqrt();
        for d in 0..num_de {
            let d1 = d;
            let d2 = (d + 1).min(num_de - 1);
            let step_de = if norm_de_step[d].abs() > 1e-12 { norm_de_step[d] } else { 1e-12 };
            for a in 0..num_az {
                // The last AZ sample of a circular fan duplicates the first
                // (same physical direction on the 0/360 seam) and carries
                // no normalization weight of its own.
                if az_is_circular && a == num_az - 1 {
                    norm[d * num_az + a] = 0.0;
                    continue;
                }
                let (az2_rad, az1_rad) = if a + 1 < num_az {
                    (source_az_rad[a + 1], source_az_rad[a])
                } else {
                    (source_az_rad[0] + 2.0 * PI, source_az_rad[a])
                };
                let n = (source_de_rad[d2].sin() - source_de_rad[d1].sin()) * (az2_rad - az1_rad) / step_de;
                norm[d * num_az + a] = n / sqrt_2pi;
            }
        }

        Self { num_de, num_az, norm_de_step, norm_az_step, az_is_circular, norm }
    }

    /// The AZ index adjacent to `a` in `direction` (+1/-1), wrapping across
    /// the seam on a circular fan (index `num_az - 1` is identified with
    /// index `0`). Returns `None` off the edge of a non-circular fan.
    fn step_az(&self, a: usize, direction: i32) -> Option<usize> {
        if self.az_is_circular {
            let count = (self.num_az - 1) as i32;
            let a_mod = if a == self.num_az - 1 { 0 } else { a as i32 };
            Some((a_mod + direction).rem_euclid(count) as usize)
        } else {
            let next = a as i32 + direction;
            if next < 0 || next as usize >= self.num_az {
                None
            } else {
                Some(next as usize)
            }
        }
    }

    fn sigma2(c: f64, freq_hz: f64) -> f64 {
        let s = SPREADING_WIDTH * c / freq_hz.max(1e-6);
        s * s
    }

    fn gaussian(dist: f64, width: f64, sigma2: f64, norm: f64) -> f64 {
        norm * (-((dist - width).powi(2)) / sigma2.max(1e-12)).exp()
    }

    /// Half the geodesic distance between ray (de, az) and ray (de+delta,
    /// az), linearly interpolated between `curr` (weight `1 - u`) and
    /// `other` (weight `u`), where `other` is `next` when the CPA time
    /// offset is non-negative and `prev` otherwise.
    fn half_width(curr: &WavefrontFrame, other: &WavefrontFrame, de: usize, de_adj: usize, az: usize, u: f64) -> f64 {
        let sin_a = curr.position[curr.idx(de, az)].theta.sin();
        let sin_b = curr.position[curr.idx(de_adj, az)].theta.sin();
        let d_curr = curr.position[curr.idx(de, az)].chord_distance2(&curr.position[curr.idx(de_adj, az)], sin_a, sin_b).sqrt();
        let sin_a2 = other.position[other.idx(de, az)].theta.sin();
        let sin_b2 = other.position[other.idx(de_adj, az)].theta.sin();
        let d_other = other.position[other.idx(de, az)].chord_distance2(&other.position[other.idx(de_adj, az)], sin_a2, sin_b2).sqrt();
        0.5 * ((1.0 - u) * d_curr + u * d_other)
    }

    /// Half the geodesic distance between ray (de, az) and ray (de,
    /// az_adj), the AZ-axis counterpart of `half_width` (which varies DE at
    /// fixed AZ; this varies AZ at fixed DE).
    fn half_width_az(curr: &WavefrontFrame, other: &WavefrontFrame, de: usize, az: usize, az_adj: usize, u: f64) -> f64 {
        let sin_a = curr.position[curr.idx(de, az)].theta.sin();
        let sin_b = curr.position[curr.idx(de, az_adj)].theta.sin();
        let d_curr = curr.position[curr.idx(de, az)].chord_distance2(&curr.position[curr.idx(de, az_adj)], sin_a, sin_b).sqrt();
        let sin_a2 = other.position[other.idx(de, az)].theta.sin();
        let sin_b2 = other.position[other.idx(de, az_adj)].theta.sin();
        let d_other = other.position[other.idx(de, az)].chord_distance2(&other.position[other.idx(de, az_adj)], sin_a2, sin_b2).sqrt();
        0.5 * ((1.0 - u) * d_curr + u * d_other)
    }

    /// DE-axis sum: center contribution plus an outward walk in both
    /// directions, stopping on family change, edge, or below-threshold
    /// ratio to the running total.
    #[allow(clippy::too_many_arguments)]
    fn intensity_de(
        &self,
        curr: &WavefrontFrame,
        other: &WavefrontFrame,
        de: usize,
        az: usize,
        offset_de_frac: f64,
        u_time: f64,
        c: f64,
        frequencies_hz: &[f64],
    ) -> Vec<f64> {
        let n = frequencies_hz.len();
        let mut total = vec![0.0; n];

        let base_norm = self.norm[de * self.num_az + az];
        let w0 = Self::half_width(curr, other, de, (de + 1).min(self.num_de - 1), az, u_time);
        let cell_dist0 = offset_de_frac * w0 * 2.0;
        for (f, &freq) in frequencies_hz.iter().enumerate() {
            let sigma2 = Self::sigma2(c, freq);
            total[f] += Self::gaussian(cell_dist0, w0, sigma2, base_norm);
        }

        if total[0] < 1e-10 {
            return total;
        }

        for direction in [-1i32, 1i32] {
            let mut cell_dist = cell_dist0;
            let mut d = de as i32;
            loop {
                let next_d = d + direction;
                if next_d < 0 || next_d as usize >= self.num_de {
                    break;
                }
                let (lo, hi) = if direction < 0 { (next_d as usize, d as usize) } else { (d as usize, next_d as usize) };
                let family_lo = curr.counters[curr.idx(lo, az)];
                let family_hi = curr.counters[curr.idx(hi, az)];
                if curr.on_edge[curr.idx(next_d as usize, az)] && (family_lo.surface != family_hi.surface || family_lo.bottom != family_hi.bottom) {
                    break;
                }
                let w = Self::half_width(curr, other, lo, hi, az, u_time);
                cell_dist += direction as f64 * 2.0 * w;
                let norm_here = self.norm[next_d as usize * self.num_az + az];
                let weight = if curr.counters[curr.idx(next_d as usize, az)].caustic != 0 { 0.25 } else { 1.0 };

                let mut ratio_ok = false;
                for (f, &freq) in frequencies_hz.iter().enumerate() {
                    let sigma2 = Self::sigma2(c, freq);
                    let contrib = weight * Self::gaussian(cell_dist, w, sigma2, norm_here);
                    total[f] += contrib;
                    if f == 0 && total[0] > 1e-300 && (contrib / total[0]).abs() >= THRESHOLD - 1.0 {
                        ratio_ok = true;
                    }
                }
                d = next_d;
                if !ratio_ok {
                    break;
                }
            }
        }

        total
    }

    /// AZ-axis sum, symmetric to `intensity_de`. On a circular fan the
    /// outward walk wraps across the 0/360 seam instead of stopping at the
    /// array edge, and a `_duplicate` bitmap marks every index already
    /// folded into the sum so the seam cell (and whichever cell each
    /// direction's walk reaches last before meeting the other) is never
    /// counted twice.
    #[allow(clippy::too_many_arguments)]
    fn intensity_az(
        &self,
        curr: &WavefrontFrame,
        other: &WavefrontFrame,
        de: usize,
        az: usize,
        offset_az_frac: f64,
        u_time: f64,
        c: f64,
        frequencies_hz: &[f64],
    ) -> Vec<f64> {
        let n = frequencies_hz.len();
        let mut total = vec![0.0; n];

        let base_norm = self.norm[de * self.num_az + az];
        let az_hi = self.step_az(az, 1).unwrap_or(az);
        let w0 = Self::half_width_az(curr, other, de, az, az_hi, u_time);
        let cell_dist0 = offset_az_frac * w0 * 2.0;
        for (f, &freq) in frequencies_hz.iter().enumerate() {
            let sigma2 = Self::sigma2(c, freq);
            total[f] += Self::gaussian(cell_dist0, w0, sigma2, base_norm);
        }

        let mut duplicate = vec![false; self.num_az];
        duplicate[az] = true;
        if self.az_is_circular {
            duplicate[0] = true;
            duplicate[self.num_az - 1] = true;
        }

        for direction in [-1i32, 1i32] {
            let mut cell_dist = cell_dist0;
            let mut a = az;
            loop {
                let Some(next_a) = self.step_az(a, direction) else {
                    break;
                };
                if duplicate[next_a] {
                    break;
                }
                let w = Self::half_width_az(curr, other, de, a, next_a, u_time);
                cell_dist += direction as f64 * 2.0 * w;
                let norm_here = self.norm[de * self.num_az + next_a];
                let mut ratio_ok = false;
                for (f, &freq) in frequencies_hz.iter().enumerate() {
                    let sigma2 = Self::sigma2(c, freq);
                    let contrib = Self::gaussian(cell_dist, w, sigma2, norm_here);
                    total[f] += contrib;
                    if f == 0 && total[0] > 1e-300 && (contrib / total[0]).abs() >= THRESHOLD - 1.0 {
                        ratio_ok = true;
                    }
                }
                duplicate[next_a] = true;
                a = next_a;
                if !ratio_ok {
                    break;
                }
            }
        }

        total
    }

    /// Combined per-frequency intensity for a CPA at (de, az) with refined
    /// (time, DE, AZ) offsets. `time_step` is used to form `u = |x_time|/h`.
    #[allow(clippy::too_many_arguments)]
    pub fn intensity(
        &self,
        prev: &WavefrontFrame,
        curr: &WavefrontFrame,
        next: &WavefrontFrame,
        de: usize,
        az: usize,
        offset: &[f64; 3],
        time_step: f64,
        target_sound_speed: f64,
        frequencies_hz: &[f64],
    ) -> Vec<f64> {
        let u = (offset[0].abs() / time_step).min(1.0);
        let other: &WavefrontFrame = if offset[0] >= 0.0 { next } else { prev };

        let de_frac = offset[1] / self.norm_de_step[de.min(self.num_de - 1)].max(1e-12);
        let az_frac = offset[2] / self.norm_az_step[az.min(self.num_az - 1)].max(1e-12);

        let de_sum = self.intensity_de(curr, other, de, az, de_frac, u, target_sound_speed, frequencies_hz);
        let az_sum = self.intensity_az(curr, other, de, az, az_frac, u, target_sound_speed, frequencies_hz);

        de_sum.iter().zip(az_sum.iter()).map(|(a, b)| a * b).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn norm_grid_has_expected_shape() {
        let de: Vec<f64> = (0..5).map(|i| (i as f64 - 2.0).to_radians() * 5.0).collect();
        let az: Vec<f64> = (0..5).map(|i| (i as f64) * 10.0_f64.to_radians()).collect();
        let model = HybridGaussianSpreading::new(&de, &az);
        assert_eq!(model.norm.len(), 25);
    }

    #[test]
    fn non_circular_fan_is_not_flagged_circular() {
        let de: Vec<f64> = vec![-1.0_f64.to_radians(), 0.0, 1.0_f64.to_radians()];
        let az: Vec<f64> = (0..5).map(|i| (i as f64 - 2.0).to_radians()).collect();
        let model = HybridGaussianSpreading::new(&de, &az);
        assert!(!model.az_is_circular);
        assert_eq!(model.step_az(4, 1), None);
        assert_eq!(model.step_az(0, -1), None);
    }

    #[test]
    fn full_circle_fan_is_flagged_circular_and_wraps() {
        let de: Vec<f64> = vec![-1.0_f64.to_radians(), 0.0, 1.0_f64.to_radians()];
        let num_az = 8;
        let az: Vec<f64> = (0..num_az).map(|i| i as f64 * 2.0 * PI / (num_az as f64 - 1.0)).collect();
        let model = HybridGaussianSpreading::new(&de, &az);
        assert!(model.az_is_circular);
        // the last sample duplicates the first and carries no weight
        assert_eq!(model.norm[num_az - 1], 0.0);
        // stepping past the last index wraps to the first ring cell, not 0 itself
        assert_eq!(model.step_az(num_az - 1, 1), Some(1));
        assert_eq!(model.step_az(0, -1), Some(num_az - 2));
    }

    #[test]
    fn az_step_uses_the_real_angular_increment() {
        let de: Vec<f64> = vec![0.0];
        let az: Vec<f64> = vec![0.0, 0.1, 0.2];
        let model = HybridGaussianSpreading::new(&de, &az);
        assert!((model.norm_az_step[0] - 0.1).abs() < 1e-12);
    }
}
