//! The eigenray record and the CPA / Taylor-inverse math used to refine one
//! from a 27-point (3×3×3) stencil.
//!
//! The three-tier fallback in `compute_offsets` (full inverse → diagonal
//! → project onto known total distance) is the load-bearing trick that
//! makes eigenray extraction robust; the tier order and the axis (DE
//! only) that the third tier rewrites both matter and are preserved
//! exactly.

use crate::wavefront::WavefrontFrame;

/// A single source↔target arrival.
#[derive(Debug, Clone)]
pub struct Eigenray {
    pub travel_time_s: f64,
    pub source_de_deg: f64,
    pub source_az_deg: f64,
    pub target_de_deg: f64,
    pub target_az_deg: f64,
    /// dB, one per requested frequency, positive = loss.
    pub intensity_db: Vec<f64>,
    /// radians, one per requested frequency.
    pub phase_rad: Vec<f64>,
    pub surface: u32,
    pub bottom: u32,
    pub caustic: u32,
    pub upper_vertex: u32,
    pub lower_vertex: u32,
}

/// Step sizes along (time, DE, AZ) used by the centered-difference Taylor
/// expansion — `delta[1]`/`delta[2]` are in radians.
#[derive(Debug, Clone, Copy)]
pub struct Delta {
    pub time: f64,
    pub de: f64,
    pub az: f64,
}

impl Delta {
    pub fn axis(&self, n: usize) -> f64 {
        match n {
            0 => self.time,
            1 => self.de,
            _ => self.az,
        }
    }
}

/// 3×3×3 stencil of a scalar quantity (squared distance, or an angle) in
/// (time ∈ {prev,curr,next}, de ∈ {-1,0,+1}, az ∈ {-1,0,+1}) order.
pub type Stencil = [[[f64; 3]; 3]; 3];

/// Exact tie-breaking CPA test: is the center cell of `curr` a closer
/// approach to the target than every comparable neighbor in the 3×3×3
/// (time, de, az) neighborhood?
///
/// Ties are broken toward the higher-index neighbor (`nde==2 || naz==2`
/// uses `<=` against center; the mirrored lower-index comparison uses a
/// strict `<`). The `next`-frame test always uses `<=`; the `prev`-frame
/// test always uses `<`. Cells on the grid's azimuth boundary or flagged
/// `on_edge` are exempt from disqualifying the center (`continue`), which
/// is what lets eigenrays extrapolate cleanly past the rim of a ray family.
pub fn is_closest_ray(
    prev: &WavefrontFrame,
    curr: &WavefrontFrame,
    next: &WavefrontFrame,
    de: usize,
    az: usize,
    target: usize,
) -> bool {
    let idx = curr.idx(de, az);
    if curr.on_edge[idx] {
        return false;
    }

    let center = curr.distance2_at(de, az, target);

    let next_center = next.distance2_at(de, az, target);
    if next_center <= center {
        return false;
    }
    let prev_center = prev.distance2_at(de, az, target);
    if prev_center < center {
        return false;
    }

    for nde in 0..3usize {
        for naz in 0..3usize {
            if nde == 1 && naz == 1 {
                continue;
            }
            let d = de as isize + nde as isize - 1;
            let a = az as isize + naz as isize - 1;
            if d < 0 || d >= curr.num_de as isize {
                continue;
            }
            if a < 0 || a >= curr.num_az as isize {
                continue;
            }
            let (d, a) = (d as usize, a as usize);
            if a == 0 || a == curr.num_az - 1 {
                continue;
            }
            if curr.on_edge[curr.idx(d, a)] {
                continue;
            }

            let curr_v = curr.distance2_at(d, a, target);
            let disqualified = if nde == 2 || naz == 2 {
                curr_v <= center
            } else {
                curr_v < center
            };
            if disqualified {
                return false;
            }

            let next_v = next.distance2_at(d, a, target);
            if next_v <= center {
                return false;
            }
            let prev_v = prev.distance2_at(d, a, target);
            if prev_v < center {
                return false;
            }
        }
    }

    true
}

/// Gradient and (optionally off-diagonal) Hessian of a scalar stencil via
/// centered finite differences. The off-diagonal mixed-partial terms use
/// local scratch values rather than the original's scratch-reuse trick of
/// temporarily overwriting the gradient output — same numbers, cleaner
/// control flow.
pub fn make_taylor_coeff(value: &Stencil, delta: &Delta, diagonal_only: bool) -> (f64, [f64; 3], [[f64; 3]; 3]) {
    let center = value[1][1][1];

    let mut hessian = [[0.0; 3]; 3];
    hessian[0][0] = (value[2][1][1] + value[0][1][1] - 2.0 * center) / delta.time.powi(2);
    hessian[1][1] = (value[1][2][1] + value[1][0][1] - 2.0 * center) / delta.de.powi(2);
    hessian[2][2] = (value[1][1][2] + value[1][1][0] - 2.0 * center) / delta.az.powi(2);

    if !diagonal_only {
        let h01 = (value[2][2][1] - value[2][0][1] - value[0][2][1] + value[0][0][1]) / (4.0 * delta.time * delta.de);
        let h02 = (value[2][1][2] - value[2][1][0] - value[0][1][2] + value[0][1][0]) / (4.0 * delta.time * delta.az);
        let h12 = (value[1][2][2] - value[1][2][0] - value[1][0][2] + value[1][0][0]) / (4.0 * delta.de * delta.az);
        hessian[0][1] = h01;
        hessian[1][0] = h01;
        hessian[0][2] = h02;
        hessian[2][0] = h02;
        hessian[1][2] = h12;
        hessian[2][1] = h12;
    }

    let gradient = [
        (value[2][1][1] - value[0][1][1]) / (2.0 * delta.time),
        (value[1][2][1] - value[1][0][1]) / (2.0 * delta.de),
        (value[1][1][2] - value[1][1][0]) / (2.0 * delta.az),
    ];

    (center, gradient, hessian)
}

fn invert_symmetric3(h: &[[f64; 3]; 3]) -> Option<[[f64; 3]; 3]> {
    let (a, b, c) = (h[0][0], h[0][1], h[0][2]);
    let (_, d, e) = (h[1][0], h[1][1], h[1][2]);
    let (_, _, f) = (h[2][0], h[2][1], h[2][2]);

    let cof00 = d * f - e * e;
    let cof01 = -(b * f - e * c);
    let cof02 = b * e - d * c;
    let det = a * cof00 + b * cof01 + c * cof02;

    if det.abs() <= 1e-10 {
        return None;
    }

    let cof11 = a * f - c * c;
    let cof12 = -(a * e - c * b);
    let cof22 = a * d - b * b;

    let inv_det = 1.0 / det;
    Some([
        [cof00 * inv_det, cof01 * inv_det, cof02 * inv_det],
        [cof01 * inv_det, cof11 * inv_det, cof12 * inv_det],
        [cof02 * inv_det, cof12 * inv_det, cof22 * inv_det],
    ])
}

/// Outcome of the offset solve: per-axis offset (time, DE-angle, AZ-angle),
/// per-axis distance contribution, and whether the neighborhood required
/// the unstable fallback path.
pub struct Offsets {
    pub offset: [f64; 3],
    pub distance: [f64; 3],
    pub unstable: bool,
}

/// The three-tier Taylor-inverse fallback chain:
/// 1. Diagonal solution computed unconditionally first.
/// 2. Instability check (DE offset beyond half a beamwidth) using that
///    diagonal solution.
/// 3. Full 3×3 symmetric inverse, used in place of the diagonal solution
///    when it exists and the neighborhood isn't otherwise unstable.
/// 4. If still unstable, the DE-axis distance is recovered from the known
///    total CPA squared-distance rather than its own (possibly negative)
///    quadratic term.
pub fn compute_offsets(center: f64, gradient: &[f64; 3], hessian: &[[f64; 3]; 3], delta: &Delta, unstable_in: bool) -> Offsets {
    let mut offset = [0.0; 3];
    for n in 0..3 {
        offset[n] = -gradient[n] / hessian[n][n].max(1e-10);
    }

    let mut unstable = unstable_in;
    if (offset[1] / delta.de).abs() > 0.5 {
        unstable = true;
    }

    let det_forced_zero = unstable;
    if !det_forced_zero {
        if let Some(inv) = invert_symmetric3(hessian) {
            for n in 0..3 {
                offset[n] = -(inv[n][0] * gradient[0] + inv[n][1] * gradient[1] + inv[n][2] * gradient[2]);
            }
        }
    }

    let mut distance = [0.0; 3];
    for n in 0..3 {
        distance[n] = -gradient[n] * offset[n] - 0.5 * hessian[n][n] * offset[n] * offset[n];
    }

    if unstable {
        distance[1] = center - distance[0] - distance[2];
    }

    for n in 0..3 {
        let d = distance[n].max(0.0).sqrt();
        distance[n] = if offset[n] < 0.0 { -d } else { d };
        let lim = delta.axis(n);
        offset[n] = offset[n].clamp(-lim, lim);
    }

    Offsets { offset, distance, unstable }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taylor_gradient_of_paraboloid() {
        // value(t, d, a) = t^2 + 2*d^2 + 3*a^2, centered at 0 => gradient 0.
        let delta = Delta { time: 0.1, de: 0.01, az: 0.02 };
        let axis_vals = |n: i32, step: f64| (n as f64 * step).powi(2);
        let mut stencil: Stencil = [[[0.0; 3]; 3]; 3];
        for t in 0..3i32 {
            for d in 0..3i32 {
                for a in 0..3i32 {
                    let tv = axis_vals(t - 1, delta.time);
                    let dv = 2.0 * axis_vals(d - 1, delta.de);
                    let av = 3.0 * axis_vals(a - 1, delta.az);
                    stencil[t as usize][d as usize][a as usize] = tv + dv + av;
                }
            }
        }
        let (center, gradient, hessian) = make_taylor_coeff(&stencil, &delta, false);
        assert!(center.abs() < 1e-12);
        for g in gradient {
            assert!(g.abs() < 1e-9);
        }
        assert!((hessian[0][0] - 2.0).abs() < 1e-6);
        assert!((hessian[1][1] - 4.0).abs() < 1e-6);
        assert!((hessian[2][2] - 6.0).abs() < 1e-6);
    }
}
