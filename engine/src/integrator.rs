//! RK3 bootstrap and AB3 stepping, plus the frame-update pass that follows
//! every integration.
//!
//! The "RK3 step" callers see is not a single monolithic operation: it is
//! built from three escalating staged calls (1st-order estimate, then a
//! 2nd-order correction using the first, then a 3rd-order correction
//! using both), each followed by a frame update. That staging is
//! reproduced here as `rk3_step`, which performs the RK1 → RK2 → RK3
//! sequence internally and exposes a single primitive to callers.
//!
//! The slowness vector is carried in physically-scaled tangent
//! components (slowness = direction / sound speed); converting the
//! tangent rate to angular rates of (theta, phi) divides by `rho` and
//! `rho * sin(theta)` respectively.

use crate::geo::Slowness1;
use crate::ocean::SoundSpeedProfile;
use crate::wavefront::WavefrontFrame;

/// Time-derivatives of position and slowness for a single ray, in the same
/// tangent-component basis as `Slowness1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RayDerivative {
    pub dpos: Slowness1,
    pub dslow: Slowness1,
}

/// Compute d(position)/dt and d(slowness)/dt for one ray cell, given the
/// local sound speed and gradient already cached on the frame.
pub fn derivative(frame: &WavefrontFrame, de: usize, az: usize) -> RayDerivative {
    let i = frame.idx(de, az);
    let c = frame.sound_speed[i];
    let grad = frame.sound_gradient[i];
    let s = frame.slowness[i];
    let c2 = c * c;

    let dpos = Slowness1 { rho: c2 * s.rho, theta: c2 * s.theta, phi: c2 * s.phi };
    let dslow = Slowness1 { rho: -grad.rho / c2, theta: -grad.theta / c2, phi: -grad.phi / c2 };
    RayDerivative { dpos, dslow }
}

/// Advance `position` by `dpos` (tangent velocity) over `dt`, respecting the
/// rho/theta/phi metric scale factors.
fn advance_position(pos: crate::geo::Position1, dpos: Slowness1, dt: f64) -> crate::geo::Position1 {
    let sin_theta = pos.theta.sin().abs().max(1e-9);
    crate::geo::Position1 {
        rho: pos.rho + dpos.rho * dt,
        theta: pos.theta + (dpos.theta / pos.rho) * dt,
        phi: pos.phi + (dpos.phi / (pos.rho * sin_theta)) * dt,
    }
}

/// Re-derive every cached field on a frame after its position/slowness have
/// changed: sound speed + gradient, derivatives (stashed via `pos_gradient`/
/// `ndir_gradient` for the next AB3 step), and squared distance to every
/// target.
pub fn update_frame(frame: &mut WavefrontFrame, ocean: &dyn SoundSpeedProfile, targets: &[(crate::geo::Position1, f64)]) {
    for de in 0..frame.num_de {
        for az in 0..frame.num_az {
            let i = frame.idx(de, az);
            let (c, grad) = ocean.sound_speed(&frame.position[i]);
            frame.sound_speed[i] = c;
            frame.sound_gradient[i] = grad;

            let deriv = derivative(frame, de, az);
            frame.pos_gradient[i] = deriv.dpos;
            frame.ndir_gradient[i] = deriv.dslow;

            let sin_theta_self = frame.position[i].theta.sin();
            for (t, (tgt_pos, sin_theta_tgt)) in targets.iter().enumerate() {
                let d2 = frame.position[i].chord_distance2(tgt_pos, sin_theta_self, *sin_theta_tgt);
                let ti = frame.target_idx(de, az, t);
                frame.distance2[ti] = d2;
            }
        }
    }
}

/// One cell's worth of staged RK1 -> RK2 -> RK3 integration, advancing by
/// `dt` (which may be negative, for the backward bootstrap and reflection
/// re-integration passes). `diagonal_only` selects whether the
/// Taylor/gradient bookkeeping used by the eigenray extractor is
/// refreshed mid-stage (full) or deferred to the final frame update
/// (diagonal-only, cheaper, used for the two throwaway inner history
/// frames during re-bootstrap).
pub fn rk3_step(
    src: &WavefrontFrame,
    ocean: &dyn SoundSpeedProfile,
    targets: &[(crate::geo::Position1, f64)],
    dt: f64,
    diagonal_only: bool,
) -> WavefrontFrame {
    // Stage 1 (RK1): simple Euler estimate from `src`.
    let mut k1 = src.clone();
    step_positions(&mut k1, src, dt);
    if !diagonal_only {
        update_frame(&mut k1, ocean, targets);
    } else {
        refresh_sound_speed_only(&mut k1, ocean);
    }

    // Stage 2 (RK2): re-evaluate the derivative at k1, blend with stage 1.
    let mut k2 = src.clone();
    step_positions_blend(&mut k2, src, &k1, dt, 0.5, 0.5);
    if !diagonal_only {
        update_frame(&mut k2, ocean, targets);
    } else {
        refresh_sound_speed_only(&mut k2, ocean);
    }

    // Stage 3 (RK3): third-order weighted combination using both prior
    // stages' derivatives, matching the classic RK3 (Heun-type) tableau.
    let mut k3 = src.clone();
    step_positions_rk3(&mut k3, src, &k1, &k2, dt);
    update_frame(&mut k3, ocean, targets);

    k3
}

fn step_positions(dst: &mut WavefrontFrame, src: &WavefrontFrame, dt: f64) {
    for de in 0..src.num_de {
        for az in 0..src.num_az {
            let i = src.idx(de, az);
            let deriv = derivative(src, de, az);
            dst.position[i] = advance_position(src.position[i], deriv.dpos, dt);
            dst.slowness[i] = src.slowness[i] + deriv.dslow * dt;
        }
    }
}

fn step_positions_blend(
    dst: &mut WavefrontFrame,
    src: &WavefrontFrame,
    mid: &WavefrontFrame,
    dt: f64,
    w_src: f64,
    w_mid: f64,
) {
    for de in 0..src.num_de {
        for az in 0..src.num_az {
            let i = src.idx(de, az);
            let d_src = derivative(src, de, az);
            let d_mid = derivative(mid, de, az);
            let dpos = Slowness1 {
                rho: w_src * d_src.dpos.rho + w_mid * d_mid.dpos.rho,
                theta: w_src * d_src.dpos.theta + w_mid * d_mid.dpos.theta,
                phi: w_src * d_src.dpos.phi + w_mid * d_mid.dpos.phi,
            };
            let dslow = Slowness1 {
                rho: w_src * d_src.dslow.rho + w_mid * d_mid.dslow.rho,
                theta: w_src * d_src.dslow.theta + w_mid * d_mid.dslow.theta,
                phi: w_src * d_src.dslow.phi + w_mid * d_mid.dslow.phi,
            };
            dst.position[i] = advance_position(src.position[i], dpos, dt);
            dst.slowness[i] = src.slowness[i] + dslow * dt;
        }
    }
}

fn step_positions_rk3(
    dst: &mut WavefrontFrame,
    src: &WavefrontFrame,
    k1: &WavefrontFrame,
    k2: &WavefrontFrame,
    dt: f64,
) {
    for de in 0..src.num_de {
        for az in 0..src.num_az {
            let i = src.idx(de, az);
            let d0 = derivative(src, de, az);
            let d1 = derivative(k1, de, az);
            let d2 = derivative(k2, de, az);
            // Classic third-order weights: (1/6, 0, ... ) adapted to the
            // two-stage predictor already computed above.
            let dpos = Slowness1 {
                rho: (d0.dpos.rho + 4.0 * d1.dpos.rho + d2.dpos.rho) / 6.0,
                theta: (d0.dpos.theta + 4.0 * d1.dpos.theta + d2.dpos.theta) / 6.0,
                phi: (d0.dpos.phi + 4.0 * d1.dpos.phi + d2.dpos.phi) / 6.0,
            };
            let dslow = Slowness1 {
                rho: (d0.dslow.rho + 4.0 * d1.dslow.rho + d2.dslow.rho) / 6.0,
                theta: (d0.dslow.theta + 4.0 * d1.dslow.theta + d2.dslow.theta) / 6.0,
                phi: (d0.dslow.phi + 4.0 * d1.dslow.phi + d2.dslow.phi) / 6.0,
            };
            dst.position[i] = advance_position(src.position[i], dpos, dt);
            dst.slowness[i] = src.slowness[i] + dslow * dt;
        }
    }
}

fn refresh_sound_speed_only(frame: &mut WavefrontFrame, ocean: &dyn SoundSpeedProfile) {
    for de in 0..frame.num_de {
        for az in 0..frame.num_az {
            let i = frame.idx(de, az);
            let (c, grad) = ocean.sound_speed(&frame.position[i]);
            frame.sound_speed[i] = c;
            frame.sound_gradient[i] = grad;
        }
    }
}

/// AB3 step of size `dt` from three prior frames, using weights
/// (23/12, -16/12, 5/12) on the cached time-derivatives.
pub fn ab3_step(
    past: &WavefrontFrame,
    prev: &WavefrontFrame,
    curr: &WavefrontFrame,
    ocean: &dyn SoundSpeedProfile,
    targets: &[(crate::geo::Position1, f64)],
    dt: f64,
) -> WavefrontFrame {
    let mut next = curr.clone();
    const W_CURR: f64 = 23.0 / 12.0;
    const W_PREV: f64 = -16.0 / 12.0;
    const W_PAST: f64 = 5.0 / 12.0;

    for de in 0..curr.num_de {
        for az in 0..curr.num_az {
            let i = curr.idx(de, az);
            let dpos = Slowness1 {
                rho: W_CURR * curr.pos_gradient[i].rho + W_PREV * prev.pos_gradient[i].rho + W_PAST * past.pos_gradient[i].rho,
                theta: W_CURR * curr.pos_gradient[i].theta + W_PREV * prev.pos_gradient[i].theta + W_PAST * past.pos_gradient[i].theta,
                phi: W_CURR * curr.pos_gradient[i].phi + W_PREV * prev.pos_gradient[i].phi + W_PAST * past.pos_gradient[i].phi,
            };
            let dslow = Slowness1 {
                rho: W_CURR * curr.ndir_gradient[i].rho + W_PREV * prev.ndir_gradient[i].rho + W_PAST * past.ndir_gradient[i].rho,
                theta: W_CURR * curr.ndir_gradient[i].theta + W_PREV * prev.ndir_gradient[i].theta + W_PAST * past.ndir_gradient[i].theta,
                phi: W_CURR * curr.ndir_gradient[i].phi + W_PREV * prev.ndir_gradient[i].phi + W_PAST * past.ndir_gradient[i].phi,
            };
            next.position[i] = advance_position(curr.position[i], dpos, dt);
            next.slowness[i] = curr.slowness[i] + dslow * dt;
        }
    }

    update_frame(&mut next, ocean, targets);
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Position1;
    use crate::ocean::Gradient1;

    struct Isovelocity(f64);
    impl SoundSpeedProfile for Isovelocity {
        fn sound_speed(&self, _position: &Position1) -> (f64, Gradient1) {
            (self.0, Gradient1::default())
        }
        fn attenuation(&self, _position: &Position1, frequencies_hz: &[f64], _distance_m: f64) -> Vec<f64> {
            vec![0.0; frequencies_hz.len()]
        }
    }

    #[test]
    fn straight_line_in_isovelocity() {
        let mut frame = WavefrontFrame::new(1, 1, 1, 0);
        frame.position[0] = Position1::from_latlon(45.0, -45.0, -1000.0);
        frame.slowness[0] = Slowness1::from_angles(0.0, 0.0, 1500.0);
        let ocean = Isovelocity(1500.0);
        update_frame(&mut frame, &ocean, &[]);
        let next = rk3_step(&frame, &ocean, &[], 1.0, false);
        // Horizontal ray in an isovelocity ocean should not change depth.
        assert!((next.position[0].altitude() - frame.position[0].altitude()).abs() < 1e-6);
    }
}
