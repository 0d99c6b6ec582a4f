//! Four-frame circular queue orchestration: construction/bootstrap, `step()`,
//! reflection/caustic/edge detection, and eigenray extraction.
//!
//! `step()`'s ordering is deliberate: reflect the about-to-rotate `next`
//! first, then rotate, then integrate, then propagate accumulators, then
//! extract eigenrays. `detect_eigenrays`'s CPA scan uses a second,
//! independent Taylor series for `target_de`/`target_az`, built on
//! direction angle rather than squared distance but reusing the same
//! offset vector.

use std::sync::Arc;

use tracing::warn;

use crate::eigenray::{compute_offsets, is_closest_ray, make_taylor_coeff, Delta, Eigenray, Stencil};
use crate::error::EngineError;
use crate::geo::Position1;
use crate::integrator::{ab3_step, rk3_step, update_frame};
use crate::listener::EigenrayNotifier;
use crate::ocean::{Boundary, SoundSpeedProfile};
use crate::reflection::{detect_reflections_bottom, detect_reflections_surface};
use crate::spreading::HybridGaussianSpreading;
use crate::wavefront::WavefrontFrame;

/// The ocean as seen by the wave queue: one sound-speed profile, a surface
/// boundary, and a bottom boundary.
pub struct OceanModel {
    pub profile: Arc<dyn SoundSpeedProfile>,
    pub surface: Arc<dyn Boundary>,
    pub bottom: Arc<dyn Boundary>,
}

/// Construction inputs for a wave queue.
pub struct WaveQueueConfig {
    pub source: Position1,
    pub source_de_deg: Vec<f64>,
    pub source_az_deg: Vec<f64>,
    pub frequencies_hz: Vec<f64>,
    pub time_step_s: f64,
    pub targets: Vec<Position1>,
}

pub struct WaveQueue {
    ocean: OceanModel,
    frequencies_hz: Vec<f64>,
    time_step: f64,
    source_de_rad: Vec<f64>,
    source_az_rad: Vec<f64>,
    targets: Vec<Position1>,
    target_sin_theta: Vec<f64>,

    past: WavefrontFrame,
    prev: WavefrontFrame,
    curr: WavefrontFrame,
    next: WavefrontFrame,
    time: f64,

    spreading: HybridGaussianSpreading,
    pub notifier: EigenrayNotifier,
}

impl WaveQueue {
    pub fn new(ocean: OceanModel, config: WaveQueueConfig) -> Result<Self, EngineError> {
        if config.source_de_deg.len() < 3 || config.source_az_deg.len() < 3 {
            return Err(EngineError::Configuration {
                message: "wave queue requires at least three DE and AZ samples for eigenray extraction".into(),
            });
        }
        if config.frequencies_hz.is_empty() {
            return Err(EngineError::Configuration { message: "frequency set must not be empty".into() });
        }

        let num_de = config.source_de_deg.len();
        let num_az = config.source_az_deg.len();
        let num_freq = config.frequencies_hz.len();
        let num_targets = config.targets.len();

        let source_de_rad: Vec<f64> = config.source_de_deg.iter().map(|d| crate::geo::to_radians(*d)).collect();
        let source_az_rad: Vec<f64> = config.source_az_deg.iter().map(|a| crate::geo::to_radians(*a)).collect();

        let (speed0, _) = ocean.profile.sound_speed(&config.source);
        if config.source.altitude() > 0.0 {
            return Err(EngineError::Configuration { message: "source must not be above the surface".into() });
        }

        let mut curr = WavefrontFrame::new(num_de, num_az, num_freq, num_targets);
        curr.source_de_deg = config.source_de_deg.clone();
        curr.source_az_deg = config.source_az_deg.clone();
        for (d, &de_deg) in config.source_de_deg.iter().enumerate() {
            for (a, &az_deg) in config.source_az_deg.iter().enumerate() {
                let i = curr.idx(d, a);
                curr.position[i] = config.source;
                curr.slowness[i] = crate::geo::Slowness1::from_angles(de_deg, az_deg, speed0);
            }
        }

        let target_sin_theta: Vec<f64> = config.targets.iter().map(|t| t.theta.sin()).collect();
        let targets_with_sin: Vec<(Position1, f64)> =
            config.targets.iter().cloned().zip(target_sin_theta.iter().cloned()).collect();

        update_frame(&mut curr, ocean.profile.as_ref(), &targets_with_sin);
        mark_edges(&mut curr);

        // Bootstrap: three backward RK3 steps, one forward AB3 step.
        let prev = rk3_step(&curr, ocean.profile.as_ref(), &targets_with_sin, -config.time_step_s, false);
        let past = rk3_step(&prev, ocean.profile.as_ref(), &targets_with_sin, -config.time_step_s, false);
        let next = ab3_step(&past, &prev, &curr, ocean.profile.as_ref(), &targets_with_sin, config.time_step_s);

        let spreading = HybridGaussianSpreading::new(&source_de_rad, &source_az_rad);

        Ok(Self {
            ocean,
            frequencies_hz: config.frequencies_hz,
            time_step: config.time_step_s,
            source_de_rad,
            source_az_rad,
            targets: config.targets,
            target_sin_theta,
            past,
            prev,
            curr,
            next,
            time: 0.0,
            spreading,
            notifier: EigenrayNotifier::new(),
        })
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn curr(&self) -> &WavefrontFrame {
        &self.curr
    }

    fn targets_with_sin(&self) -> Vec<(Position1, f64)> {
        self.targets.iter().cloned().zip(self.target_sin_theta.iter().cloned()).collect()
    }

    /// Advance the queue by one time step.
    pub fn step(&mut self, run_id: &str) -> Result<(), EngineError> {
        // 1. Reflection sweep on the about-to-rotate `next`. Surface and
        // bottom are two independent guarded checks, not an if/else on
        // altitude sign: each routine tests its own boundary crossing in
        // `next` and is a no-op when that boundary wasn't crossed, so a
        // ray that breached neither, either, or (in very shallow water)
        // both boundaries in a single step is handled correctly.
        for de in 0..self.curr.num_de {
            for az in 0..self.curr.num_az {
                detect_reflections_surface(
                    &mut self.past,
                    &mut self.prev,
                    &mut self.curr,
                    &mut self.next,
                    self.ocean.profile.as_ref(),
                    self.ocean.bottom.as_ref(),
                    self.ocean.surface.as_ref(),
                    &self.frequencies_hz,
                    de,
                    az,
                    self.time_step,
                );
                detect_reflections_bottom(
                    &mut self.past,
                    &mut self.prev,
                    &mut self.curr,
                    &mut self.next,
                    self.ocean.profile.as_ref(),
                    self.ocean.bottom.as_ref(),
                    self.ocean.surface.as_ref(),
                    &self.frequencies_hz,
                    de,
                    az,
                    self.time_step,
                );
            }
        }

        // 2. Edge detection on `next`.
        mark_edges(&mut self.next);

        // 3. Caustic detection between `curr` and `next`.
        detect_caustics(&self.curr, &mut self.next);

        // 3b. Vertex detection: a depth-trend reversal at a cell that did
        // not itself reflect this step.
        detect_vertices(&self.prev, &self.curr, &mut self.next);

        // 4. Queue rotation.
        std::mem::swap(&mut self.past, &mut self.prev);
        std::mem::swap(&mut self.prev, &mut self.curr);
        std::mem::swap(&mut self.curr, &mut self.next);
        self.time += self.time_step;

        // 5. Integration into the newly-scratch `next`, then propagate
        // path-integrated accumulators forward.
        let targets = self.targets_with_sin();
        let mut fresh_next = ab3_step(&self.past, &self.prev, &self.curr, self.ocean.profile.as_ref(), &targets, self.time_step);
        for de in 0..self.curr.num_de {
            for az in 0..self.curr.num_az {
                fresh_next.copy_accumulators_from(&self.curr, de, az);
            }
        }
        self.next = fresh_next;

        // 6. Eigenray extraction.
        self.detect_eigenrays(run_id);

        assert_finite(&self.next);
        Ok(())
    }

    fn detect_eigenrays(&mut self, run_id: &str) {
        if !self.notifier.has_listeners() || self.targets.is_empty() {
            return;
        }

        let delta = Delta {
            time: self.time_step,
            de: average_step(&self.source_de_rad),
            az: average_step(&self.source_az_rad),
        };

        for t in 0..self.targets.len() {
            for de in 1..self.curr.num_de.saturating_sub(1) {
                for az in 1..self.curr.num_az.saturating_sub(1) {
                    if !is_closest_ray(&self.prev, &self.curr, &self.next, de, az, t) {
                        continue;
                    }
                    if let Some(ray) = self.build_eigenray(de, az, t, &delta) {
                        let (row, col) = (t, 0);
                        self.notifier.notify(row, col, &ray, run_id);
                    }
                }
            }
        }
        self.notifier.check(self.time, run_id);
    }

    fn build_eigenray(&self, de: usize, az: usize, t: usize, delta: &Delta) -> Option<Eigenray> {
        let mut dist_stencil: Stencil = [[[0.0; 3]; 3]; 3];
        let mut unstable = false;
        let center_counters = self.curr.counters[self.curr.idx(de, az)];

        for (ti, frame) in [&self.prev, &self.curr, &self.next].into_iter().enumerate() {
            for (di, d) in ((de - 1)..=(de + 1)).enumerate() {
                for (ai, a) in ((az - 1)..=(az + 1)).enumerate() {
                    dist_stencil[ti][di][ai] = frame.distance2_at(d, a, t);
                    let c = self.curr.counters[self.curr.idx(d, a)];
                    if c != center_counters {
                        unstable = true;
                    }
                }
            }
        }

        let (center, gradient, hessian) = make_taylor_coeff(&dist_stencil, delta, false);
        let offsets = compute_offsets(center, &gradient, &hessian, delta, unstable);

        // Second, independent Taylor series on direction angle for
        // target_de / target_az, reusing the same offset vector.
        let mut de_angle_stencil: Stencil = [[[0.0; 3]; 3]; 3];
        let mut az_angle_stencil: Stencil = [[[0.0; 3]; 3]; 3];
        for (ti, frame) in [&self.prev, &self.curr, &self.next].into_iter().enumerate() {
            for (di, d) in ((de - 1)..=(de + 1)).enumerate() {
                for (ai, a) in ((az - 1)..=(az + 1)).enumerate() {
                    let s = frame.slowness[frame.idx(d, a)];
                    de_angle_stencil[ti][di][ai] = s.de_angle();
                    az_angle_stencil[ti][di][ai] = s.az_angle();
                }
            }
        }
        let (de_center, de_grad, de_hess) = make_taylor_coeff(&de_angle_stencil, delta, true);
        let (az_center, az_grad, az_hess) = make_taylor_coeff(&az_angle_stencil, delta, true);
        let eval_vector_taylor = |center: f64, grad: &[f64; 3], hess: &[[f64; 3]; 3], offset: &[f64; 3]| -> f64 {
            let linear = grad[0] * offset[0] + grad[1] * offset[1] + grad[2] * offset[2];
            let mut quad = 0.0;
            for i in 0..3 {
                for j in 0..3 {
                    quad += hess[i][j] * offset[i] * offset[j];
                }
            }
            center + linear + 0.5 * quad
        };
        let target_de = crate::geo::to_degrees(eval_vector_taylor(de_center, &de_grad, &de_hess, &offsets.offset));
        let target_az = crate::geo::to_degrees(eval_vector_taylor(az_center, &az_grad, &az_hess, &offsets.offset));

        let time = self.time + offsets.offset[0];
        let source_de = self.curr.source_de_deg[de] + crate::geo::to_degrees(offsets.offset[1]);
        let source_az = self.curr.source_az_deg[az] + crate::geo::to_degrees(offsets.offset[2]);

        let target_speed = self.ocean.profile.sound_speed(&self.targets[t]).0;
        let spread = self.spreading.intensity(
            &self.prev,
            &self.curr,
            &self.next,
            de,
            az,
            &offsets.offset,
            self.time_step,
            target_speed,
            &self.frequencies_hz,
        );

        if spread.iter().any(|v| v.is_nan()) || spread[0] <= 1e-20 {
            warn!("dropping eigenray at ({de},{az}) for target {t}: vanishing spreading intensity");
            return None;
        }

        let intensity_db: Vec<f64> = spread.iter().map(|v| -10.0 * v.log10()).collect();

        let dt_frac = if offsets.offset[0] >= 0.0 { offsets.offset[0] / self.time_step } else { 1.0 + offsets.offset[0] / self.time_step };
        let (att_lo, att_hi) = if offsets.offset[0] >= 0.0 {
            (self.curr.attenuation_at(de, az), self.next.attenuation_at(de, az))
        } else {
            (self.prev.attenuation_at(de, az), self.curr.attenuation_at(de, az))
        };
        let phase_src = self.curr.phase_at(de, az);

        let mut intensity_db = intensity_db;
        let mut phase_rad = vec![0.0; self.frequencies_hz.len()];
        for f in 0..self.frequencies_hz.len() {
            let att = att_lo[f] + dt_frac * (att_hi[f] - att_lo[f]);
            intensity_db[f] += att;
            phase_rad[f] = phase_src[f];
        }

        Some(Eigenray {
            travel_time_s: time,
            source_de_deg: source_de,
            source_az_deg: source_az,
            target_de_deg: target_de,
            target_az_deg: target_az,
            intensity_db,
            phase_rad,
            surface: center_counters.surface,
            bottom: center_counters.bottom,
            caustic: center_counters.caustic,
            upper_vertex: center_counters.upper_vertex,
            lower_vertex: center_counters.lower_vertex,
        })
    }
}

fn average_step(angles_rad: &[f64]) -> f64 {
    if angles_rad.len() < 2 {
        return 1e-6;
    }
    let mut total = 0.0;
    for w in angles_rad.windows(2) {
        total += (w[1] - w[0]).abs();
    }
    (total / (angles_rad.len() - 1) as f64).max(1e-9)
}

/// Recompute the on-edge map: perimeter cells are always edges; interior
/// cells are edges if any neighbor's (surface, bottom, caustic) counts
/// differ from their own.
fn mark_edges(frame: &mut WavefrontFrame) {
    let (num_de, num_az) = (frame.num_de, frame.num_az);
    let mut edges = vec![false; num_de * num_az];
    for de in 0..num_de {
        for az in 0..num_az {
            let idx = frame.idx(de, az);
            if de == 0 || de == num_de - 1 || az == 0 || az == num_az - 1 {
                edges[idx] = true;
                continue;
            }
            let c = frame.counters[idx];
            let mut edge = false;
            for (dd, da) in [(-1i32, 0i32), (1, 0), (0, -1), (0, 1)] {
                let nd = (de as i32 + dd) as usize;
                let na = (az as i32 + da) as usize;
                if frame.counters[frame.idx(nd, na)] != c {
                    edge = true;
                    break;
                }
            }
            edges[idx] = edge;
        }
    }
    frame.on_edge = edges;
}

/// Fold inversion test between adjacent DE rays of `curr` and `next`;
/// increments the caustic counter at the *higher* DE index (`d+1`) and
/// subtracts π/2 from phase at every frequency.
fn detect_caustics(curr: &WavefrontFrame, next: &mut WavefrontFrame) {
    for az in 0..curr.num_az {
        for d in 0..curr.num_de.saturating_sub(1) {
            let a_rho = curr.position[curr.idx(d + 1, az)].rho;
            let b_rho = curr.position[curr.idx(d, az)].rho;
            let c_rho = next.position[next.idx(d + 1, az)].rho;
            let d_rho = next.position[next.idx(d, az)].rho;

            let next_hi = next.counters[next.idx(d + 1, az)];
            let next_lo = next.counters[next.idx(d, az)];
            let fold_family = next_hi.surface == next_lo.surface && next_hi.bottom == next_lo.bottom;

            if (c_rho - d_rho) * (a_rho - b_rho) < 0.0 && fold_family {
                let idx = next.idx(d + 1, az);
                next.counters[idx].caustic += 1;
                let phase = next.phase_at_mut(d + 1, az);
                for p in phase.iter_mut() {
                    *p -= std::f64::consts::FRAC_PI_2;
                }
            }
        }
    }
}

/// A vertex is a local extremum of a ray's altitude (depth) that does not
/// involve a boundary contact. Detected per-ray (no neighbor
/// comparison, unlike caustics) by a sign change in the altitude trend
/// across (prev, curr, next); a cell that reflected this step already has
/// its direction change accounted for by the surface/bottom counter, so
/// it is excluded here.
fn detect_vertices(prev: &WavefrontFrame, curr: &WavefrontFrame, next: &mut WavefrontFrame) {
    for de in 0..curr.num_de {
        for az in 0..curr.num_az {
            let i = curr.idx(de, az);
            if next.counters[i].surface != curr.counters[i].surface || next.counters[i].bottom != curr.counters[i].bottom {
                continue;
            }
            let d_in = curr.position[i].altitude() - prev.position[i].altitude();
            let d_out = next.position[i].altitude() - curr.position[i].altitude();
            if d_in < 0.0 && d_out > 0.0 {
                next.counters[i].upper_vertex += 1;
            } else if d_in > 0.0 && d_out < 0.0 {
                next.counters[i].lower_vertex += 1;
            }
        }
    }
}

fn assert_finite(frame: &WavefrontFrame) {
    debug_assert!(frame.phase.iter().all(|p| p.is_finite()), "non-finite phase after step()");
    debug_assert!(frame.attenuation.iter().all(|a| a.is_finite()), "non-finite attenuation after step()");
}
