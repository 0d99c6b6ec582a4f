//! Collision detection, Taylor-series refinement, mirroring, and per-cell
//! history re-initialization.
//!
//! `bottom_reflection` and `surface_reflection` are deliberately
//! asymmetric: `bottom_reflection` uses the *refined* (post-Taylor)
//! direction for its grazing-angle dot product and has an
//! adverse-configuration fallback for the fractional time to impact;
//! `surface_reflection` computes grazing from the *original* (unrefined)
//! direction and has no such fallback. The surface path applies an
//! unconditional −π phase shift instead of a boundary-supplied one.

use crate::geo::{Position1, Slowness1};
use crate::integrator::{rk3_step, update_frame};
use crate::ocean::{Boundary, SoundSpeedProfile};
use crate::wavefront::WavefrontFrame;

/// A ray's position/slowness/sound-speed taken from a single frame, plus its
/// two central-difference derivatives — everything `collision_location`
/// needs for a 2nd-order Taylor expansion around `curr`.
struct CellTaylor {
    position: Position1,
    slowness: Slowness1,
    speed: f64,
    d_position: Slowness1,
    d2_position: Slowness1,
    d_slowness: Slowness1,
    d2_slowness: Slowness1,
    d_speed: f64,
    d2_speed: f64,
}

fn cell_taylor(past: &WavefrontFrame, prev: &WavefrontFrame, curr: &WavefrontFrame, next: &WavefrontFrame, de: usize, az: usize, time_step: f64) -> CellTaylor {
    let _ = past; // past is not used by collision_location's curr-centered expansion
    let i = curr.idx(de, az);
    let p = prev.position[i];
    let n = next.position[i];
    let c = curr.position[i];

    let d_position = Slowness1 {
        rho: (n.rho - p.rho) / (2.0 * time_step),
        theta: (n.theta - p.theta) / (2.0 * time_step),
        phi: (n.phi - p.phi) / (2.0 * time_step),
    };
    let d2_position = Slowness1 {
        rho: (n.rho + p.rho - 2.0 * c.rho) / (time_step * time_step),
        theta: (n.theta + p.theta - 2.0 * c.theta) / (time_step * time_step),
        phi: (n.phi + p.phi - 2.0 * c.phi) / (time_step * time_step),
    };

    let sp = prev.slowness[i];
    let sn = next.slowness[i];
    let sc = curr.slowness[i];
    let d_slowness = Slowness1 {
        rho: (sn.rho - sp.rho) / (2.0 * time_step),
        theta: (sn.theta - sp.theta) / (2.0 * time_step),
        phi: (sn.phi - sp.phi) / (2.0 * time_step),
    };
    let d2_slowness = Slowness1 {
        rho: (sn.rho + sp.rho - 2.0 * sc.rho) / (time_step * time_step),
        theta: (sn.theta + sp.theta - 2.0 * sc.theta) / (time_step * time_step),
        phi: (sn.phi + sp.phi - 2.0 * sc.phi) / (time_step * time_step),
    };

    let d_speed = (next.sound_speed[i] - prev.sound_speed[i]) / (2.0 * time_step);
    let d2_speed = (next.sound_speed[i] + prev.sound_speed[i] - 2.0 * curr.sound_speed[i]) / (time_step * time_step);

    CellTaylor {
        position: c,
        slowness: sc,
        speed: curr.sound_speed[i],
        d_position,
        d2_position,
        d_slowness,
        d2_slowness,
        d_speed,
        d2_speed,
    }
}

struct Collision {
    position: Position1,
    slowness: Slowness1,
    speed: f64,
}

/// Full 2nd-order Taylor expansion around `curr`, evaluated at `dt`.
fn collision_location(t: &CellTaylor, dt: f64) -> Collision {
    let half_dt2 = 0.5 * dt * dt;
    let position = Position1 {
        rho: t.position.rho + t.d_position.rho * dt + t.d2_position.rho * half_dt2,
        theta: t.position.theta + t.d_position.theta * dt + t.d2_position.theta * half_dt2,
        phi: t.position.phi + t.d_position.phi * dt + t.d2_position.phi * half_dt2,
    };
    let slowness = Slowness1 {
        rho: t.slowness.rho + t.d_slowness.rho * dt + t.d2_slowness.rho * half_dt2,
        theta: t.slowness.theta + t.d_slowness.theta * dt + t.d2_slowness.theta * half_dt2,
        phi: t.slowness.phi + t.d_slowness.phi * dt + t.d2_slowness.phi * half_dt2,
    };
    let speed = t.speed + t.d_speed * dt + t.d2_speed * half_dt2;
    Collision { position, slowness, speed }
}

fn mirror(slowness: Slowness1, normal: (f64, f64, f64), speed: f64) -> Slowness1 {
    let dot_full = 2.0 * (slowness.rho * normal.0 + slowness.theta * normal.1 + slowness.phi * normal.2) * speed * speed;
    let mirrored = Slowness1 {
        rho: slowness.rho - dot_full * normal.0,
        theta: slowness.theta - dot_full * normal.1,
        phi: slowness.phi - dot_full * normal.2,
    };
    let mag = (mirrored.rho * mirrored.rho + mirrored.theta * mirrored.theta + mirrored.phi * mirrored.phi).sqrt() * speed;
    if mag > 1e-12 {
        Slowness1 { rho: mirrored.rho / mag * speed, theta: mirrored.theta / mag * speed, phi: mirrored.phi / mag * speed }
    } else {
        mirrored
    }
}

/// Outcome of a triggered reflection: updated attenuation/phase to fold into
/// `next`'s accumulators, the reflected collision state, and the time
/// (relative to `curr`) at which the collision occurred, used by
/// `reflection_reinit`.
struct ReflectionResult {
    time_water: f64,
    collision: Collision,
    mirrored: Slowness1,
    grazing_rad: f64,
}

const TOO_SHALLOW: f64 = 3.0; // meters; below this the bottom normal is forced horizontal

fn try_bottom_reflection(
    past: &WavefrontFrame,
    prev: &WavefrontFrame,
    curr: &WavefrontFrame,
    next: &WavefrontFrame,
    bottom: &dyn Boundary,
    de: usize,
    az: usize,
    time_step: f64,
) -> Option<ReflectionResult> {
    let i = curr.idx(de, az);
    let position = curr.position[i];

    // The crossing is detected in `next`, the frame that actually left the
    // water column; `curr` is always a valid in-water frame by invariant
    // and can never be used for this test.
    let next_position = next.position[next.idx(de, az)];
    let (next_bottom_rho, _) = bottom.height(&next_position);
    let next_water_depth = next_position.rho - next_bottom_rho;
    if next_water_depth > 0.0 {
        return None;
    }

    let (bottom_rho, mut normal) = bottom.height(&position);
    let water_depth = position.rho - bottom_rho; // meters of water above the bottom at curr, always positive

    if water_depth < TOO_SHALLOW {
        normal = crate::ocean::BoundaryNormal { rho: 0.0, theta: normal.theta, phi: normal.phi };
        let mag = (normal.theta * normal.theta + normal.phi * normal.phi).sqrt().max(1e-9);
        normal.theta /= mag;
        normal.phi /= mag;
    }

    let c = curr.sound_speed[i];
    let c2 = c * c;
    let s = curr.slowness[i];
    // Rate of change of water_depth along the outward normal (pointing away
    // from the bottom into the water): negative while the ray heads toward
    // the bottom.
    let d_water_depth = s.rho * c2 * normal.rho + s.theta * c2 * normal.theta + s.phi * c2 * normal.phi;

    let mut time_water = if d_water_depth >= 0.0 {
        // Adverse configuration: moving away from the boundary yet `next`
        // still ended up on the wrong side.
        time_step * water_depth / (water_depth - next_water_depth).max(1e-12)
    } else {
        water_depth / -d_water_depth
    };
    time_water = time_water.clamp(0.0, time_step);

    let t = cell_taylor(past, prev, curr, next, de, az, time_step);
    let collision = collision_location(&t, time_water);

    // Grazing uses the *refined* (post-Taylor) direction (deliberate
    // asymmetry with the surface path): dot the direction at the collision
    // with the boundary's outward normal there and take arcsine of the
    // absolute value.
    let (_, normal2) = bottom.height(&collision.position);
    let dir = Slowness1 {
        rho: collision.slowness.rho * collision.speed,
        theta: collision.slowness.theta * collision.speed,
        phi: collision.slowness.phi * collision.speed,
    };
    let dot = dir.rho * normal2.rho + dir.theta * normal2.theta + dir.phi * normal2.phi;
    let grazing_rad = dot.abs().min(1.0).asin();

    let mirrored = mirror(collision.slowness, (normal2.rho, normal2.theta, normal2.phi), collision.speed);

    Some(ReflectionResult { time_water, collision, mirrored, grazing_rad })
}

fn try_surface_reflection(
    past: &WavefrontFrame,
    prev: &WavefrontFrame,
    curr: &WavefrontFrame,
    next: &WavefrontFrame,
    de: usize,
    az: usize,
    time_step: f64,
) -> Option<ReflectionResult> {
    let i = curr.idx(de, az);
    // The crossing is detected in `next`, the frame that actually left the
    // water column; `curr` is always a valid in-water frame by invariant.
    if next.position[next.idx(de, az)].altitude() <= 0.0 {
        return None;
    }

    let c = curr.sound_speed[i];
    let d = c * c * curr.slowness[i].rho;
    let time_water = if d == 0.0 { 0.0 } else { (-curr.position[i].altitude() / d).clamp(0.0, time_step) };

    let t = cell_taylor(past, prev, curr, next, de, az, time_step);
    let collision = collision_location(&t, time_water);

    // Grazing uses the *original*, unrefined direction (deliberate asymmetry
    // with the bottom path).
    let s = curr.slowness[i];
    let horiz = (s.theta * s.theta + s.phi * s.phi).sqrt();
    let grazing_rad = s.rho.atan2(horiz);
    if grazing_rad <= 0.0 {
        return None;
    }

    let mirrored = Slowness1 { rho: -collision.slowness.rho, theta: collision.slowness.theta, phi: collision.slowness.phi };

    Some(ReflectionResult { time_water, collision, mirrored, grazing_rad })
}

/// Rebuild the (past, prev, curr, next) history for one cell after a
/// collision, via three staged backward RK3 steps followed by one
/// forward AB3 step.
#[allow(clippy::too_many_arguments)]
fn reflection_reinit(
    past: &mut WavefrontFrame,
    prev: &mut WavefrontFrame,
    curr: &mut WavefrontFrame,
    next: &mut WavefrontFrame,
    ocean: &dyn SoundSpeedProfile,
    de: usize,
    az: usize,
    time_step: f64,
    result: &ReflectionResult,
) {
    let mut scratch_curr = WavefrontFrame::new(1, 1, curr.num_freq, 0);
    scratch_curr.position[0] = result.collision.position;
    scratch_curr.slowness[0] = result.mirrored;
    update_frame(&mut scratch_curr, ocean, &[]);

    // Back-date curr to the grid's wall-clock time (diagonal-only variant).
    let new_curr = rk3_step(&scratch_curr, ocean, &[], -result.time_water, true);
    // Back-date to prev (full variant).
    let new_prev = rk3_step(&new_curr, ocean, &[], -time_step, false);
    // Back-date to past (diagonal-only variant).
    let new_past = rk3_step(&new_prev, ocean, &[], -time_step, true);
    // Forward AB3 to rebuild next from the fresh three-step history.
    let new_next = crate::integrator::ab3_step(&new_past, &new_prev, &new_curr, ocean, &[], time_step);

    copy_cell(curr, &new_curr, de, az);
    copy_cell(prev, &new_prev, de, az);
    copy_cell(past, &new_past, de, az);
    copy_cell(next, &new_next, de, az);
}

fn copy_cell(dst: &mut WavefrontFrame, src: &WavefrontFrame, de: usize, az: usize) {
    let i = dst.idx(de, az);
    dst.position[i] = src.position[0];
    dst.slowness[i] = src.slowness[0];
    dst.pos_gradient[i] = src.pos_gradient[0];
    dst.ndir_gradient[i] = src.ndir_gradient[0];
    dst.sound_speed[i] = src.sound_speed[0];
    dst.sound_gradient[i] = src.sound_gradient[0];
}

fn bump_counters(past: &mut WavefrontFrame, prev: &mut WavefrontFrame, curr: &mut WavefrontFrame, next: &mut WavefrontFrame, de: usize, az: usize, surface: bool) {
    let i = next.idx(de, az);
    if surface {
        next.counters[i].surface += 1;
    } else {
        next.counters[i].bottom += 1;
    }
    let c = next.counters[i];
    curr.counters[curr.idx(de, az)] = c;
    prev.counters[prev.idx(de, az)] = c;
    past.counters[past.idx(de, az)] = c;
}

fn apply_loss(
    next: &mut WavefrontFrame,
    de: usize,
    az: usize,
    amplitude_db: &[f64],
    phase_rad: &[f64],
    extra_phase: f64,
) {
    let att = next.attenuation_at_mut(de, az);
    for (a, add) in att.iter_mut().zip(amplitude_db.iter()) {
        *a += add;
    }
    let phase = next.phase_at_mut(de, az);
    for (p, add) in phase.iter_mut().zip(phase_rad.iter()) {
        *p += add + extra_phase;
    }
}

/// Detect and resolve a bottom reflection at (de, az), then recurse into
/// the surface check so a ray that breaches both boundaries in one step
/// is fully resolved.
#[allow(clippy::too_many_arguments)]
pub fn detect_reflections_bottom(
    past: &mut WavefrontFrame,
    prev: &mut WavefrontFrame,
    curr: &mut WavefrontFrame,
    next: &mut WavefrontFrame,
    ocean: &dyn SoundSpeedProfile,
    bottom: &dyn Boundary,
    surface: &dyn Boundary,
    frequencies_hz: &[f64],
    de: usize,
    az: usize,
    time_step: f64,
) -> bool {
    let Some(result) = try_bottom_reflection(past, prev, curr, next, bottom, de, az, time_step) else {
        return false;
    };

    let (amplitude_db, phase_rad) = bottom.reflect_loss(&result.collision.position, frequencies_hz, result.grazing_rad);
    apply_loss(next, de, az, &amplitude_db, &phase_rad, 0.0);
    reflection_reinit(past, prev, curr, next, ocean, de, az, time_step, &result);
    bump_counters(past, prev, curr, next, de, az, false);

    detect_reflections_surface(past, prev, curr, next, ocean, bottom, surface, frequencies_hz, de, az, time_step);
    true
}

/// Detect and resolve a surface reflection, then recurse into the bottom
/// check (mutual recursion with `detect_reflections_bottom`).
#[allow(clippy::too_many_arguments)]
pub fn detect_reflections_surface(
    past: &mut WavefrontFrame,
    prev: &mut WavefrontFrame,
    curr: &mut WavefrontFrame,
    next: &mut WavefrontFrame,
    ocean: &dyn SoundSpeedProfile,
    bottom: &dyn Boundary,
    surface: &dyn Boundary,
    frequencies_hz: &[f64],
    de: usize,
    az: usize,
    time_step: f64,
) -> bool {
    if next.position[next.idx(de, az)].altitude() <= 0.0 {
        return false;
    }

    let Some(result) = try_surface_reflection(past, prev, curr, next, de, az, time_step) else {
        return false;
    };

    let (amplitude_db, _phase_rad) = surface.reflect_loss(&result.collision.position, frequencies_hz, result.grazing_rad);
    apply_loss(next, de, az, &amplitude_db, &vec![0.0; frequencies_hz.len()], -std::f64::consts::PI);
    reflection_reinit(past, prev, curr, next, ocean, de, az, time_step, &result);
    bump_counters(past, prev, curr, next, de, az, true);

    detect_reflections_bottom(past, prev, curr, next, ocean, bottom, surface, frequencies_hz, de, az, time_step);
    true
}
