//! `EigenrayCollection`: per-target grouping of arrivals, coherent/
//! incoherent summation, and dead-reckoning adjustment.
//!
//! Subscribes to the wave queue's listener dispatch via a
//! `CollectingListener` adapter rather than the queue knowing about
//! collections directly.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use crate::eigenray::Eigenray;
use crate::geo::{to_degrees, to_radians, Position1, EARTH_RADIUS};
use crate::listener::EigenrayListener;

/// All arrivals recorded for one `(target_row, target_col)` pair.
#[derive(Debug, Clone, Default)]
pub struct TargetArrivals {
    pub eigenrays: Vec<Eigenray>,
    /// Running minimum travel time across arrivals so far.
    pub earliest_time_s: f64,
}

impl TargetArrivals {
    fn push(&mut self, ray: Eigenray) {
        if self.eigenrays.is_empty() || ray.travel_time_s < self.earliest_time_s {
            self.earliest_time_s = ray.travel_time_s;
        }
        self.eigenrays.push(ray);
    }
}

/// Per-target eigenray lists plus the source position, target grid, and
/// frequency set needed to interpret them.
#[derive(Debug, Clone)]
pub struct EigenrayCollection {
    pub source: Position1,
    pub targets: Vec<Position1>,
    pub frequencies_hz: Vec<f64>,
    /// Coherent (phasor) vs incoherent (squared-pressure) summation for
    /// `total()`.
    pub coherent: bool,
    arrivals: BTreeMap<(usize, usize), TargetArrivals>,
}

impl EigenrayCollection {
    pub fn new(source: Position1, targets: Vec<Position1>, frequencies_hz: Vec<f64>, coherent: bool) -> Self {
        Self { source, targets, frequencies_hz, coherent, arrivals: BTreeMap::new() }
    }

    pub fn add(&mut self, row: usize, col: usize, ray: Eigenray) {
        self.arrivals.entry((row, col)).or_default().push(ray);
    }

    pub fn arrivals(&self, row: usize, col: usize) -> &[Eigenray] {
        self.arrivals.get(&(row, col)).map(|a| a.eigenrays.as_slice()).unwrap_or(&[])
    }

    pub fn keys(&self) -> impl Iterator<Item = &(usize, usize)> {
        self.arrivals.keys()
    }

    pub fn num_frequencies(&self) -> usize {
        self.frequencies_hz.len()
    }

    /// Summed "total" entry for one target, via a coherent/incoherent
    /// phasor sum. `None` if the target has no recorded arrivals.
    pub fn total(&self, row: usize, col: usize) -> Option<Eigenray> {
        let arrivals = self.arrivals.get(&(row, col))?;
        if arrivals.eigenrays.is_empty() {
            return None;
        }
        Some(if self.coherent {
            sum_coherent(&arrivals.eigenrays, &self.frequencies_hz)
        } else {
            sum_incoherent(&arrivals.eigenrays, &self.frequencies_hz)
        })
    }

    pub fn totals(&self) -> Vec<((usize, usize), Eigenray)> {
        self.keys().filter_map(|&(r, c)| self.total(r, c).map(|t| ((r, c), t))).collect()
    }
}

/// Listener adapter that feeds every published eigenray into an owned
/// `EigenrayCollection`; the core doesn't know about collection/
/// summation, it just publishes.
pub struct CollectingListener {
    pub collection: EigenrayCollection,
}

impl CollectingListener {
    pub fn new(collection: EigenrayCollection) -> Self {
        Self { collection }
    }
}

impl EigenrayListener for CollectingListener {
    fn on_eigenray(&mut self, target_row: usize, target_col: usize, ray: &Eigenray, _run_id: &str) {
        self.collection.add(target_row, target_col, ray.clone());
    }
}

/// Amplitude (pressure ratio) implied by an intensity-loss value in dB.
fn amplitude_from_db(intensity_db: f64) -> f64 {
    10f64.powf(-intensity_db / 20.0)
}

fn sum_coherent(rays: &[Eigenray], frequencies_hz: &[f64]) -> Eigenray {
    let n = frequencies_hz.len();
    let mut intensity_db = vec![0.0; n];
    let mut phase_rad = vec![0.0; n];

    // Weight used for the scalar averages below is the squared amplitude
    // at the first frequency, the same convention used elsewhere (e.g.
    // spreading's lowest-frequency ratio test) for picking a single
    // representative frequency.
    let mut weight_sum = 0.0;
    let mut time_acc = 0.0;
    let mut source_de_acc = 0.0;
    let mut target_de_acc = 0.0;
    let mut source_az_e = 0.0;
    let mut source_az_n = 0.0;
    let mut target_az_e = 0.0;
    let mut target_az_n = 0.0;
    let mut strongest_weight = -1.0;
    let mut strongest: Option<&Eigenray> = None;

    for f in 0..n {
        let mut re = 0.0;
        let mut im = 0.0;
        for ray in rays {
            let a = amplitude_from_db(ray.intensity_db[f]);
            let mut p = 2.0 * PI * frequencies_hz[f] * ray.travel_time_s + ray.phase_rad[f];
            p = p.rem_euclid(2.0 * PI);
            re += a * p.cos();
            im += a * p.sin();
        }
        let mag = (re * re + im * im).sqrt();
        intensity_db[f] = -20.0 * mag.max(1e-15).log10();
        phase_rad[f] = im.atan2(re);
    }

    for ray in rays {
        let a0 = amplitude_from_db(ray.intensity_db[0]);
        let w = a0 * a0;
        weight_sum += w;
        time_acc += w * ray.travel_time_s;
        source_de_acc += w * ray.source_de_deg;
        target_de_acc += w * ray.target_de_deg;
        let saz = to_radians(ray.source_az_deg);
        source_az_e += w * saz.sin();
        source_az_n += w * saz.cos();
        let taz = to_radians(ray.target_az_deg);
        target_az_e += w * taz.sin();
        target_az_n += w * taz.cos();
        if w > strongest_weight {
            strongest_weight = w;
            strongest = Some(ray);
        }
    }

    let w = weight_sum.max(1e-300);
    let strongest = strongest.unwrap();

    Eigenray {
        travel_time_s: time_acc / w,
        source_de_deg: source_de_acc / w,
        source_az_deg: vector_mean_angle_deg(source_az_e, source_az_n),
        target_de_deg: target_de_acc / w,
        target_az_deg: vector_mean_angle_deg(target_az_e, target_az_n),
        intensity_db,
        phase_rad,
        surface: strongest.surface,
        bottom: strongest.bottom,
        caustic: strongest.caustic,
        upper_vertex: strongest.upper_vertex,
        lower_vertex: strongest.lower_vertex,
    }
}

/// Identical to `sum_coherent` except amplitudes are summed in
/// squared-pressure space with zero phase.
fn sum_incoherent(rays: &[Eigenray], frequencies_hz: &[f64]) -> Eigenray {
    let n = frequencies_hz.len();
    let mut intensity_db = vec![0.0; n];
    let phase_rad = vec![0.0; n];

    for f in 0..n {
        let mut power = 0.0;
        for ray in rays {
            let a = amplitude_from_db(ray.intensity_db[f]);
            power += a * a;
        }
        intensity_db[f] = -10.0 * power.max(1e-15).log10();
    }

    let mut weight_sum = 0.0;
    let mut time_acc = 0.0;
    let mut source_de_acc = 0.0;
    let mut target_de_acc = 0.0;
    let mut source_az_e = 0.0;
    let mut source_az_n = 0.0;
    let mut target_az_e = 0.0;
    let mut target_az_n = 0.0;
    let mut strongest_weight = -1.0;
    let mut strongest: Option<&Eigenray> = None;

    for ray in rays {
        let a0 = amplitude_from_db(ray.intensity_db[0]);
        let w = a0 * a0;
        weight_sum += w;
        time_acc += w * ray.travel_time_s;
        source_de_acc += w * ray.source_de_deg;
        target_de_acc += w * ray.target_de_deg;
        let saz = to_radians(ray.source_az_deg);
        source_az_e += w * saz.sin();
        source_az_n += w * saz.cos();
        let taz = to_radians(ray.target_az_deg);
        target_az_e += w * taz.sin();
        target_az_n += w * taz.cos();
        if w > strongest_weight {
            strongest_weight = w;
            strongest = Some(ray);
        }
    }

    let w = weight_sum.max(1e-300);
    let strongest = strongest.unwrap();

    Eigenray {
        travel_time_s: time_acc / w,
        source_de_deg: source_de_acc / w,
        source_az_deg: vector_mean_angle_deg(source_az_e, source_az_n),
        target_de_deg: target_de_acc / w,
        target_az_deg: vector_mean_angle_deg(target_az_e, target_az_n),
        intensity_db,
        phase_rad,
        surface: strongest.surface,
        bottom: strongest.bottom,
        caustic: strongest.caustic,
        upper_vertex: strongest.upper_vertex,
        lower_vertex: strongest.lower_vertex,
    }
}

/// Average a set of (east, north) weighted vector components back into an
/// angle so that e.g. 359° and 1° average to 0°, not 180°.
fn vector_mean_angle_deg(east: f64, north: f64) -> f64 {
    if east.abs() < 1e-300 && north.abs() < 1e-300 {
        return 0.0;
    }
    to_degrees(east.atan2(north))
}

/// East/north/up meters offset between two nearby positions, flat-earth
/// approximation — adequate for a nearby new source and target, not used
/// for absolute ranges.
fn enu_offset(from: &Position1, to: &Position1) -> (f64, f64, f64) {
    let lat0 = to_radians(from.latitude());
    let dlat = to_radians(to.latitude() - from.latitude());
    let dlon = to_radians(to.longitude() - from.longitude());
    let north = dlat * EARTH_RADIUS;
    let east = dlon * EARTH_RADIUS * lat0.cos();
    let up = to.altitude() - from.altitude();
    (east, north, up)
}

fn direction_enu(de_deg: f64, az_deg: f64) -> (f64, f64, f64) {
    let de = to_radians(de_deg);
    let az = to_radians(az_deg);
    let horiz = de.cos();
    (horiz * az.sin(), horiz * az.cos(), de.sin())
}

fn dot3(a: (f64, f64, f64), b: (f64, f64, f64)) -> f64 {
    a.0 * b.0 + a.1 * b.1 + a.2 * b.2
}

fn norm3(a: (f64, f64, f64)) -> f64 {
    (a.0 * a.0 + a.1 * a.1 + a.2 * a.2).sqrt()
}

/// Adjust a previously-computed eigenray list to a nearby new source/target
/// without re-running the ray trace. Each arrival's travel time is
/// shifted by the slant-range change projected along the ray direction at
/// the source; intensity is recomputed from the `20 log10 R + alpha R`
/// spreading-plus-attenuation model evaluated at the old and new ranges.
pub fn dead_reckon(
    arrivals: &[Eigenray],
    old_source: &Position1,
    new_source: &Position1,
    old_target: &Position1,
    new_target: &Position1,
    sound_speed_mps: f64,
    atten_db_per_m: f64,
) -> Vec<Eigenray> {
    let source_shift = enu_offset(old_source, new_source);
    let target_shift = enu_offset(old_target, new_target);
    if norm3(source_shift) < 1e-3 && norm3(target_shift) < 1e-3 {
        return arrivals.to_vec();
    }

    let old_range = old_source.straight_line_distance(old_target).max(1.0);
    let new_range = new_source.straight_line_distance(new_target).max(1.0);
    let old_model = 20.0 * old_range.log10() + atten_db_per_m * old_range;
    let new_model = 20.0 * new_range.log10() + atten_db_per_m * new_range;
    let delta_loss_db = new_model - old_model;

    arrivals
        .iter()
        .map(|ray| {
            let dir = direction_enu(ray.source_de_deg, ray.source_az_deg);
            let dr_source = dot3(source_shift, dir);
            let dr_target = dot3(target_shift, dir);
            let delta_r = dr_target - dr_source;
            let dt = delta_r / sound_speed_mps;

            let mut adjusted = ray.clone();
            adjusted.travel_time_s += dt;
            for i in adjusted.intensity_db.iter_mut() {
                *i += delta_loss_db;
            }
            adjusted
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ray(time: f64, loss_db: f64) -> Eigenray {
        Eigenray {
            travel_time_s: time,
            source_de_deg: 0.0,
            source_az_deg: 0.0,
            target_de_deg: 0.0,
            target_az_deg: 0.0,
            intensity_db: vec![loss_db],
            phase_rad: vec![0.0],
            surface: 0,
            bottom: 0,
            caustic: 0,
            upper_vertex: 0,
            lower_vertex: 0,
        }
    }

    #[test]
    fn incoherent_sum_of_equal_arrivals_is_3db_louder() {
        let rays = vec![ray(1.0, 60.0), ray(1.0, 60.0)];
        let total = sum_incoherent(&rays, &[1000.0]);
        assert!((total.intensity_db[0] - (60.0 - 3.0102)).abs() < 1e-2);
    }

    #[test]
    fn vector_mean_wraps_around_north() {
        // 359 deg and 1 deg should average to 0, not 180.
        let a = to_radians(359.0);
        let b = to_radians(1.0);
        let east = a.sin() + b.sin();
        let north = a.cos() + b.cos();
        let mean = vector_mean_angle_deg(east, north);
        assert!(mean.abs() < 1.0 || (mean - 360.0).abs() < 1.0);
    }

    #[test]
    fn dead_reckoning_is_noop_below_threshold() {
        let src = Position1::from_latlon(45.0, -45.0, -100.0);
        let tgt = Position1::from_latlon(45.1, -45.0, -100.0);
        let rays = vec![ray(10.0, 70.0)];
        let out = dead_reckon(&rays, &src, &src, &tgt, &tgt, 1500.0, 0.0);
        assert_eq!(out[0].travel_time_s, rays[0].travel_time_s);
    }
}
