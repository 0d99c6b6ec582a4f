//! # acoustic-types
//!
//! Shared wire types for the acoustic ray-propagation engine.
//!
//! These types are used by:
//! - `acoustic-engine`: the HTTP/WebSocket service that runs a wave queue and
//!   streams eigenray publication events
//! - `ocean-scenarios`: the CLI driver that builds named scenario presets and
//!   posts `RunRequest`s to the service (or drives the engine in-process)
//!
//! ## Coordinate Conventions
//!
//! - Internally the engine works in spherical earth coordinates (ρ, θ, φ).
//!   These wire types live at the external boundary, so they speak
//!   latitude/longitude/altitude and degrees.
//! - Depression/elevation (DE) is degrees, positive up. Azimuth (AZ) is
//!   degrees true, clockwise from north.
//! - Intensity is dB, positive = loss. Phase is radians.
//!
//! ## Invariants
//! - A `RunRequest` with fewer than three DE or AZ samples is rejected by the
//!   engine at construction as a configuration error.
//! - Every `RunProvenance` block's `block_hash` is the SHA-256 of
//!   `(prev_hash, timestamp_ms, event_type, payload_json)` — verified by
//!   `engine::audit::AuditLogger::verify`.

use serde::{Deserialize, Serialize};

// ── Geographic Position ───────────────────────────────────────────────────────

/// A single geographic point: latitude/longitude in degrees, altitude in
/// meters positive-up. The external-facing counterpart of the engine's
/// internal spherical (ρ, θ, φ) representation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_m: f64,
}

// ── Run Configuration ─────────────────────────────────────────────────────────

/// Selects which ambient ocean environment (`ocean-scenarios`) a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OceanProfileKind {
    /// Constant sound speed, flat boundaries.
    Isovelocity,
    /// Munk N²-linear SOFAR-channel profile.
    MunkProfile,
}

/// A target receiver grid location, addressed by (row, col) for eigenray
/// collection indexing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub row: usize,
    pub col: usize,
    pub position: GeoPoint,
}

/// Everything needed to construct and drive a wave queue from the outside:
/// source, launch fan, frequency set, targets, environment selector, and the
/// number of time steps to advance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub source: GeoPoint,
    /// Depression/elevation launch angles, degrees, positive up.
    pub source_de_deg: Vec<f64>,
    /// Azimuth launch angles, degrees true, clockwise.
    pub source_az_deg: Vec<f64>,
    pub frequencies_hz: Vec<f64>,
    pub time_step_s: f64,
    pub num_steps: u32,
    pub targets: Vec<TargetSpec>,
    pub ocean_profile: OceanProfileKind,
    /// Coherent (phasor) vs incoherent (squared-pressure) summation.
    pub coherent: bool,
    /// Flat-bottom depth, meters positive-down, used by the ambient
    /// boundary models behind both `OceanProfileKind` variants.
    pub bottom_depth_m: f64,
    /// Reference sound speed, m/s — the isovelocity value for
    /// `Isovelocity`, or the channel-axis speed for `MunkProfile`.
    pub reference_sound_speed_mps: f64,
}

// ── Eigenray Wire Record ──────────────────────────────────────────────────────

/// One source↔target arrival, flattened for JSON transport. Mirrors the
/// engine's internal `Eigenray` but drops anything that isn't meaningful
/// outside the engine (no gradient/stencil state).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EigenrayRecord {
    pub travel_time_s: f64,
    pub source_de_deg: f64,
    pub source_az_deg: f64,
    pub target_de_deg: f64,
    pub target_az_deg: f64,
    /// dB, one entry per requested frequency, positive = loss.
    pub intensity_db: Vec<f64>,
    /// radians, one entry per requested frequency.
    pub phase_rad: Vec<f64>,
    pub surface_count: u32,
    pub bottom_count: u32,
    pub caustic_count: u32,
}

/// Per-target list of arrivals plus the summed "total" entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetArrivals {
    pub row: usize,
    pub col: usize,
    pub eigenrays: Vec<EigenrayRecord>,
    pub total: EigenrayRecord,
}

/// The full result of a run: source, target grid, frequency set, and the
/// per-target arrival lists. This is the JSON rendering persisted by
/// `engine::persistence` and returned by `GET /runs/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,
    pub source: GeoPoint,
    pub frequencies_hz: Vec<f64>,
    pub arrivals: Vec<TargetArrivals>,
}

// ── Run Provenance Log (SHA-256 chained) ──────────────────────────────────────

/// Type of event recorded in a run's provenance chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunEventType {
    /// A `RunRequest` was accepted and queued.
    RunSubmitted,
    /// Summary of an eigenray published during the run (not every single
    /// eigenray — the full list lives in the resulting `RunResult`).
    EigenrayPublished,
    /// The run finished and its `RunResult` is available.
    RunCompleted,
}

impl std::fmt::Display for RunEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_string(self).unwrap_or_default();
        write!(f, "{}", s.trim_matches('"'))
    }
}

/// One block in the immutable SHA-256 chained run-provenance log. Tampering
/// with any block breaks the chain — detectable via `verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunProvenance {
    pub block_seq: u64,
    pub run_id: String,
    pub timestamp_ms: u64,
    /// Genesis block: prev_hash = 64 zeros.
    pub prev_hash: String,
    pub event_type: RunEventType,
    pub payload_json: String,
    pub block_hash: String,
}

// `RunProvenance` is a plain data record here; the hashing/chaining logic
// (and the `sha2` dependency it needs) lives only in `engine::audit`,
// which is the sole writer of this chain. This crate just carries the
// shape of a block across the wire.
