//! Fatal-error taxonomy. Numerical degeneracy and vanishing spreading are
//! *not* represented here: those are non-fatal and surface as a
//! `tracing::warn!` plus a dropped/extrapolated record instead of an
//! `Err`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("integrator instability: {message}")]
    IntegratorInstability { message: String },

    #[error("boundary query failed: {0}")]
    BoundaryQuery(#[from] anyhow::Error),
}
