//! Save/load a completed run as pretty-printed JSON.
//!
//! The propagation core itself persists nothing; this is the one place a
//! finished run is written to disk, and the artifact the dead-reckoning
//! adjustment replays without re-tracing.

use std::path::{Path, PathBuf};

use acoustic_types::RunResult;
use anyhow::{Context, Result};
use tracing::{info, warn};

fn runs_dir() -> PathBuf {
    std::env::var("RUNS_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("runs"))
}

fn run_path(run_id: &str) -> PathBuf {
    runs_dir().join(format!("{run_id}.json"))
}

pub async fn save_run(result: &RunResult) -> Result<()> {
    let dir = runs_dir();
    if !Path::new(&dir).exists() {
        tokio::fs::create_dir_all(&dir).await.with_context(|| format!("creating {}", dir.display()))?;
    }
    let path = run_path(&result.run_id);
    let json = serde_json::to_string_pretty(result)?;
    tokio::fs::write(&path, json).await.with_context(|| format!("writing {}", path.display()))?;
    info!(run_id = %result.run_id, path = %path.display(), "run persisted");
    Ok(())
}

pub async fn load_run(run_id: &str) -> Option<RunResult> {
    let path = run_path(run_id);
    match tokio::fs::read_to_string(&path).await {
        Ok(data) => match serde_json::from_str::<RunResult>(&data) {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(run_id, "failed to parse persisted run: {e}");
                None
            }
        },
        Err(_) => None,
    }
}
