//! HTTP + WebSocket service layer.
//!
//! `POST /runs` accepts a `RunRequest`, builds an ocean model and a
//! `WaveQueue`, and runs it to completion on a `tokio::task::spawn_blocking`
//! task so a large scenario cannot stall the async reactor. Individual
//! eigenray-publication events are streamed live over a `socketioxide`
//! channel as they're discovered, mirroring the listener model in
//! `listener.rs`; `GET /runs/:id` returns the finished `RunResult` once
//! the blocking task completes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use acoustic_types::{
    EigenrayRecord, GeoPoint, OceanProfileKind, RunEventType, RunRequest, RunResult, TargetArrivals,
};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use socketioxide::SocketIo;
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::ambient::{FlatBoundary, IsovelocityProfile, MunkProfile, RayleighBottom};
use crate::audit::AuditLogger;
use crate::collection::EigenrayCollection;
use crate::eigenray::Eigenray;
use crate::geo::Position1;
use crate::listener::EigenrayListener;
use crate::wave_queue::{OceanModel, WaveQueue, WaveQueueConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

struct RunRecord {
    status: RunStatus,
    result: Option<RunResult>,
    error: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    runs: Arc<RwLock<HashMap<String, RunRecord>>>,
    pub audit: AuditLogger,
    pub io: SocketIo,
}

impl AppState {
    pub fn new(audit: AuditLogger, io: SocketIo) -> Self {
        Self { runs: Arc::new(RwLock::new(HashMap::new())), audit, io }
    }
}

fn to_position(point: &GeoPoint) -> Position1 {
    Position1::from_latlon(point.latitude_deg, point.longitude_deg, point.altitude_m)
}

/// Forwards every published eigenray over an unbounded channel so an async
/// task can stream it out over `socketioxide` while the blocking trace
/// keeps running.
struct StreamingListener {
    tx: mpsc::UnboundedSender<(usize, usize, Eigenray)>,
}

impl EigenrayListener for StreamingListener {
    fn on_eigenray(&mut self, target_row: usize, target_col: usize, ray: &Eigenray, _run_id: &str) {
        let _ = self.tx.send((target_row, target_col, ray.clone()));
    }
}

/// Feeds every published eigenray into a shared `EigenrayCollection` behind
/// a `Mutex` so the caller can read it back out once the wave queue (and
/// its notifier, which owns the listener) has been dropped.
struct SharedCollectingListener {
    collection: Arc<StdMutex<EigenrayCollection>>,
}

impl EigenrayListener for SharedCollectingListener {
    fn on_eigenray(&mut self, target_row: usize, target_col: usize, ray: &Eigenray, _run_id: &str) {
        self.collection.lock().unwrap().add(target_row, target_col, ray.clone());
    }
}

fn to_record(ray: &Eigenray) -> EigenrayRecord {
    EigenrayRecord {
        travel_time_s: ray.travel_time_s,
        source_de_deg: ray.source_de_deg,
        source_az_deg: ray.source_az_deg,
        target_de_deg: ray.target_de_deg,
        target_az_deg: ray.target_az_deg,
        intensity_db: ray.intensity_db.clone(),
        phase_rad: ray.phase_rad.clone(),
        surface_count: ray.surface,
        bottom_count: ray.bottom,
        caustic_count: ray.caustic,
    }
}

fn build_ocean(request: &RunRequest) -> OceanModel {
    let surface = Arc::new(FlatBoundary { altitude_m: 0.0, loss_db: 0.0 });
    let bottom = Arc::new(RayleighBottom {
        altitude_m: -request.bottom_depth_m,
        critical_angle_deg: 15.0,
        loss_db_per_degree: 0.3,
    });
    let profile: Arc<dyn crate::ocean::SoundSpeedProfile> = match request.ocean_profile {
        OceanProfileKind::Isovelocity => {
            Arc::new(IsovelocityProfile { sound_speed_mps: request.reference_sound_speed_mps })
        }
        OceanProfileKind::MunkProfile => {
            Arc::new(MunkProfile { axis_speed_mps: request.reference_sound_speed_mps, ..MunkProfile::default() })
        }
    };
    OceanModel { profile, surface, bottom }
}

/// Run a scenario to completion. Blocking — intended for `spawn_blocking`.
/// Eigenrays are both collected (for the returned `RunResult`) and streamed
/// out over `stream_tx` as they're discovered.
///
/// The wave queue addresses targets by their position in `request.targets`
/// (`(index, 0)`, the convention `WaveQueue::detect_eigenrays` notifies
/// under), not by the caller-supplied `(row, col)` grid label; those labels
/// are reattached here when building the `RunResult`.
fn run_to_completion(
    run_id: String,
    request: RunRequest,
    stream_tx: mpsc::UnboundedSender<(usize, usize, Eigenray)>,
) -> anyhow::Result<RunResult> {
    let ocean = build_ocean(&request);
    let source = to_position(&request.source);
    let targets: Vec<Position1> = request.targets.iter().map(|t| to_position(&t.position)).collect();

    let config = WaveQueueConfig {
        source,
        source_de_deg: request.source_de_deg.clone(),
        source_az_deg: request.source_az_deg.clone(),
        frequencies_hz: request.frequencies_hz.clone(),
        time_step_s: request.time_step_s,
        targets: targets.clone(),
    };

    let mut queue = WaveQueue::new(ocean, config)?;

    let collection = Arc::new(StdMutex::new(EigenrayCollection::new(
        source,
        targets,
        request.frequencies_hz.clone(),
        request.coherent,
    )));
    queue.notifier.add_listener(Box::new(SharedCollectingListener { collection: collection.clone() }));
    queue.notifier.add_listener(Box::new(StreamingListener { tx: stream_tx }));

    for _ in 0..request.num_steps {
        queue.step(&run_id)?;
    }
    drop(queue);

    let collection = Arc::try_unwrap(collection)
        .map_err(|_| anyhow::anyhow!("eigenray collection still shared after run"))?
        .into_inner()
        .map_err(|_| anyhow::anyhow!("eigenray collection mutex poisoned"))?;

    let arrivals = request
        .targets
        .iter()
        .enumerate()
        .filter_map(|(index, t)| {
            let rays = collection.arrivals(index, 0);
            if rays.is_empty() {
                return None;
            }
            let total = collection.total(index, 0)?;
            Some(TargetArrivals {
                row: t.row,
                col: t.col,
                eigenrays: rays.iter().map(to_record).collect(),
                total: to_record(&total),
            })
        })
        .collect();

    Ok(RunResult { run_id, source: request.source, frequencies_hz: request.frequencies_hz, arrivals })
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

pub async fn submit_run(State(state): State<AppState>, Json(request): Json<RunRequest>) -> impl IntoResponse {
    let run_id = Uuid::new_v4().to_string();

    state
        .audit
        .record(
            &run_id,
            RunEventType::RunSubmitted,
            serde_json::json!({"targets": request.targets.len(), "num_steps": request.num_steps}),
        )
        .await;

    state.runs.write().await.insert(run_id.clone(), RunRecord { status: RunStatus::Running, result: None, error: None });

    let (stream_tx, mut stream_rx) = mpsc::unbounded_channel::<(usize, usize, Eigenray)>();
    let io = state.io.clone();
    let run_id_stream = run_id.clone();
    let audit_stream = state.audit.clone();
    tokio::spawn(async move {
        while let Some((row, col, ray)) = stream_rx.recv().await {
            audit_stream
                .record(
                    &run_id_stream,
                    RunEventType::EigenrayPublished,
                    serde_json::json!({"row": row, "col": col, "travelTimeS": ray.travel_time_s}),
                )
                .await;
            let _ = io.emit(
                "eigenray",
                &serde_json::json!({ "runId": run_id_stream, "row": row, "col": col, "eigenray": to_record(&ray) }),
            );
        }
    });

    let run_id_task = run_id.clone();
    let runs = state.runs.clone();
    let audit = state.audit.clone();
    tokio::spawn(async move {
        let outcome = tokio::task::spawn_blocking(move || run_to_completion(run_id_task.clone(), request, stream_tx))
            .await
            .map_err(|e| anyhow::anyhow!(e))
            .and_then(|r| r);

        match outcome {
            Ok(result) => {
                if let Err(e) = crate::persistence::save_run(&result).await {
                    warn!("failed to persist run {}: {e}", result.run_id);
                }
                audit
                    .record(
                        &result.run_id,
                        RunEventType::RunCompleted,
                        serde_json::json!({"arrivals": result.arrivals.len()}),
                    )
                    .await;
                info!(run_id = %result.run_id, "run completed");
                let mut runs = runs.write().await;
                if let Some(record) = runs.get_mut(&result.run_id) {
                    record.status = RunStatus::Completed;
                    record.result = Some(result);
                }
            }
            Err(e) => {
                warn!("run failed: {e}");
                let mut runs = runs.write().await;
                if let Some(record) = runs.get_mut(&run_id) {
                    record.status = RunStatus::Failed;
                    record.error = Some(e.to_string());
                }
            }
        }
    });

    (StatusCode::ACCEPTED, Json(serde_json::json!({ "runId": run_id })))
}

pub async fn get_run_provenance(State(state): State<AppState>, Path(run_id): Path<String>) -> impl IntoResponse {
    let chain = state.audit.chain(&run_id).await;
    if chain.is_empty() {
        return (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "unknown run id" }))).into_response();
    }
    let verified = state.audit.verify(&run_id).await;
    (StatusCode::OK, Json(serde_json::json!({ "verified": verified, "chain": chain }))).into_response()
}

pub async fn get_run(State(state): State<AppState>, Path(run_id): Path<String>) -> impl IntoResponse {
    {
        let runs = state.runs.read().await;
        match runs.get(&run_id) {
            Some(RunRecord { status: RunStatus::Completed, result: Some(r), .. }) => {
                return (StatusCode::OK, Json(serde_json::to_value(r).unwrap())).into_response();
            }
            Some(RunRecord { status: RunStatus::Running, .. }) => {
                return (StatusCode::ACCEPTED, Json(serde_json::json!({ "status": "running" }))).into_response();
            }
            Some(RunRecord { status: RunStatus::Failed, error, .. }) => {
                return (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": error }))).into_response();
            }
            _ => {}
        }
    }
    if let Some(result) = crate::persistence::load_run(&run_id).await {
        return (StatusCode::OK, Json(serde_json::to_value(result).unwrap())).into_response();
    }
    (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "unknown run id" }))).into_response()
}
