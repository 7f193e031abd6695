//! Route table and handlers for the mission API.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use futures_util::stream::Stream;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::info;

use crate::models::checkpoint::Checkpoint;
use crate::models::mission::Mission;
use crate::orchestrator::checkpoint_controller::CheckpointController;
use crate::orchestrator::engine::{EngineConfig, ExecutionEngine};
use crate::persistence::mission_repo::MissionRepo;
use crate::stream::{EventEmitter, StreamEvent, END_OF_STREAM};
use crate::{AppError, Result};

use super::validation::{self, StreamRequest};
use super::AppState;

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/missions/stream", post(stream_mission))
        .route("/missions/{id}", get(get_mission))
        .route("/missions/checkpoint", post(respond_checkpoint))
        .route(
            "/missions/checkpoints/{id}/respond",
            post(respond_checkpoint_by_path),
        )
        .route("/missions/checkpoints/{id}", get(get_checkpoint))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// `POST /missions/stream`: validate, persist, spawn the engine, and
/// hand back the live event stream.
async fn stream_mission(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<StreamRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let tenant_id = validation::require_tenant(
        headers
            .get("x-tenant-id")
            .and_then(|value| value.to_str().ok()),
    )?;
    let mode = validation::validate_stream_request(&req)?;
    let budget_limit = req
        .budget_limit
        .unwrap_or(state.config.cost.default_budget_limit);

    let repo = MissionRepo::new(state.db.clone());
    if let Some(id) = req.mission_id.as_deref() {
        // Client-supplied ids must not collide with an existing record.
        if repo.get_state(id).await?.is_some() {
            return Err(AppError::Validation(format!(
                "mission {id} already exists"
            )));
        }
    }

    let mission = Mission::new(
        req.mission_id,
        tenant_id,
        mode,
        req.goal.trim().to_owned(),
        req.template_id,
        req.expert_id,
        budget_limit,
    );
    let mission_id = mission.id.clone();

    repo.create(&mission).await?;

    let (emitter, rx) = EventEmitter::channel(256);
    let controller = CheckpointController::new(state.db.clone(), state.bus.clone());
    let engine = ExecutionEngine::new(
        mission,
        repo,
        controller,
        state.router.clone(),
        emitter,
        EngineConfig::from_global(&state.config),
    );

    // The engine owns the mission from here; a client disconnect only
    // drops the stream, never the run.
    tokio::spawn(engine.run());
    info!(%mission_id, "mission stream opened");

    Ok(Sse::new(event_stream(rx)).keep_alive(KeepAlive::default()))
}

/// Streaming phases: live events, then the `[DONE]` sentinel, then EOF.
enum StreamPhase {
    Open(mpsc::Receiver<StreamEvent>),
    Closed,
}

fn event_stream(
    rx: mpsc::Receiver<StreamEvent>,
) -> impl Stream<Item = std::result::Result<Event, Infallible>> {
    futures_util::stream::unfold(StreamPhase::Open(rx), |phase| async move {
        match phase {
            StreamPhase::Open(mut rx) => match rx.recv().await {
                Some(event) => Some((Ok(event.into_sse()), StreamPhase::Open(rx))),
                // Channel closed: the engine reached a terminal state.
                None => Some((Ok(Event::default().data(END_OF_STREAM)), StreamPhase::Closed)),
            },
            StreamPhase::Closed => None,
        }
    })
}

/// `GET /missions/{id}`: current persisted mission state.
async fn get_mission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Mission>> {
    let repo = MissionRepo::new(state.db.clone());
    let mission = repo
        .get_state(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("mission {id} not found")))?;
    Ok(Json(mission))
}

/// Body of the checkpoint response endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckpointResponseRequest {
    /// Mission the checkpoint belongs to.
    pub mission_id: String,
    /// Checkpoint identifier; taken from the path on the `/respond`
    /// route.
    #[serde(default)]
    pub checkpoint_id: Option<String>,
    /// Chosen action keyword.
    pub action: String,
    /// Optional free-form option value (e.g. a new budget limit).
    #[serde(default)]
    pub option: Option<String>,
    /// Optional operator-provided reason.
    #[serde(default)]
    pub reason: Option<String>,
    /// Optional structured edits recorded with the resolution.
    #[serde(default)]
    pub modifications: Option<serde_json::Value>,
    /// Advisory resume flag; the recorded decision drives resumption.
    #[serde(default = "default_resume")]
    pub resume: bool,
}

fn default_resume() -> bool {
    true
}

/// `POST /missions/checkpoint`: resolve by body-supplied checkpoint id.
async fn respond_checkpoint(
    State(state): State<AppState>,
    Json(req): Json<CheckpointResponseRequest>,
) -> Result<Json<Checkpoint>> {
    let checkpoint_id = req
        .checkpoint_id
        .clone()
        .ok_or_else(|| AppError::Validation("checkpoint_id is required".to_owned()))?;
    resolve_checkpoint(&state, &checkpoint_id, req).await
}

/// `POST /missions/checkpoints/{id}/respond`: resolve by path id.
async fn respond_checkpoint_by_path(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CheckpointResponseRequest>,
) -> Result<Json<Checkpoint>> {
    resolve_checkpoint(&state, &id, req).await
}

async fn resolve_checkpoint(
    state: &AppState,
    checkpoint_id: &str,
    req: CheckpointResponseRequest,
) -> Result<Json<Checkpoint>> {
    let controller = CheckpointController::new(state.db.clone(), state.bus.clone());
    let resolved = controller
        .respond(
            &req.mission_id,
            checkpoint_id,
            &req.action,
            req.option,
            req.reason,
            req.modifications,
        )
        .await?;
    Ok(Json(resolved))
}

/// `GET /missions/checkpoints/{id}`: checkpoint snapshot.
async fn get_checkpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Checkpoint>> {
    let controller = CheckpointController::new(state.db.clone(), state.bus.clone());
    let checkpoint = controller
        .repo()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("checkpoint {id} not found")))?;
    Ok(Json(checkpoint))
}
