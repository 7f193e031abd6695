//! Checkpoint raise/await/respond machinery.
//!
//! The engine side persists a checkpoint, announces it on the stream,
//! registers a one-shot waiter, and blocks under a bounded timeout. The
//! HTTP side records the operator decision write-once and publishes
//! exactly one directive through the resume bus.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::sync::oneshot;
use tracing::{info, info_span, warn, Instrument as _};

use crate::models::checkpoint::{Checkpoint, CheckpointKind, Resolution};
use crate::models::mission::Mission;
use crate::persistence::checkpoint_repo::CheckpointRepo;
use crate::persistence::db::Database;
use crate::stream::{EventEmitter, EventKind};
use crate::{AppError, Result};

use super::bus::{Directive, ResumeBus};

/// Known decision actions, in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActionKind {
    Approve,
    IncreaseBudget,
    Abort,
    Revise,
}

/// Decision → directive mapping. Unknown actions fall through to
/// `Continue` with a logged warning.
const ACTION_TABLE: &[(&str, ActionKind)] = &[
    ("approve", ActionKind::Approve),
    ("increase_budget", ActionKind::IncreaseBudget),
    ("abort", ActionKind::Abort),
    ("revise", ActionKind::Revise),
];

/// Map a wire action onto an engine directive.
#[must_use]
pub fn directive_for(action: &str, option: Option<&str>, current_limit: f64) -> Directive {
    let kind = ACTION_TABLE
        .iter()
        .find(|(name, _)| *name == action)
        .map(|(_, kind)| *kind);

    match kind {
        Some(ActionKind::Approve) => Directive::Continue,
        Some(ActionKind::IncreaseBudget) => {
            let new_limit = option
                .and_then(|raw| raw.parse::<f64>().ok())
                .filter(|limit| *limit > current_limit)
                .unwrap_or(current_limit * 1.5);
            Directive::ExtendBudget(new_limit)
        }
        Some(ActionKind::Abort) => Directive::Abort,
        Some(ActionKind::Revise) => Directive::Revise,
        None => {
            warn!(action, "unknown checkpoint action; defaulting to continue");
            Directive::Continue
        }
    }
}

/// Creates pause points, waits for human resolution, and resumes.
#[derive(Clone)]
pub struct CheckpointController {
    repo: CheckpointRepo,
    bus: ResumeBus,
}

impl CheckpointController {
    /// Build a controller over the shared database and resume bus.
    #[must_use]
    pub fn new(db: Arc<Database>, bus: ResumeBus) -> Self {
        Self {
            repo: CheckpointRepo::new(db),
            bus,
        }
    }

    /// Access the underlying checkpoint repository.
    #[must_use]
    pub fn repo(&self) -> &CheckpointRepo {
        &self.repo
    }

    /// Open a checkpoint for a mission: persist it, register the resume
    /// waiter, and announce it on the stream.
    ///
    /// The waiter is registered before the checkpoint becomes visible so
    /// an immediate respond cannot race past it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` on persistence failure.
    pub async fn open(
        &self,
        mission: &Mission,
        kind: CheckpointKind,
        timeout: Duration,
        emitter: &EventEmitter,
    ) -> Result<(Checkpoint, oneshot::Receiver<Directive>)> {
        let context = json!({
            "current_cost": mission.current_cost,
            "budget_limit": mission.budget_limit,
            "current_step": mission.current_step,
            "goal": mission.goal,
        });
        let checkpoint = Checkpoint::new(mission.id.clone(), kind, timeout.as_secs(), context);

        let rx = self.bus.subscribe(&mission.id, &checkpoint.id).await;
        self.repo.create(&checkpoint).await?;

        emitter
            .emit(
                EventKind::Checkpoint,
                json!({
                    "id": checkpoint.id,
                    "type": kind.wire_name(),
                    "title": checkpoint.title,
                    "options": checkpoint.options,
                    "timeout": checkpoint.timeout_seconds,
                    "context": checkpoint.context,
                }),
            )
            .await;

        info!(
            mission_id = %mission.id,
            checkpoint_id = %checkpoint.id,
            kind = kind.wire_name(),
            "checkpoint raised; awaiting resolution"
        );

        Ok((checkpoint, rx))
    }

    /// Block on an open checkpoint until it resolves or times out.
    ///
    /// # Errors
    ///
    /// Returns `AppError::CheckpointTimeout` if no decision arrives
    /// within `timeout`.
    pub async fn await_resolution(
        &self,
        checkpoint: &Checkpoint,
        rx: oneshot::Receiver<Directive>,
        timeout: Duration,
    ) -> Result<Directive> {
        let span = info_span!(
            "checkpoint_wait",
            mission_id = %checkpoint.mission_id,
            checkpoint_id = %checkpoint.id,
            kind = checkpoint.kind.wire_name(),
        );

        async {
            match tokio::time::timeout(timeout, rx).await {
                Ok(Ok(directive)) => {
                    info!(?directive, "checkpoint resolved");
                    Ok(directive)
                }
                Ok(Err(_)) => {
                    // Sender dropped without publishing (e.g. replaced
                    // waiter or shutdown); indistinguishable from an
                    // unanswered checkpoint for the mission.
                    self.bus.discard(&checkpoint.mission_id, &checkpoint.id).await;
                    Err(AppError::CheckpointTimeout(
                        checkpoint.kind.wire_name().to_owned(),
                    ))
                }
                Err(_elapsed) => {
                    self.bus.discard(&checkpoint.mission_id, &checkpoint.id).await;
                    warn!("checkpoint timed out without a decision");
                    Err(AppError::CheckpointTimeout(
                        checkpoint.kind.wire_name().to_owned(),
                    ))
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Record a human decision and wake the paused mission.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown checkpoint,
    /// `AppError::Validation` when `mission_id` does not match, or
    /// `AppError::CheckpointConflict` when the checkpoint is already
    /// resolved.
    pub async fn respond(
        &self,
        mission_id: &str,
        checkpoint_id: &str,
        action: &str,
        option: Option<String>,
        reason: Option<String>,
        modifications: Option<serde_json::Value>,
    ) -> Result<Checkpoint> {
        let checkpoint = self
            .repo
            .get_by_id(checkpoint_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("checkpoint {checkpoint_id} not found")))?;

        if checkpoint.mission_id != mission_id {
            return Err(AppError::Validation(format!(
                "checkpoint {checkpoint_id} does not belong to mission {mission_id}"
            )));
        }

        let resolution = Resolution {
            action: action.to_owned(),
            option: option.clone(),
            reason,
            modifications,
            resolved_at: Utc::now(),
        };

        // Write-once: a second resolution is rejected here before any
        // bus activity, leaving the mission state untouched.
        let resolved = self.repo.resolve(checkpoint_id, &resolution).await?;

        let current_limit = checkpoint
            .context
            .get("budget_limit")
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(0.0);
        let directive = directive_for(action, option.as_deref(), current_limit);

        if let Err(err) = self
            .bus
            .publish(mission_id, checkpoint_id, directive)
            .await
        {
            // The engine already gave up on this checkpoint (timeout);
            // the recorded resolution stands.
            warn!(%err, checkpoint_id, "resolution recorded but no engine waiter");
        }

        Ok(resolved)
    }
}
