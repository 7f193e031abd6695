//! Step-by-step mission execution engine.
//!
//! One engine task owns one [`Mission`] for its whole lifetime: it
//! generates the plan, drives steps through the delegate router, raises
//! quality and budget gates, holds the mandatory final review, and
//! persists every state transition before announcing it on the stream.
//!
//! Failure handling is centralized in [`ExecutionEngine::run`]: any step
//! or checkpoint error surfaces as exactly one terminal `error` event
//! with the reason persisted on the mission record.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{error, info, info_span, warn, Instrument as _};

use crate::config::GlobalConfig;
use crate::delegate::router::DelegateRouter;
use crate::delegate::StepContext;
use crate::models::artifact::Artifact;
use crate::models::checkpoint::CheckpointKind;
use crate::models::mission::{Mission, MissionMode, MissionStatus};
use crate::models::step::StepStatus;
use crate::persistence::mission_repo::{MissionPatch, MissionRepo};
use crate::stream::{EventEmitter, EventKind};
use crate::{AppError, Result};

use super::bus::Directive;
use super::checkpoint_controller::CheckpointController;
use super::cost_tracker::CostTracker;
use super::planner;

/// A quality gate is raised after every N completed steps.
const QUALITY_GATE_INTERVAL: u32 = 3;

/// Engine tuning derived from the global configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a quality or budget checkpoint may stay unanswered.
    pub checkpoint_timeout: Duration,
    /// How long the final review may stay unanswered.
    pub final_review_timeout: Duration,
    /// Cost per delegate token.
    pub per_token_rate: f64,
    /// Budget gate threshold fraction.
    pub budget_threshold: f64,
}

impl EngineConfig {
    /// Extract the engine parameters from the loaded configuration.
    #[must_use]
    pub fn from_global(config: &GlobalConfig) -> Self {
        Self {
            checkpoint_timeout: Duration::from_secs(config.timeouts.checkpoint_seconds),
            final_review_timeout: Duration::from_secs(config.timeouts.final_review_seconds),
            per_token_rate: config.cost.per_token_rate,
            budget_threshold: config.cost.budget_threshold,
        }
    }
}

/// How a mission run ended, short of an error.
pub(crate) enum Outcome {
    /// All steps and the final review completed.
    Completed,
    /// The operator chose abort at a checkpoint.
    Aborted,
}

/// Engine-side view of a resolved gate.
pub(crate) enum GateFlow {
    /// Resume with the next step.
    Proceed,
    /// Terminate at operator request.
    Abort,
}

/// Drives one mission from planning through synthesis.
pub struct ExecutionEngine {
    pub(crate) mission: Mission,
    pub(crate) repo: MissionRepo,
    pub(crate) checkpoints: CheckpointController,
    pub(crate) router: Arc<DelegateRouter>,
    pub(crate) emitter: EventEmitter,
    pub(crate) tracker: CostTracker,
    pub(crate) quality_counter: u32,
    pub(crate) config: EngineConfig,
}

impl ExecutionEngine {
    /// Build an engine for a mission, resuming cost state from the
    /// record.
    #[must_use]
    pub fn new(
        mission: Mission,
        repo: MissionRepo,
        checkpoints: CheckpointController,
        router: Arc<DelegateRouter>,
        emitter: EventEmitter,
        config: EngineConfig,
    ) -> Self {
        let tracker = CostTracker::resume(
            config.per_token_rate,
            config.budget_threshold,
            mission.current_cost,
            mission.budget_checkpoint_issued,
        );
        Self {
            mission,
            repo,
            checkpoints,
            router,
            emitter,
            tracker,
            quality_counter: 0,
            config,
        }
    }

    /// Mission state owned by this engine.
    #[must_use]
    pub fn mission(&self) -> &Mission {
        &self.mission
    }

    /// Run the mission to a terminal state.
    ///
    /// Never returns an error: failures become the mission's terminal
    /// `error` event and persisted failure reason.
    pub async fn run(mut self) {
        let span = info_span!(
            "mission",
            mission_id = %self.mission.id,
            tenant_id = %self.mission.tenant_id,
            mode = self.mission.mode.wire_value(),
        );

        async {
            match self.drive().await {
                Ok(Outcome::Completed) => {}
                Ok(Outcome::Aborted) => self.cancel("operator_abort").await,
                Err(err) => {
                    let reason = failure_reason(&err);
                    error!(%err, reason, "mission execution failed");
                    self.fail(&reason).await;
                }
            }
        }
        .instrument(span)
        .await;
    }

    async fn drive(&mut self) -> Result<Outcome> {
        self.transition(MissionStatus::Planning).await?;

        self.mission.plan = planner::build_plan(&self.mission.goal);
        self.repo
            .save_state(
                &self.mission.id,
                MissionPatch {
                    plan: Some(self.mission.plan.clone()),
                    ..Default::default()
                },
            )
            .await?;
        self.emitter
            .emit(EventKind::Plan, json!({ "steps": self.mission.plan }))
            .await;
        info!(steps = self.mission.plan.len(), "plan finalized");

        self.transition(MissionStatus::Running).await?;

        let outcome = match self.mission.mode {
            MissionMode::Sequential => self.run_sequential().await?,
            MissionMode::Graph => self.run_graph().await?,
        };
        if matches!(outcome, Outcome::Aborted) {
            return Ok(outcome);
        }

        if matches!(self.final_review().await?, GateFlow::Abort) {
            return Ok(Outcome::Aborted);
        }

        self.finish().await?;
        Ok(Outcome::Completed)
    }

    /// Sequential executor: steps run strictly in plan order.
    async fn run_sequential(&mut self) -> Result<Outcome> {
        let mut index = self.mission.current_step as usize;

        while index < self.mission.plan.len() {
            self.execute_step(index).await?;
            match self.run_gates(index).await? {
                GateFlow::Proceed => index += 1,
                GateFlow::Abort => return Ok(Outcome::Aborted),
            }
        }

        Ok(Outcome::Completed)
    }

    /// Execute one plan step end-to-end and record its artifact.
    pub(crate) async fn execute_step(&mut self, index: usize) -> Result<()> {
        let step = self.mission.plan[index].clone();
        let span = info_span!(
            "step",
            step_id = %step.id,
            tier = step.tier.wire_name(),
            worker = %step.worker,
        );

        async {
            self.emitter
                .emit(
                    EventKind::AgentSelected,
                    json!({
                        "step_id": step.id,
                        "worker": step.worker,
                        "tier": step.tier.wire_name(),
                    }),
                )
                .await;
            self.emitter
                .emit(
                    EventKind::Delegation,
                    json!({ "step_id": step.id, "tier": step.tier.wire_name() }),
                )
                .await;

            self.mission.plan[index].status = StepStatus::InProgress;
            self.repo
                .save_state(
                    &self.mission.id,
                    MissionPatch {
                        plan: Some(self.mission.plan.clone()),
                        ..Default::default()
                    },
                )
                .await?;
            self.emitter
                .emit(
                    EventKind::Progress,
                    json!({
                        "current": index + 1,
                        "total": self.mission.plan.len(),
                        "step_id": step.id,
                        "name": step.name,
                    }),
                )
                .await;

            let ctx = StepContext {
                goal: self.mission.goal.clone(),
                tenant_id: self.mission.tenant_id.clone(),
                template_id: self.mission.template_id.clone(),
                expert_id: self.mission.expert_id.clone(),
                prior_artifacts: self.mission.artifacts.clone(),
            };

            let routed = match self.router.execute(&step, &ctx, &self.emitter).await {
                Ok(routed) => routed,
                Err(err) => {
                    self.mission.plan[index].status = StepStatus::Failed;
                    if let Err(persist_err) = self
                        .repo
                        .save_state(
                            &self.mission.id,
                            MissionPatch {
                                plan: Some(self.mission.plan.clone()),
                                ..Default::default()
                            },
                        )
                        .await
                    {
                        error!(%persist_err, "failed to persist failed step status");
                    }
                    return Err(err);
                }
            };

            let step_cost = self.tracker.step_cost(&routed.result.meta);
            let total = self.tracker.record(step_cost);
            self.mission.current_cost = total;

            let artifact = Artifact {
                step_id: step.id.clone(),
                summary: routed.result.summary,
                citations: routed.result.citations,
                cost: step_cost,
                tools_used: routed.result.tools_used,
            };

            self.mission.plan[index].status = StepStatus::Completed;
            self.mission.current_step = u32::try_from(index + 1).unwrap_or(u32::MAX);
            self.mission.artifacts.push(artifact.clone());

            self.repo
                .save_state(
                    &self.mission.id,
                    MissionPatch {
                        plan: Some(self.mission.plan.clone()),
                        current_step: Some(self.mission.current_step),
                        current_cost: Some(total),
                        artifacts: Some(self.mission.artifacts.clone()),
                        ..Default::default()
                    },
                )
                .await?;

            // Streamed delegates already pushed their sources mid-step.
            if !routed.streamed && !artifact.citations.is_empty() {
                self.emitter
                    .emit(
                        EventKind::Sources,
                        json!({ "step_id": step.id, "citations": artifact.citations }),
                    )
                    .await;
            }
            if !artifact.tools_used.is_empty() {
                self.emitter
                    .emit(
                        EventKind::Tool,
                        json!({ "step_id": step.id, "tools": artifact.tools_used }),
                    )
                    .await;
            }
            self.emitter
                .emit(EventKind::Artifact, json!({ "artifact": artifact }))
                .await;
            self.emitter
                .emit(
                    EventKind::Cost,
                    json!({
                        "step_id": step.id,
                        "step_cost": step_cost,
                        "total": total,
                        "budget_limit": self.mission.budget_limit,
                    }),
                )
                .await;

            info!(cost = step_cost, total, "step completed");
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Run the post-step gates in order: quality, then budget.
    ///
    /// Both gates are independent; each may pause the mission after the
    /// same step.
    pub(crate) async fn run_gates(&mut self, index: usize) -> Result<GateFlow> {
        self.quality_counter += 1;
        if self.quality_counter >= QUALITY_GATE_INTERVAL {
            self.quality_counter = 0;
            let flow = self
                .hold_gate(CheckpointKind::Quality, self.config.checkpoint_timeout, index)
                .await?;
            if matches!(flow, GateFlow::Abort) {
                return Ok(flow);
            }
        }

        if self.tracker.should_raise_budget_gate(self.mission.budget_limit) {
            // Persist the latch before pausing so a restart cannot
            // re-raise the budget gate.
            self.mission.budget_checkpoint_issued = true;
            self.repo
                .save_state(
                    &self.mission.id,
                    MissionPatch {
                        budget_checkpoint_issued: Some(true),
                        ..Default::default()
                    },
                )
                .await?;
            let flow = self
                .hold_gate(CheckpointKind::Budget, self.config.checkpoint_timeout, index)
                .await?;
            if matches!(flow, GateFlow::Abort) {
                return Ok(flow);
            }
        }

        Ok(GateFlow::Proceed)
    }

    /// Mandatory review between the last step and synthesis.
    async fn final_review(&mut self) -> Result<GateFlow> {
        let last = self.mission.plan.len().saturating_sub(1);
        self.hold_gate(
            CheckpointKind::FinalReview,
            self.config.final_review_timeout,
            last,
        )
        .await
    }

    /// Raise a checkpoint and loop until the operator lets execution
    /// proceed. A `revise` decision re-runs the step at `step_index` and
    /// raises the same checkpoint kind again.
    async fn hold_gate(
        &mut self,
        kind: CheckpointKind,
        timeout: Duration,
        step_index: usize,
    ) -> Result<GateFlow> {
        loop {
            match self.checkpoint_round(kind, timeout).await? {
                Directive::Continue => return Ok(GateFlow::Proceed),
                Directive::ExtendBudget(limit) => {
                    self.mission.budget_limit = limit;
                    self.repo
                        .save_state(
                            &self.mission.id,
                            MissionPatch {
                                budget_limit: Some(limit),
                                ..Default::default()
                            },
                        )
                        .await?;
                    self.emitter
                        .emit(
                            EventKind::Cost,
                            json!({
                                "total": self.tracker.total(),
                                "budget_limit": limit,
                                "extended": true,
                            }),
                        )
                        .await;
                    info!(budget_limit = limit, "budget extended");
                    return Ok(GateFlow::Proceed);
                }
                Directive::Abort => return Ok(GateFlow::Abort),
                Directive::Revise => {
                    info!(step_index, "revising step at operator request");
                    self.rerun_step(step_index).await?;
                }
            }
        }
    }

    /// One pause/resume cycle: open the checkpoint, wait, restore the
    /// running status.
    async fn checkpoint_round(
        &mut self,
        kind: CheckpointKind,
        timeout: Duration,
    ) -> Result<Directive> {
        self.transition(MissionStatus::AwaitingCheckpoint).await?;

        let (checkpoint, rx) = self
            .checkpoints
            .open(&self.mission, kind, timeout, &self.emitter)
            .await?;

        self.mission.checkpoint_id = Some(checkpoint.id.clone());
        self.repo
            .save_state(
                &self.mission.id,
                MissionPatch {
                    checkpoint_id: Some(Some(checkpoint.id.clone())),
                    ..Default::default()
                },
            )
            .await?;

        let directive = self
            .checkpoints
            .await_resolution(&checkpoint, rx, timeout)
            .await?;

        self.mission.checkpoint_id = None;
        self.repo
            .save_state(
                &self.mission.id,
                MissionPatch {
                    checkpoint_id: Some(None),
                    ..Default::default()
                },
            )
            .await?;
        self.transition(MissionStatus::Running).await?;

        Ok(directive)
    }

    /// Re-execute an already completed step. The previous artifact stays
    /// in the append-only list; spend keeps accumulating.
    pub(crate) async fn rerun_step(&mut self, index: usize) -> Result<()> {
        self.mission.plan[index].status = StepStatus::Pending;
        self.execute_step(index).await
    }

    /// Persist and announce a lifecycle transition.
    async fn transition(&mut self, next: MissionStatus) -> Result<()> {
        if !self.mission.can_transition_to(next) {
            warn!(from = ?self.mission.status, to = ?next, "unexpected status transition");
        }
        self.mission.status = next;
        self.repo
            .save_state(
                &self.mission.id,
                MissionPatch {
                    status: Some(next),
                    ..Default::default()
                },
            )
            .await?;
        self.emitter
            .emit(EventKind::Status, json!({ "status": next }))
            .await;
        Ok(())
    }

    /// Terminal success: synthesize and emit `done`.
    async fn finish(&mut self) -> Result<()> {
        let content = self.mission.synthesize();
        let now = Utc::now();
        self.mission.status = MissionStatus::Completed;
        self.mission.completed_at = Some(now);

        self.repo
            .save_state(
                &self.mission.id,
                MissionPatch {
                    status: Some(MissionStatus::Completed),
                    completed_at: Some(now),
                    ..Default::default()
                },
            )
            .await?;

        self.emitter
            .emit(EventKind::Status, json!({ "status": MissionStatus::Completed }))
            .await;

        let steps_completed = self
            .mission
            .plan
            .iter()
            .filter(|step| step.status == StepStatus::Completed)
            .count();
        let duration_ms = (now - self.mission.started_at).num_milliseconds();
        self.emitter
            .emit(
                EventKind::Done,
                json!({
                    "content": content,
                    "metrics": {
                        "steps_completed": steps_completed,
                        "artifacts": self.mission.artifacts.len(),
                        "total_cost": self.mission.current_cost,
                        "duration_ms": duration_ms,
                    },
                }),
            )
            .await;

        info!(total_cost = self.mission.current_cost, "mission completed");
        Ok(())
    }

    /// Terminal failure: persist the reason and emit `error`.
    async fn fail(&mut self, reason: &str) {
        self.terminate(MissionStatus::Failed, reason).await;
    }

    /// Terminal operator abort.
    async fn cancel(&mut self, reason: &str) {
        self.terminate(MissionStatus::Cancelled, reason).await;
    }

    async fn terminate(&mut self, status: MissionStatus, reason: &str) {
        let now = Utc::now();
        self.mission.status = status;
        self.mission.failure_reason = Some(reason.to_owned());
        self.mission.completed_at = Some(now);

        if let Err(err) = self
            .repo
            .save_state(
                &self.mission.id,
                MissionPatch {
                    status: Some(status),
                    failure_reason: Some(reason.to_owned()),
                    checkpoint_id: Some(None),
                    completed_at: Some(now),
                    ..Default::default()
                },
            )
            .await
        {
            error!(%err, "failed to persist terminal mission state");
        }

        self.emitter
            .emit(EventKind::Status, json!({ "status": status }))
            .await;
        self.emitter
            .emit(EventKind::Error, json!({ "reason": reason }))
            .await;
        warn!(reason, ?status, "mission terminated");
    }
}

/// Map an engine error onto the persisted failure reason.
fn failure_reason(err: &AppError) -> String {
    match err {
        AppError::CheckpointTimeout(kind) => format!("{kind}_checkpoint_timeout"),
        other => other.to_string(),
    }
}
