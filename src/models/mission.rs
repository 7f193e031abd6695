//! Mission model and lifecycle helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::artifact::Artifact;
use super::step::Step;

/// Lifecycle status for a mission.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    /// Mission created but planning has not started.
    Pending,
    /// Plan generation in progress.
    Planning,
    /// Steps executing.
    Running,
    /// Blocked on a human checkpoint decision.
    AwaitingCheckpoint,
    /// All steps completed and the final review passed.
    Completed,
    /// Terminal failure; `failure_reason` is set.
    Failed,
    /// Terminated by operator decision before completion.
    Cancelled,
}

impl MissionStatus {
    /// Whether the status is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Execution strategy selected by the request `mode` field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MissionMode {
    /// Sequential step loop (wire mode 3).
    Sequential,
    /// Dependency-graph executor (wire mode 4).
    Graph,
}

impl MissionMode {
    /// Parse the numeric wire value.
    #[must_use]
    pub fn from_wire(mode: u8) -> Option<Self> {
        match mode {
            3 => Some(Self::Sequential),
            4 => Some(Self::Graph),
            _ => None,
        }
    }

    /// Numeric wire value.
    #[must_use]
    pub fn wire_value(self) -> u8 {
        match self {
            Self::Sequential => 3,
            Self::Graph => 4,
        }
    }
}

/// One end-to-end run of a goal through the orchestrator.
///
/// Owned exclusively by one engine task for its lifetime; mutated only by
/// the engine and the checkpoint controller, and persisted after every
/// state transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Mission {
    /// Unique record identifier.
    pub id: String,
    /// Tenant the mission belongs to.
    pub tenant_id: String,
    /// Execution strategy.
    pub mode: MissionMode,
    /// High-level goal text.
    pub goal: String,
    /// Optional content template identifier forwarded to delegates.
    pub template_id: Option<String>,
    /// Optional expert persona identifier forwarded to delegates.
    pub expert_id: Option<String>,
    /// Lifecycle status.
    pub status: MissionStatus,
    /// Ordered execution plan. Immutable once finalized.
    pub plan: Vec<Step>,
    /// Index of the next unexecuted step.
    pub current_step: u32,
    /// Soft monetary ceiling.
    pub budget_limit: f64,
    /// Accumulated spend; monotonically non-decreasing.
    pub current_cost: f64,
    /// Latch ensuring the budget checkpoint fires at most once.
    pub budget_checkpoint_issued: bool,
    /// Outstanding checkpoint, if any. At most one per mission.
    pub checkpoint_id: Option<String>,
    /// Append-only list of step outputs.
    pub artifacts: Vec<Artifact>,
    /// Reason recorded for terminal failures.
    pub failure_reason: Option<String>,
    /// Creation timestamp.
    pub started_at: DateTime<Utc>,
    /// Terminal timestamp.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Mission {
    /// Construct a new pending mission with a generated identifier.
    #[must_use]
    pub fn new(
        id: Option<String>,
        tenant_id: String,
        mode: MissionMode,
        goal: String,
        template_id: Option<String>,
        expert_id: Option<String>,
        budget_limit: f64,
    ) -> Self {
        Self {
            id: id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            tenant_id,
            mode,
            goal,
            template_id,
            expert_id,
            status: MissionStatus::Pending,
            plan: Vec::new(),
            current_step: 0,
            budget_limit,
            current_cost: 0.0,
            budget_checkpoint_issued: false,
            checkpoint_id: None,
            artifacts: Vec::new(),
            failure_reason: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Determine whether a lifecycle transition is permitted.
    #[must_use]
    pub fn can_transition_to(&self, next: MissionStatus) -> bool {
        matches!(
            (self.status, next),
            (MissionStatus::Pending, MissionStatus::Planning)
                | (MissionStatus::Planning, MissionStatus::Running)
                | (
                    MissionStatus::Running,
                    MissionStatus::AwaitingCheckpoint
                        | MissionStatus::Completed
                        | MissionStatus::Failed
                        | MissionStatus::Cancelled
                )
                | (
                    MissionStatus::AwaitingCheckpoint,
                    MissionStatus::Running | MissionStatus::Failed | MissionStatus::Cancelled
                )
                | (
                    MissionStatus::Planning,
                    MissionStatus::Failed | MissionStatus::Cancelled
                )
        )
    }

    /// Concatenate artifact summaries into the synthesized `done` content.
    #[must_use]
    pub fn synthesize(&self) -> String {
        self.artifacts
            .iter()
            .map(|artifact| artifact.summary.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
