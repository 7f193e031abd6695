//! Checkpoint model for human-in-the-loop pause points.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a checkpoint was raised.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointKind {
    /// Spend crossed the budget threshold.
    Budget,
    /// Periodic quality review.
    Quality,
    /// Mandatory review before synthesis.
    FinalReview,
}

impl CheckpointKind {
    /// Wire name used in events and failure reasons.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Budget => "budget",
            Self::Quality => "quality",
            Self::FinalReview => "final_review",
        }
    }
}

/// Lifecycle status of a checkpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    /// Awaiting an operator decision.
    Pending,
    /// Decision recorded; write-once.
    Resolved,
}

/// One selectable decision presented to the operator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CheckpointOption {
    /// Action keyword submitted back by the client.
    pub action: String,
    /// Human-readable label.
    pub label: String,
}

impl CheckpointOption {
    fn new(action: &str, label: &str) -> Self {
        Self {
            action: action.to_owned(),
            label: label.to_owned(),
        }
    }
}

/// The recorded operator decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Resolution {
    /// Action keyword chosen by the operator.
    pub action: String,
    /// Optional free-form option value (e.g. a new budget limit).
    pub option: Option<String>,
    /// Optional operator-provided reason.
    pub reason: Option<String>,
    /// Optional structured edits attached to the decision. Recorded for
    /// the audit trail; the engine does not act on them.
    #[serde(default)]
    pub modifications: Option<serde_json::Value>,
    /// When the decision was recorded.
    pub resolved_at: DateTime<Utc>,
}

/// A pause point requiring a human decision before execution continues.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Checkpoint {
    /// Unique record identifier.
    pub id: String,
    /// Owning mission identifier.
    pub mission_id: String,
    /// Why the checkpoint was raised.
    pub kind: CheckpointKind,
    /// Human-readable title.
    pub title: String,
    /// Decisions offered to the operator.
    pub options: Vec<CheckpointOption>,
    /// Seconds the engine will wait before failing the mission.
    pub timeout_seconds: u64,
    /// Lifecycle status.
    pub status: CheckpointStatus,
    /// Recorded decision, once resolved.
    pub resolution: Option<Resolution>,
    /// Snapshot of mission figures at raise time (cost, limit, step).
    pub context: serde_json::Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Construct a new pending checkpoint with the standard option set
    /// for its kind.
    #[must_use]
    pub fn new(
        mission_id: String,
        kind: CheckpointKind,
        timeout_seconds: u64,
        context: serde_json::Value,
    ) -> Self {
        let (title, options) = match kind {
            CheckpointKind::Budget => (
                "Budget threshold reached",
                vec![
                    CheckpointOption::new("approve", "Continue within current budget"),
                    CheckpointOption::new("increase_budget", "Raise the budget limit"),
                    CheckpointOption::new("abort", "Stop the mission"),
                ],
            ),
            CheckpointKind::Quality => (
                "Quality review",
                vec![
                    CheckpointOption::new("approve", "Output looks good, continue"),
                    CheckpointOption::new("revise", "Re-run the last step"),
                    CheckpointOption::new("abort", "Stop the mission"),
                ],
            ),
            CheckpointKind::FinalReview => (
                "Final review",
                vec![
                    CheckpointOption::new("approve", "Accept and synthesize"),
                    CheckpointOption::new("revise", "Re-run the last step"),
                    CheckpointOption::new("abort", "Discard the mission"),
                ],
            ),
        };

        Self {
            id: Uuid::new_v4().to_string(),
            mission_id,
            kind,
            title: title.to_owned(),
            options,
            timeout_seconds,
            status: CheckpointStatus::Pending,
            resolution: None,
            context,
            created_at: Utc::now(),
        }
    }
}
