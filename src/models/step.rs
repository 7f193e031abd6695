//! Plan step model and delegate tier classification.

use serde::{Deserialize, Serialize};

/// Capability tier of the worker a step is dispatched to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DelegateTier {
    /// Generalist worker; may stream incremental events.
    L2,
    /// Specialist worker returning a single result.
    L3,
    /// Expert worker returning a single result.
    L4,
}

impl DelegateTier {
    /// Wire name used in events and logs.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::L2 => "L2",
            Self::L3 => "L3",
            Self::L4 => "L4",
        }
    }
}

/// Lifecycle status of a single plan step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not yet executed.
    Pending,
    /// Currently executing against a delegate.
    InProgress,
    /// Executed successfully; an artifact exists.
    Completed,
    /// Delegate execution failed.
    Failed,
    /// Handed to a higher tier by the delegate layer.
    Escalated,
}

/// Pipeline stage a step belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Mission framing and context gathering.
    Strategy,
    /// Evidence retrieval.
    Evidence,
    /// Domain-specific analysis.
    Analysis,
    /// Result synthesis.
    Synthesis,
    /// Mandatory quality assurance.
    Qa,
}

/// One unit of plan work. Immutable once the plan is finalized, except
/// for `status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Step {
    /// Sequential identifier of the form `step_<n>`, gap-free within a plan.
    pub id: String,
    /// Short step name.
    pub name: String,
    /// What the delegate is asked to do.
    pub description: String,
    /// Capability tier the step is routed to.
    pub tier: DelegateTier,
    /// Named worker persona executing the step.
    pub worker: String,
    /// Pipeline stage.
    pub stage: Stage,
    /// Step ids that must be `Completed` before this step may run.
    pub dependencies: Vec<String>,
    /// Lifecycle status.
    pub status: StepStatus,
}

impl Step {
    /// Numeric position parsed from the `step_<n>` identifier.
    #[must_use]
    pub fn position(&self) -> Option<u32> {
        self.id.strip_prefix("step_").and_then(|n| n.parse().ok())
    }
}
