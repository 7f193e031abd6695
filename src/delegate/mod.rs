//! Tiered delegate worker abstraction.
//!
//! The [`Delegate`] trait decouples the execution engine from how a step
//! is actually performed. L3/L4 adapters return a single
//! [`DelegateResult`]; L2 adapters may instead return an ordered event
//! stream that must terminate with exactly one `Complete` or `Error`.

pub mod evidence;
pub mod http;
pub mod router;
pub mod scripted;

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::models::artifact::{Artifact, Citation};
use crate::models::step::Step;
use crate::Result;

/// Complexity class reported by a delegate; determines the base step cost.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityClass {
    /// Cheap context or synthesis work.
    Light,
    /// Typical retrieval or analysis work.
    Medium,
    /// Expensive multi-source or expert work.
    Heavy,
}

impl ComplexityClass {
    /// Base cost in budget units.
    #[must_use]
    pub fn base_cost(self) -> f64 {
        match self {
            Self::Light => 0.5,
            Self::Medium => 1.0,
            Self::Heavy => 2.0,
        }
    }
}

/// Execution metadata reported alongside a delegate result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RunnerMeta {
    /// Complexity class for cost accounting.
    pub complexity: ComplexityClass,
    /// Tokens consumed by the delegate.
    pub token_count: u64,
    /// Identifier of the runner that executed the step.
    pub runner: String,
}

/// Terminal output of one delegate execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct DelegateResult {
    /// Summary text; becomes the artifact summary.
    pub summary: String,
    /// Citations gathered during the step.
    pub citations: Vec<Citation>,
    /// Tools the delegate invoked.
    pub tools_used: Vec<String>,
    /// Execution metadata for cost accounting.
    pub meta: RunnerMeta,
}

/// Events emitted by streaming (L2) delegates, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum DelegateEvent {
    /// A tool invocation started.
    ToolStart {
        /// Tool name.
        name: String,
    },
    /// A tool invocation finished.
    ToolEnd {
        /// Tool name.
        name: String,
    },
    /// Citations discovered mid-step.
    Sources(Vec<Citation>),
    /// A reasoning segment began.
    ThinkingStart,
    /// One reasoning token; indices are monotonic from 0.
    Thinking {
        /// Monotonic token index.
        index: u64,
        /// Token text.
        token: String,
    },
    /// The reasoning segment ended.
    ThinkingEnd,
    /// Terminal success. Exactly one terminal event per stream.
    Complete(DelegateResult),
    /// Terminal failure. Exactly one terminal event per stream.
    Error(String),
}

/// What a delegate execution hands back to the router.
pub enum DelegateOutcome {
    /// Single result (L3/L4 contract).
    Single(DelegateResult),
    /// Ordered event stream (L2 contract).
    Stream(mpsc::Receiver<DelegateEvent>),
}

/// Per-step context handed to the delegate.
#[derive(Debug, Clone)]
pub struct StepContext {
    /// Mission goal.
    pub goal: String,
    /// Tenant the mission belongs to.
    pub tenant_id: String,
    /// Optional content template identifier.
    pub template_id: Option<String>,
    /// Optional expert persona identifier.
    pub expert_id: Option<String>,
    /// Artifacts from previously completed steps.
    pub prior_artifacts: Vec<Artifact>,
}

/// Interface between the execution engine and a tiered worker.
///
/// Retry policy, when an implementation wants one, lives entirely behind
/// this trait; the engine treats the first failure as fatal.
pub trait Delegate: Send + Sync {
    /// Execute one step.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Delegate`](crate::AppError::Delegate) when the
    /// step cannot be executed.
    fn execute<'a>(
        &'a self,
        step: &'a Step,
        ctx: &'a StepContext,
    ) -> Pin<Box<dyn Future<Output = Result<DelegateOutcome>> + Send + 'a>>;
}
