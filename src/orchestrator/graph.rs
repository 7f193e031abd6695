//! Dependency-graph executor.
//!
//! Steps run as soon as their declared dependencies are completed.
//! Internal node signals pass through the stream adapter's normalization
//! table, so clients observe the same closed event grammar as the
//! sequential executor.

use std::collections::HashSet;

use crate::models::step::{Step, StepStatus};
use crate::stream::adapter::{normalize, GraphSignal};
use crate::{AppError, Result};

use super::engine::{ExecutionEngine, GateFlow, Outcome};

/// First pending step whose dependencies are all completed.
///
/// Plan order breaks ties, keeping scheduling deterministic.
pub(crate) fn next_ready(plan: &[Step], completed: &HashSet<String>) -> Option<usize> {
    plan.iter().position(|step| {
        step.status == StepStatus::Pending
            && step.dependencies.iter().all(|dep| completed.contains(dep))
    })
}

impl ExecutionEngine {
    /// Graph executor: run ready steps until the plan is exhausted.
    pub(crate) async fn run_graph(&mut self) -> Result<Outcome> {
        let total = self.mission.plan.len();
        let mut completed: HashSet<String> = self
            .mission
            .plan
            .iter()
            .filter(|step| step.status == StepStatus::Completed)
            .map(|step| step.id.clone())
            .collect();

        while completed.len() < total {
            let Some(index) = next_ready(&self.mission.plan, &completed) else {
                // Pending steps remain but none is ready.
                return Err(AppError::Planning(
                    "plan contains a dependency cycle or unsatisfiable dependency".to_owned(),
                ));
            };
            let step_id = self.mission.plan[index].id.clone();

            self.emit_signal(GraphSignal::Delta {
                step_id: step_id.clone(),
                status: "in_progress".to_owned(),
            })
            .await;

            self.execute_step(index).await?;
            completed.insert(step_id.clone());

            self.emit_signal(GraphSignal::Delta {
                step_id: step_id.clone(),
                status: "completed".to_owned(),
            })
            .await;
            self.emit_signal(GraphSignal::FullState {
                completed: completed.len(),
                total,
                cost: self.tracker.total(),
            })
            .await;
            self.emit_signal(GraphSignal::Debug {
                message: format!("node {step_id} settled"),
            })
            .await;

            match self.run_gates(index).await? {
                GateFlow::Proceed => {}
                GateFlow::Abort => return Ok(Outcome::Aborted),
            }
        }

        Ok(Outcome::Completed)
    }

    /// Push an internal signal through the normalization table; signals
    /// without an outward counterpart are dropped there.
    async fn emit_signal(&self, signal: GraphSignal) {
        if let Some(event) = normalize(signal) {
            self.emitter.send(event).await;
        }
    }
}
