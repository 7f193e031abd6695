//! Normalization of graph-executor signals into the outward grammar.
//!
//! The dependency-graph executor reports heterogeneous internal signals.
//! Clients must not be able to tell which executor ran a mission, so
//! every signal passes through the explicit mapping table in
//! [`normalize`] before reaching the wire; anything without an outward
//! counterpart is dropped.

use serde_json::json;
use tracing::debug;

use super::{EventKind, StreamEvent};

/// Internal signal kinds emitted by the dependency-graph executor.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphSignal {
    /// Full mission snapshot after a node completes.
    FullState {
        /// Completed step count.
        completed: usize,
        /// Total step count.
        total: usize,
        /// Running cost.
        cost: f64,
    },
    /// Incremental change to a single node.
    Delta {
        /// Affected step id.
        step_id: String,
        /// New step status wire name.
        status: String,
    },
    /// One streamed message token.
    MessageToken {
        /// Monotonic token index.
        index: u64,
        /// Token text.
        token: String,
    },
    /// Named custom signal with an opaque payload.
    Custom {
        /// Signal name; must match an outward kind to survive.
        name: String,
        /// Signal payload.
        payload: serde_json::Value,
    },
    /// Executor-internal diagnostics; never forwarded.
    Debug {
        /// Diagnostic text.
        message: String,
    },
}

/// Map an internal graph signal to its outward event, if it has one.
#[must_use]
pub fn normalize(signal: GraphSignal) -> Option<StreamEvent> {
    match signal {
        GraphSignal::FullState {
            completed,
            total,
            cost,
        } => Some(StreamEvent::new(
            EventKind::Progress,
            json!({ "completed": completed, "total": total, "cost": cost }),
        )),
        GraphSignal::Delta { step_id, status } => Some(StreamEvent::new(
            EventKind::Status,
            json!({ "step_id": step_id, "step_status": status }),
        )),
        GraphSignal::MessageToken { index, token } => Some(StreamEvent::new(
            EventKind::Token,
            json!({ "index": index, "token": token }),
        )),
        GraphSignal::Custom { name, payload } => {
            let kind = match name.as_str() {
                "sources" => EventKind::Sources,
                "artifact" => EventKind::Artifact,
                "cost" => EventKind::Cost,
                "checkpoint" => EventKind::Checkpoint,
                "reasoning" => EventKind::Reasoning,
                _ => {
                    debug!(name, "dropping custom graph signal with no outward kind");
                    return None;
                }
            };
            Some(StreamEvent::new(kind, payload))
        }
        GraphSignal::Debug { message } => {
            debug!(message, "graph executor diagnostic");
            None
        }
    }
}
