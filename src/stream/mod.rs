//! Outward wire protocol: a closed, versioned enumeration of event kinds
//! and the `{type, payload, timestamp}` envelope pushed over SSE.
//!
//! Every state change a client can observe flows through [`StreamEvent`],
//! regardless of which executor produced it.

pub mod adapter;

use axum::response::sse::Event;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Sentinel record closing every mission stream after the terminal event.
pub const END_OF_STREAM: &str = "[DONE]";

/// Closed enumeration of outward event kinds.
///
/// Adding a variant is a protocol version change; clients match on the
/// SSE `event:` field which carries [`EventKind::wire_name`].
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Mission status transition.
    Status,
    /// Finalized plan.
    Plan,
    /// Delegate began a reasoning segment.
    ThinkingStart,
    /// Reasoning segment summary.
    Thinking,
    /// Delegate finished a reasoning segment.
    ThinkingEnd,
    /// Step progress counter.
    Progress,
    /// Aggregate tool activity.
    Tool,
    /// Delegate started a tool invocation.
    ToolStart,
    /// Delegate finished a tool invocation.
    ToolEnd,
    /// Citations gathered for the current step.
    Sources,
    /// A step produced an artifact.
    Artifact,
    /// Updated running cost.
    Cost,
    /// Single streamed token with a monotonic index.
    Token,
    /// Delegate reasoning text outside a thinking segment.
    Reasoning,
    /// Worker persona selected for a step.
    AgentSelected,
    /// Step handed to a delegate tier.
    Delegation,
    /// A checkpoint was raised; execution is paused.
    Checkpoint,
    /// Terminal success, carrying the synthesized content and metrics.
    Done,
    /// Terminal failure.
    Error,
}

impl EventKind {
    /// Wire name carried in the SSE `event:` field.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Plan => "plan",
            Self::ThinkingStart => "thinking_start",
            Self::Thinking => "thinking",
            Self::ThinkingEnd => "thinking_end",
            Self::Progress => "progress",
            Self::Tool => "tool",
            Self::ToolStart => "tool_start",
            Self::ToolEnd => "tool_end",
            Self::Sources => "sources",
            Self::Artifact => "artifact",
            Self::Cost => "cost",
            Self::Token => "token",
            Self::Reasoning => "reasoning",
            Self::AgentSelected => "agent_selected",
            Self::Delegation => "delegation",
            Self::Checkpoint => "checkpoint",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

/// The wire representation of one state change.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StreamEvent {
    /// Event kind.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Kind-specific JSON payload.
    pub payload: serde_json::Value,
    /// Emission timestamp.
    pub timestamp: DateTime<Utc>,
}

impl StreamEvent {
    /// Construct an event stamped with the current time.
    #[must_use]
    pub fn new(kind: EventKind, payload: serde_json::Value) -> Self {
        Self {
            kind,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Encode as an SSE frame: `event:` carries the kind, `data:` the
    /// JSON envelope.
    #[must_use]
    pub fn into_sse(self) -> Event {
        let name = self.kind.wire_name();
        match Event::default().event(name).json_data(&self) {
            Ok(event) => event,
            Err(err) => {
                warn!(%err, kind = name, "failed to serialize stream event");
                Event::default().event(name).data("{}")
            }
        }
    }
}

/// Ordered event channel owned by one mission's engine task.
///
/// Send failures mean the client disconnected; the mission keeps running
/// and the event is dropped.
#[derive(Clone)]
pub struct EventEmitter {
    tx: mpsc::Sender<StreamEvent>,
}

impl EventEmitter {
    /// Wrap the sending half of a mission's event channel.
    #[must_use]
    pub fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self { tx }
    }

    /// Create an emitter together with its receiving half.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Emit one event, stamped with the current time.
    pub async fn emit(&self, kind: EventKind, payload: serde_json::Value) {
        self.send(StreamEvent::new(kind, payload)).await;
    }

    /// Forward an already-built event.
    pub async fn send(&self, event: StreamEvent) {
        let kind = event.kind.wire_name();
        if self.tx.send(event).await.is_err() {
            debug!(kind, "client disconnected; dropping event");
        }
    }
}
