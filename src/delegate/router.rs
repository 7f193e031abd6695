//! Tier-keyed delegate dispatch and stream normalization.
//!
//! The router owns the mapping from [`DelegateTier`] to adapter and is
//! the single place where inbound delegate events become outward wire
//! events. Translation is 1:1; nothing is buffered beyond what is needed
//! to hand the terminal [`DelegateResult`] back to the engine.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tracing::warn;

use crate::models::step::{DelegateTier, Step};
use crate::stream::{EventEmitter, EventKind};
use crate::{AppError, Result};

use super::{Delegate, DelegateEvent, DelegateOutcome, DelegateResult, StepContext};

/// A delegate result plus how it was produced.
///
/// `streamed` tells the engine which auxiliary events (tokens, tool
/// activity, sources) already reached the wire during execution.
pub struct Routed {
    /// Terminal delegate result.
    pub result: DelegateResult,
    /// Whether the result arrived via the streaming (L2) contract.
    pub streamed: bool,
}

/// Dispatches a step to the adapter registered for its tier.
#[derive(Clone, Default)]
pub struct DelegateRouter {
    routes: HashMap<DelegateTier, Arc<dyn Delegate>>,
}

impl DelegateRouter {
    /// Create an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter for a tier, replacing any previous one.
    #[must_use]
    pub fn with_tier(mut self, tier: DelegateTier, delegate: Arc<dyn Delegate>) -> Self {
        self.routes.insert(tier, delegate);
        self
    }

    /// Look up the adapter for a tier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Delegate` if no adapter is registered.
    pub fn resolve(&self, tier: DelegateTier) -> Result<Arc<dyn Delegate>> {
        self.routes.get(&tier).cloned().ok_or_else(|| {
            AppError::Delegate(format!(
                "no delegate registered for tier {}",
                tier.wire_name()
            ))
        })
    }

    /// Execute a step and normalize its outcome to a single result.
    ///
    /// Streamed delegate events are forwarded to `emitter` as they
    /// arrive. A stream that closes without exactly one terminal event
    /// violates the delegate contract and is treated as a failure.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Delegate` on adapter failure, a terminal
    /// `error` event, or a contract violation.
    pub async fn execute(
        &self,
        step: &Step,
        ctx: &StepContext,
        emitter: &EventEmitter,
    ) -> Result<Routed> {
        let delegate = self.resolve(step.tier)?;

        match delegate.execute(step, ctx).await? {
            DelegateOutcome::Single(result) => Ok(Routed {
                result,
                streamed: false,
            }),
            DelegateOutcome::Stream(rx) => {
                let result = drain_stream(step, rx, emitter).await?;
                Ok(Routed {
                    result,
                    streamed: true,
                })
            }
        }
    }
}

/// Forward stream events 1:1 and extract the terminal result.
async fn drain_stream(
    step: &Step,
    mut rx: tokio::sync::mpsc::Receiver<DelegateEvent>,
    emitter: &EventEmitter,
) -> Result<DelegateResult> {
    let mut next_index: u64 = 0;

    while let Some(event) = rx.recv().await {
        match event {
            DelegateEvent::ToolStart { name } => {
                emitter
                    .emit(
                        EventKind::ToolStart,
                        json!({ "step_id": step.id, "tool": name }),
                    )
                    .await;
            }
            DelegateEvent::ToolEnd { name } => {
                emitter
                    .emit(
                        EventKind::ToolEnd,
                        json!({ "step_id": step.id, "tool": name }),
                    )
                    .await;
            }
            DelegateEvent::Sources(citations) => {
                emitter
                    .emit(
                        EventKind::Sources,
                        json!({ "step_id": step.id, "citations": citations }),
                    )
                    .await;
            }
            DelegateEvent::ThinkingStart => {
                emitter
                    .emit(EventKind::ThinkingStart, json!({ "step_id": step.id }))
                    .await;
            }
            DelegateEvent::Thinking { index, token } => {
                if index != next_index {
                    warn!(
                        step_id = %step.id,
                        expected = next_index,
                        got = index,
                        "delegate token index out of sequence"
                    );
                }
                next_index = index.saturating_add(1);
                emitter
                    .emit(EventKind::Token, json!({ "index": index, "token": token }))
                    .await;
            }
            DelegateEvent::ThinkingEnd => {
                emitter
                    .emit(EventKind::ThinkingEnd, json!({ "step_id": step.id }))
                    .await;
            }
            DelegateEvent::Complete(result) => return Ok(result),
            DelegateEvent::Error(message) => {
                return Err(AppError::Delegate(message));
            }
        }
    }

    Err(AppError::Delegate(format!(
        "delegate stream for {} closed without a terminal event",
        step.id
    )))
}
