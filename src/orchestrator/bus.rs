//! Resume bus: one-shot wakeups for paused missions.
//!
//! A checkpoint wait registers a `oneshot` sender keyed by
//! `(mission_id, checkpoint_id)`; the HTTP respond path publishes the
//! directive through it. Senders are removed on publish, guaranteeing
//! exactly-once wakeup per key.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};
use tracing::warn;

use crate::{AppError, Result};

/// What the engine should do after a checkpoint resolves.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Resume with the next unexecuted step.
    Continue,
    /// Raise the budget limit to the given value and resume.
    ExtendBudget(f64),
    /// Terminate the mission at operator request.
    Abort,
    /// Re-execute the most recently completed step.
    Revise,
}

type WaiterKey = (String, String);

/// In-process pub/sub for checkpoint resolutions.
#[derive(Clone, Default)]
pub struct ResumeBus {
    waiters: Arc<Mutex<HashMap<WaiterKey, oneshot::Sender<Directive>>>>,
}

impl ResumeBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `(mission_id, checkpoint_id)`.
    ///
    /// A stale waiter for the same key is replaced and its receiver
    /// observes a closed channel.
    pub async fn subscribe(
        &self,
        mission_id: &str,
        checkpoint_id: &str,
    ) -> oneshot::Receiver<Directive> {
        let (tx, rx) = oneshot::channel();
        let key = (mission_id.to_owned(), checkpoint_id.to_owned());

        let mut waiters = self.waiters.lock().await;
        if waiters.insert(key, tx).is_some() {
            warn!(mission_id, checkpoint_id, "replaced stale checkpoint waiter");
        }
        rx
    }

    /// Deliver the directive to the registered waiter, consuming it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no waiter is registered for the
    /// key (e.g. the engine already timed out).
    pub async fn publish(
        &self,
        mission_id: &str,
        checkpoint_id: &str,
        directive: Directive,
    ) -> Result<()> {
        let key = (mission_id.to_owned(), checkpoint_id.to_owned());
        let sender = {
            let mut waiters = self.waiters.lock().await;
            waiters.remove(&key)
        };

        let Some(sender) = sender else {
            return Err(AppError::NotFound(format!(
                "no waiter registered for checkpoint {checkpoint_id}"
            )));
        };

        if sender.send(directive).is_err() {
            // Receiver dropped between removal and send; the engine gave
            // up on this checkpoint.
            return Err(AppError::NotFound(format!(
                "waiter for checkpoint {checkpoint_id} is gone"
            )));
        }

        Ok(())
    }

    /// Drop the waiter for a key after a timeout.
    pub async fn discard(&self, mission_id: &str, checkpoint_id: &str) {
        let key = (mission_id.to_owned(), checkpoint_id.to_owned());
        let mut waiters = self.waiters.lock().await;
        waiters.remove(&key);
    }
}
