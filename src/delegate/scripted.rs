//! Deterministic in-process delegate adapter.
//!
//! Serves every tier without external dependencies: the default in
//! development deployments and the workhorse of the test suite. L2 steps
//! produce a streamed event sequence; L3/L4 steps a single result.
//! Failures can be scripted per step name.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::models::artifact::Citation;
use crate::models::step::{DelegateTier, Stage, Step};
use crate::{AppError, Result};

use super::{
    ComplexityClass, Delegate, DelegateEvent, DelegateOutcome, DelegateResult, RunnerMeta,
    StepContext,
};

/// Scripted delegate configuration.
#[derive(Debug, Clone)]
pub struct ScriptedDelegate {
    /// Step name that should fail, if any.
    fail_on_step: Option<String>,
    /// Token count reported per step.
    token_count: u64,
}

impl Default for ScriptedDelegate {
    fn default() -> Self {
        Self {
            fail_on_step: None,
            token_count: 400,
        }
    }
}

impl ScriptedDelegate {
    /// Create a delegate with default behavior.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail deterministically when executing the named step.
    #[must_use]
    pub fn fail_on_step(mut self, name: impl Into<String>) -> Self {
        self.fail_on_step = Some(name.into());
        self
    }

    /// Override the reported token count.
    #[must_use]
    pub fn with_token_count(mut self, tokens: u64) -> Self {
        self.token_count = tokens;
        self
    }

    fn complexity_for(tier: DelegateTier) -> ComplexityClass {
        match tier {
            DelegateTier::L2 => ComplexityClass::Light,
            DelegateTier::L3 => ComplexityClass::Medium,
            DelegateTier::L4 => ComplexityClass::Heavy,
        }
    }

    fn tools_for(stage: Stage) -> Vec<String> {
        let tools: &[&str] = match stage {
            Stage::Strategy => &["context_builder"],
            Stage::Evidence => &["registry_search", "literature_lookup"],
            Stage::Analysis => &["comparator_matrix"],
            Stage::Synthesis => &["draft_composer"],
            Stage::Qa => &["consistency_check"],
        };
        tools.iter().map(|&t| t.to_owned()).collect()
    }

    fn citations_for(step: &Step) -> Vec<Citation> {
        match step.stage {
            Stage::Evidence | Stage::Analysis => vec![
                Citation {
                    title: format!("Primary source for {}", step.name),
                    source: "registry".into(),
                    url: Some("https://example.org/registry/1".into()),
                },
                Citation {
                    title: format!("Secondary source for {}", step.name),
                    source: "literature".into(),
                    url: None,
                },
            ],
            _ => Vec::new(),
        }
    }

    fn build_result(&self, step: &Step, ctx: &StepContext) -> DelegateResult {
        DelegateResult {
            summary: format!(
                "{} [{}]: findings for goal '{}' ({} prior artifacts considered)",
                step.name,
                step.worker,
                ctx.goal,
                ctx.prior_artifacts.len()
            ),
            citations: Self::citations_for(step),
            tools_used: Self::tools_for(step.stage),
            meta: RunnerMeta {
                complexity: Self::complexity_for(step.tier),
                token_count: self.token_count,
                runner: format!("scripted/{}", step.worker),
            },
        }
    }

    /// Spawn the canned L2 event sequence onto a channel.
    fn stream_events(&self, step: &Step, ctx: &StepContext) -> mpsc::Receiver<DelegateEvent> {
        let (tx, rx) = mpsc::channel(32);
        let result = self.build_result(step, ctx);
        let citations = result.citations.clone();
        let tool = result
            .tools_used
            .first()
            .cloned()
            .unwrap_or_else(|| "context_builder".to_owned());
        let failed = self
            .fail_on_step
            .as_deref()
            .is_some_and(|name| name == step.name);
        let step_name = step.name.clone();

        tokio::spawn(async move {
            let _ = tx.send(DelegateEvent::ThinkingStart).await;
            for (index, token) in ["assessing", "the", "mission", "step"].iter().enumerate() {
                let _ = tx
                    .send(DelegateEvent::Thinking {
                        index: index as u64,
                        token: (*token).to_owned(),
                    })
                    .await;
            }
            let _ = tx.send(DelegateEvent::ThinkingEnd).await;

            let _ = tx.send(DelegateEvent::ToolStart { name: tool.clone() }).await;
            let _ = tx.send(DelegateEvent::ToolEnd { name: tool }).await;

            if !citations.is_empty() {
                let _ = tx.send(DelegateEvent::Sources(citations)).await;
            }

            if failed {
                let _ = tx
                    .send(DelegateEvent::Error(format!(
                        "scripted failure executing {step_name}"
                    )))
                    .await;
            } else {
                let _ = tx.send(DelegateEvent::Complete(result)).await;
            }
        });

        rx
    }
}

impl Delegate for ScriptedDelegate {
    fn execute<'a>(
        &'a self,
        step: &'a Step,
        ctx: &'a StepContext,
    ) -> Pin<Box<dyn Future<Output = Result<DelegateOutcome>> + Send + 'a>> {
        Box::pin(async move {
            if step.tier == DelegateTier::L2 {
                // Streaming contract: failures surface as a terminal
                // stream event rather than an adapter error.
                return Ok(DelegateOutcome::Stream(self.stream_events(step, ctx)));
            }

            if self
                .fail_on_step
                .as_deref()
                .is_some_and(|name| name == step.name)
            {
                return Err(AppError::Delegate(format!(
                    "scripted failure executing {}",
                    step.name
                )));
            }

            Ok(DelegateOutcome::Single(self.build_result(step, ctx)))
        })
    }
}
