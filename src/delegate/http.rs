//! Remote worker adapter over HTTP.
//!
//! Posts the step and its context to a worker endpoint and maps the JSON
//! reply onto the single-result delegate contract. Streaming is not
//! supported over this adapter; it serves L3/L4 tiers.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::info_span;
use tracing::Instrument as _;

use crate::models::artifact::Citation;
use crate::models::step::Step;
use crate::{AppError, Result};

use super::{
    ComplexityClass, Delegate, DelegateOutcome, DelegateResult, RunnerMeta, StepContext,
};

/// Reply shape expected from the remote worker.
#[derive(Debug, Deserialize)]
struct WireResult {
    summary: String,
    #[serde(default)]
    citations: Vec<Citation>,
    #[serde(default)]
    tools_used: Vec<String>,
    complexity: ComplexityClass,
    token_count: u64,
    runner: String,
}

/// Delegate adapter calling a remote worker service.
pub struct HttpDelegate {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpDelegate {
    /// Build an adapter for the given worker endpoint.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| AppError::Config(format!("failed to build http client: {err}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

impl Delegate for HttpDelegate {
    fn execute<'a>(
        &'a self,
        step: &'a Step,
        ctx: &'a StepContext,
    ) -> Pin<Box<dyn Future<Output = Result<DelegateOutcome>> + Send + 'a>> {
        let span = info_span!("http_delegate", step_id = %step.id, tier = step.tier.wire_name());

        Box::pin(
            async move {
                let body = json!({
                    "tier": step.tier.wire_name(),
                    "worker": step.worker,
                    "task": step,
                    "context": {
                        "goal": ctx.goal,
                        "tenant_id": ctx.tenant_id,
                        "template_id": ctx.template_id,
                        "expert_id": ctx.expert_id,
                        "prior_artifacts": ctx.prior_artifacts,
                    },
                });

                let response = self
                    .client
                    .post(&self.endpoint)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|err| AppError::Delegate(format!("worker request failed: {err}")))?;

                if !response.status().is_success() {
                    return Err(AppError::Delegate(format!(
                        "worker returned {} for {}",
                        response.status(),
                        step.id
                    )));
                }

                let wire: WireResult = response
                    .json()
                    .await
                    .map_err(|err| AppError::Delegate(format!("invalid worker reply: {err}")))?;

                Ok(DelegateOutcome::Single(DelegateResult {
                    summary: wire.summary,
                    citations: wire.citations,
                    tools_used: wire.tools_used,
                    meta: RunnerMeta {
                        complexity: wire.complexity,
                        token_count: wire.token_count,
                        runner: wire.runner,
                    },
                }))
            }
            .instrument(span),
        )
    }
}
