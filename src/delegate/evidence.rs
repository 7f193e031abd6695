//! Evidence-gathering delegate with parallel lookups and fallback.
//!
//! Runs the primary lookup sources concurrently under one shared
//! timeout. When every primary comes back empty, a tertiary fallback
//! source activates under its own shorter hard timeout. Source failures
//! and fallback timeouts degrade to an empty citation set — they are
//! never mission-fatal.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{info, warn};

use crate::models::artifact::Citation;
use crate::models::step::Step;
use crate::Result;

use super::{
    ComplexityClass, Delegate, DelegateOutcome, DelegateResult, RunnerMeta, StepContext,
};

/// One queryable citation source.
pub trait LookupSource: Send + Sync {
    /// Source name for logs and citations.
    fn name(&self) -> &str;

    /// Run a lookup for the given query.
    ///
    /// # Errors
    ///
    /// Returns an error when the source is unreachable; the delegate
    /// treats this as an empty result.
    fn lookup<'a>(
        &'a self,
        query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Citation>>> + Send + 'a>>;
}

/// Fixed-catalog source for development deployments and tests.
pub struct StaticSource {
    name: String,
    citations: Vec<Citation>,
}

impl StaticSource {
    /// Build a source that always returns the given citations.
    #[must_use]
    pub fn new(name: impl Into<String>, citations: Vec<Citation>) -> Self {
        Self {
            name: name.into(),
            citations,
        }
    }
}

impl LookupSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup<'a>(
        &'a self,
        _query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Citation>>> + Send + 'a>> {
        Box::pin(async move { Ok(self.citations.clone()) })
    }
}

/// L3 delegate running multi-source evidence retrieval.
pub struct EvidenceDelegate {
    primaries: Vec<Arc<dyn LookupSource>>,
    fallback: Option<Arc<dyn LookupSource>>,
    shared_timeout: Duration,
    fallback_timeout: Duration,
    token_count: u64,
}

impl EvidenceDelegate {
    /// Build a delegate over the given primary sources.
    #[must_use]
    pub fn new(primaries: Vec<Arc<dyn LookupSource>>) -> Self {
        Self {
            primaries,
            fallback: None,
            shared_timeout: Duration::from_secs(20),
            fallback_timeout: Duration::from_secs(5),
            token_count: 600,
        }
    }

    /// Register the tertiary fallback source.
    #[must_use]
    pub fn with_fallback(mut self, source: Arc<dyn LookupSource>) -> Self {
        self.fallback = Some(source);
        self
    }

    /// Override the shared and fallback timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, shared: Duration, fallback: Duration) -> Self {
        self.shared_timeout = shared;
        self.fallback_timeout = fallback;
        self
    }

    /// A default catalog-backed delegate for development deployments.
    #[must_use]
    pub fn with_default_sources() -> Self {
        let registry = Citation {
            title: "Registry entry".into(),
            source: "registry".into(),
            url: Some("https://example.org/registry".into()),
        };
        let literature = Citation {
            title: "Published literature".into(),
            source: "literature".into(),
            url: Some("https://example.org/literature".into()),
        };
        let archive = Citation {
            title: "Archive record".into(),
            source: "archive".into(),
            url: None,
        };

        Self::new(vec![
            Arc::new(StaticSource::new("registry", vec![registry])),
            Arc::new(StaticSource::new("literature", vec![literature])),
        ])
        .with_fallback(Arc::new(StaticSource::new("archive", vec![archive])))
    }

    /// Query all primaries under the shared timeout.
    async fn gather_primaries(&self, query: &str) -> Vec<Citation> {
        let lookups = join_all(self.primaries.iter().map(|source| {
            let name = source.name().to_owned();
            async move { (name, source.lookup(query).await) }
        }));

        let Ok(results) = tokio::time::timeout(self.shared_timeout, lookups).await else {
            warn!("primary evidence lookups hit the shared timeout");
            return Vec::new();
        };

        let mut citations = Vec::new();
        for (name, result) in results {
            match result {
                Ok(found) => citations.extend(found),
                Err(err) => warn!(source = name, %err, "evidence source failed; skipping"),
            }
        }
        citations
    }

    /// Query the fallback under its own shorter hard timeout.
    async fn gather_fallback(&self, query: &str) -> Vec<Citation> {
        let Some(ref fallback) = self.fallback else {
            return Vec::new();
        };

        match tokio::time::timeout(self.fallback_timeout, fallback.lookup(query)).await {
            Ok(Ok(found)) => found,
            Ok(Err(err)) => {
                warn!(source = fallback.name(), %err, "fallback source failed");
                Vec::new()
            }
            Err(_) => {
                // Recoverable: empty evidence, never mission-fatal.
                warn!(source = fallback.name(), "fallback source timed out");
                Vec::new()
            }
        }
    }
}

impl Delegate for EvidenceDelegate {
    fn execute<'a>(
        &'a self,
        step: &'a Step,
        ctx: &'a StepContext,
    ) -> Pin<Box<dyn Future<Output = Result<DelegateOutcome>> + Send + 'a>> {
        Box::pin(async move {
            let mut citations = self.gather_primaries(&ctx.goal).await;

            if citations.is_empty() {
                info!(step_id = %step.id, "primary sources empty; activating fallback");
                citations = self.gather_fallback(&ctx.goal).await;
            }

            let summary = if citations.is_empty() {
                format!("{}: no supporting evidence located", step.name)
            } else {
                format!(
                    "{}: {} citations gathered across {} sources",
                    step.name,
                    citations.len(),
                    self.primaries.len()
                )
            };

            Ok(DelegateOutcome::Single(DelegateResult {
                summary,
                citations,
                tools_used: vec!["registry_search".into(), "literature_lookup".into()],
                meta: RunnerMeta {
                    complexity: ComplexityClass::Medium,
                    token_count: self.token_count,
                    runner: "evidence/multi-source".into(),
                },
            }))
        })
    }
}
