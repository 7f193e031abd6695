//! Integration tests for the multi-source evidence delegate.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use mission_relay::delegate::evidence::{EvidenceDelegate, LookupSource, StaticSource};
use mission_relay::delegate::{Delegate, DelegateOutcome, StepContext};
use mission_relay::models::artifact::Citation;
use mission_relay::models::step::{DelegateTier, Stage, Step, StepStatus};
use mission_relay::{AppError, Result};

fn citation(title: &str, source: &str) -> Citation {
    Citation {
        title: title.to_owned(),
        source: source.to_owned(),
        url: None,
    }
}

fn evidence_step() -> Step {
    Step {
        id: "step_2".to_owned(),
        name: "Evidence Retrieval".to_owned(),
        description: "Gather supporting evidence".to_owned(),
        tier: DelegateTier::L3,
        worker: "researcher".to_owned(),
        stage: Stage::Evidence,
        dependencies: vec!["step_1".to_owned()],
        status: StepStatus::Pending,
    }
}

fn ctx() -> StepContext {
    StepContext {
        goal: "reimbursement landscape".to_owned(),
        tenant_id: "tenant-1".to_owned(),
        template_id: None,
        expert_id: None,
        prior_artifacts: Vec::new(),
    }
}

/// Source that always errors, standing in for an unreachable backend.
struct BrokenSource;

impl LookupSource for BrokenSource {
    fn name(&self) -> &str {
        "broken"
    }

    fn lookup<'a>(
        &'a self,
        _query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Citation>>> + Send + 'a>> {
        Box::pin(async { Err(AppError::Delegate("backend unreachable".to_owned())) })
    }
}

/// Source that never answers within any test timeout.
struct StalledSource;

impl LookupSource for StalledSource {
    fn name(&self) -> &str {
        "stalled"
    }

    fn lookup<'a>(
        &'a self,
        _query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Citation>>> + Send + 'a>> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        })
    }
}

async fn run(delegate: &EvidenceDelegate) -> Vec<Citation> {
    let step = evidence_step();
    let context = ctx();
    match delegate.execute(&step, &context).await.expect("execute") {
        DelegateOutcome::Single(result) => result.citations,
        DelegateOutcome::Stream(_) => panic!("evidence delegate must return a single result"),
    }
}

#[tokio::test]
async fn merges_citations_from_all_primaries() {
    let delegate = EvidenceDelegate::new(vec![
        Arc::new(StaticSource::new(
            "registry",
            vec![citation("Entry A", "registry")],
        )),
        Arc::new(StaticSource::new(
            "literature",
            vec![citation("Paper B", "literature"), citation("Paper C", "literature")],
        )),
    ]);

    let citations = run(&delegate).await;
    assert_eq!(citations.len(), 3);
}

#[tokio::test]
async fn failing_primary_is_skipped_not_fatal() {
    let delegate = EvidenceDelegate::new(vec![
        Arc::new(BrokenSource),
        Arc::new(StaticSource::new(
            "registry",
            vec![citation("Entry A", "registry")],
        )),
    ]);

    let citations = run(&delegate).await;
    assert_eq!(citations.len(), 1);
    assert_eq!(citations[0].source, "registry");
}

#[tokio::test]
async fn fallback_activates_when_primaries_empty() {
    let delegate = EvidenceDelegate::new(vec![Arc::new(StaticSource::new("registry", Vec::new()))])
        .with_fallback(Arc::new(StaticSource::new(
            "archive",
            vec![citation("Archive record", "archive")],
        )));

    let citations = run(&delegate).await;
    assert_eq!(citations.len(), 1);
    assert_eq!(citations[0].source, "archive");
}

#[tokio::test]
async fn fallback_not_consulted_when_primaries_deliver() {
    let delegate = EvidenceDelegate::new(vec![Arc::new(StaticSource::new(
        "registry",
        vec![citation("Entry A", "registry")],
    ))])
    .with_fallback(Arc::new(StaticSource::new(
        "archive",
        vec![citation("Archive record", "archive")],
    )));

    let citations = run(&delegate).await;
    assert_eq!(citations.len(), 1);
    assert_eq!(citations[0].source, "registry");
}

#[tokio::test]
async fn stalled_fallback_degrades_to_empty() {
    let delegate = EvidenceDelegate::new(vec![Arc::new(StaticSource::new("registry", Vec::new()))])
        .with_fallback(Arc::new(StalledSource))
        .with_timeouts(Duration::from_millis(100), Duration::from_millis(50));

    let step = evidence_step();
    let context = ctx();
    let outcome = delegate.execute(&step, &context).await.expect("execute");
    let DelegateOutcome::Single(result) = outcome else {
        panic!("single result expected");
    };
    assert!(result.citations.is_empty());
    assert!(result.summary.contains("no supporting evidence"));
}

#[tokio::test]
async fn stalled_primaries_hit_shared_timeout() {
    let delegate = EvidenceDelegate::new(vec![
        Arc::new(StalledSource),
        Arc::new(StaticSource::new(
            "registry",
            vec![citation("Entry A", "registry")],
        )),
    ])
    .with_timeouts(Duration::from_millis(50), Duration::from_millis(50));

    // The shared timeout abandons the whole primary round.
    let citations = run(&delegate).await;
    assert!(citations.is_empty());
}
