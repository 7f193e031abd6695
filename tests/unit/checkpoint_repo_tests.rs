//! Unit tests for `CheckpointRepo` persistence and write-once resolution.

use std::sync::Arc;

use chrono::Utc;
use mission_relay::models::checkpoint::{
    Checkpoint, CheckpointKind, CheckpointStatus, Resolution,
};
use mission_relay::persistence::checkpoint_repo::CheckpointRepo;
use mission_relay::persistence::db;
use mission_relay::AppError;
use serde_json::json;

fn sample_checkpoint(mission_id: &str, kind: CheckpointKind) -> Checkpoint {
    Checkpoint::new(
        mission_id.to_owned(),
        kind,
        15,
        json!({ "current_cost": 4.2, "budget_limit": 25.0 }),
    )
}

fn approve() -> Resolution {
    Resolution {
        action: "approve".to_owned(),
        option: None,
        reason: Some("looks good".to_owned()),
        modifications: None,
        resolved_at: Utc::now(),
    }
}

async fn repo() -> CheckpointRepo {
    let db = db::connect_memory().await.expect("db");
    CheckpointRepo::new(Arc::new(db))
}

#[tokio::test]
async fn create_and_get_round_trip() {
    let repo = repo().await;
    let checkpoint = sample_checkpoint("m-1", CheckpointKind::Quality);

    repo.create(&checkpoint).await.expect("create");
    let loaded = repo
        .get_by_id(&checkpoint.id)
        .await
        .expect("query")
        .expect("exists");

    assert_eq!(loaded.mission_id, "m-1");
    assert_eq!(loaded.kind, CheckpointKind::Quality);
    assert_eq!(loaded.status, CheckpointStatus::Pending);
    assert_eq!(loaded.options, checkpoint.options);
    assert_eq!(loaded.context, checkpoint.context);
    assert!(loaded.resolution.is_none());
}

#[tokio::test]
async fn get_by_id_returns_none_for_missing() {
    let repo = repo().await;
    assert!(repo.get_by_id("nonexistent").await.expect("query").is_none());
}

#[tokio::test]
async fn resolve_records_decision_once() {
    let repo = repo().await;
    let checkpoint = sample_checkpoint("m-1", CheckpointKind::Budget);
    repo.create(&checkpoint).await.expect("create");

    let resolved = repo.resolve(&checkpoint.id, &approve()).await.expect("resolve");
    assert_eq!(resolved.status, CheckpointStatus::Resolved);
    let resolution = resolved.resolution.expect("resolution recorded");
    assert_eq!(resolution.action, "approve");
    assert_eq!(resolution.reason, Some("looks good".to_owned()));
}

#[tokio::test]
async fn second_resolve_is_conflict() {
    let repo = repo().await;
    let checkpoint = sample_checkpoint("m-1", CheckpointKind::Quality);
    repo.create(&checkpoint).await.expect("create");

    repo.resolve(&checkpoint.id, &approve()).await.expect("first");
    let err = repo
        .resolve(&checkpoint.id, &approve())
        .await
        .expect_err("second must fail");
    assert!(matches!(err, AppError::CheckpointConflict(_)));

    // First decision stands.
    let loaded = repo
        .get_by_id(&checkpoint.id)
        .await
        .expect("query")
        .expect("exists");
    assert_eq!(loaded.resolution.expect("resolution").action, "approve");
}

#[tokio::test]
async fn resolve_missing_checkpoint_is_not_found() {
    let repo = repo().await;
    let err = repo
        .resolve("nonexistent", &approve())
        .await
        .expect_err("must fail");
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn pending_lookup_scoped_to_mission() {
    let repo = repo().await;
    let ours = sample_checkpoint("m-1", CheckpointKind::Quality);
    let theirs = sample_checkpoint("m-2", CheckpointKind::Budget);
    repo.create(&ours).await.expect("create");
    repo.create(&theirs).await.expect("create");

    let pending = repo
        .get_pending_for_mission("m-1")
        .await
        .expect("query")
        .expect("pending exists");
    assert_eq!(pending.id, ours.id);

    repo.resolve(&ours.id, &approve()).await.expect("resolve");
    assert!(repo
        .get_pending_for_mission("m-1")
        .await
        .expect("query")
        .is_none());
}
