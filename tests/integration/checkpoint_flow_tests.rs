//! Integration tests for the checkpoint respond path: write-once
//! resolution, directive delivery, and the open/await cycle.

use std::sync::Arc;
use std::time::Duration;

use mission_relay::models::checkpoint::CheckpointKind;
use mission_relay::models::mission::{Mission, MissionMode};
use mission_relay::orchestrator::bus::{Directive, ResumeBus};
use mission_relay::orchestrator::checkpoint_controller::CheckpointController;
use mission_relay::persistence::db;
use mission_relay::stream::{EventEmitter, EventKind};
use mission_relay::AppError;

fn sample_mission() -> Mission {
    let mut mission = Mission::new(
        None,
        "tenant-1".to_owned(),
        MissionMode::Sequential,
        "Assess the regulatory pathway".to_owned(),
        None,
        None,
        10.0,
    );
    mission.current_cost = 8.5;
    mission
}

async fn controller() -> (CheckpointController, ResumeBus) {
    let db = Arc::new(db::connect_memory().await.expect("db"));
    let bus = ResumeBus::new();
    (CheckpointController::new(db, bus.clone()), bus)
}

#[tokio::test]
async fn open_persists_and_announces_checkpoint() {
    let (controller, _bus) = controller().await;
    let mission = sample_mission();
    let (emitter, mut rx) = EventEmitter::channel(8);

    let (checkpoint, _waiter) = controller
        .open(&mission, CheckpointKind::Budget, Duration::from_secs(15), &emitter)
        .await
        .expect("open");

    let stored = controller
        .repo()
        .get_by_id(&checkpoint.id)
        .await
        .expect("query")
        .expect("persisted");
    assert_eq!(stored.mission_id, mission.id);
    assert_eq!(stored.context["budget_limit"], 10.0);
    assert_eq!(stored.context["current_cost"], 8.5);

    let event = rx.recv().await.expect("checkpoint event");
    assert_eq!(event.kind, EventKind::Checkpoint);
    assert_eq!(event.payload["type"], "budget");
    assert_eq!(event.payload["id"], checkpoint.id.as_str());
}

#[tokio::test]
async fn respond_wakes_the_waiting_engine() {
    let (controller, _bus) = controller().await;
    let mission = sample_mission();
    let (emitter, _rx) = EventEmitter::channel(8);

    let (checkpoint, waiter) = controller
        .open(&mission, CheckpointKind::Quality, Duration::from_secs(15), &emitter)
        .await
        .expect("open");

    let wait = tokio::spawn({
        let controller = controller.clone();
        let checkpoint = checkpoint.clone();
        async move {
            controller
                .await_resolution(&checkpoint, waiter, Duration::from_secs(5))
                .await
        }
    });

    controller
        .respond(&mission.id, &checkpoint.id, "approve", None, None, None)
        .await
        .expect("respond");

    let directive = wait.await.expect("task").expect("resolved");
    assert_eq!(directive, Directive::Continue);
}

#[tokio::test]
async fn expired_checkpoint_times_out() {
    let (controller, _bus) = controller().await;
    let mission = sample_mission();
    let (emitter, _rx) = EventEmitter::channel(8);

    let (checkpoint, waiter) = controller
        .open(
            &mission,
            CheckpointKind::FinalReview,
            Duration::from_millis(50),
            &emitter,
        )
        .await
        .expect("open");

    let err = controller
        .await_resolution(&checkpoint, waiter, Duration::from_millis(50))
        .await
        .expect_err("must time out");
    assert!(matches!(err, AppError::CheckpointTimeout(ref kind) if kind == "final_review"));
}

#[tokio::test]
async fn increase_budget_directive_carries_new_limit() {
    let (controller, _bus) = controller().await;
    let mission = sample_mission();
    let (emitter, _rx) = EventEmitter::channel(8);

    let (checkpoint, waiter) = controller
        .open(&mission, CheckpointKind::Budget, Duration::from_secs(15), &emitter)
        .await
        .expect("open");

    controller
        .respond(
            &mission.id,
            &checkpoint.id,
            "increase_budget",
            Some("40".to_owned()),
            Some("approved by finance".to_owned()),
            None,
        )
        .await
        .expect("respond");

    let directive = controller
        .await_resolution(&checkpoint, waiter, Duration::from_secs(5))
        .await
        .expect("resolved");
    assert_eq!(directive, Directive::ExtendBudget(40.0));
}

#[tokio::test]
async fn modifications_are_recorded_with_the_resolution() {
    let (controller, _bus) = controller().await;
    let mission = sample_mission();
    let (emitter, _rx) = EventEmitter::channel(8);

    let (checkpoint, _waiter) = controller
        .open(&mission, CheckpointKind::Quality, Duration::from_secs(15), &emitter)
        .await
        .expect("open");

    let edits = serde_json::json!({ "steps": [{ "id": "step-2", "task": "tighten scope" }] });
    controller
        .respond(
            &mission.id,
            &checkpoint.id,
            "revise",
            None,
            Some("needs a narrower question".to_owned()),
            Some(edits.clone()),
        )
        .await
        .expect("respond");

    let stored = controller
        .repo()
        .get_by_id(&checkpoint.id)
        .await
        .expect("query")
        .expect("exists");
    let resolution = stored.resolution.expect("resolution");
    assert_eq!(resolution.action, "revise");
    assert_eq!(resolution.modifications, Some(edits));
}

#[tokio::test]
async fn second_response_is_rejected() {
    let (controller, _bus) = controller().await;
    let mission = sample_mission();
    let (emitter, _rx) = EventEmitter::channel(8);

    let (checkpoint, _waiter) = controller
        .open(&mission, CheckpointKind::Quality, Duration::from_secs(15), &emitter)
        .await
        .expect("open");

    controller
        .respond(&mission.id, &checkpoint.id, "approve", None, None, None)
        .await
        .expect("first response");

    let err = controller
        .respond(&mission.id, &checkpoint.id, "abort", None, None, None)
        .await
        .expect_err("second must fail");
    assert!(matches!(err, AppError::CheckpointConflict(_)));

    // The first decision stands.
    let stored = controller
        .repo()
        .get_by_id(&checkpoint.id)
        .await
        .expect("query")
        .expect("exists");
    assert_eq!(stored.resolution.expect("resolution").action, "approve");
}

#[tokio::test]
async fn respond_to_unknown_checkpoint_is_not_found() {
    let (controller, _bus) = controller().await;
    let err = controller
        .respond("m-1", "nonexistent", "approve", None, None, None)
        .await
        .expect_err("must fail");
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn respond_with_wrong_mission_is_rejected() {
    let (controller, _bus) = controller().await;
    let mission = sample_mission();
    let (emitter, _rx) = EventEmitter::channel(8);

    let (checkpoint, _waiter) = controller
        .open(&mission, CheckpointKind::Quality, Duration::from_secs(15), &emitter)
        .await
        .expect("open");

    let err = controller
        .respond("another-mission", &checkpoint.id, "approve", None, None, None)
        .await
        .expect_err("must fail");
    assert!(matches!(err, AppError::Validation(_)));

    // Still pending for the real mission.
    let pending = controller
        .repo()
        .get_pending_for_mission(&mission.id)
        .await
        .expect("query");
    assert!(pending.is_some());
}

#[tokio::test]
async fn late_response_after_timeout_still_records() {
    let (controller, _bus) = controller().await;
    let mission = sample_mission();
    let (emitter, _rx) = EventEmitter::channel(8);

    let (checkpoint, waiter) = controller
        .open(&mission, CheckpointKind::Quality, Duration::from_millis(20), &emitter)
        .await
        .expect("open");

    let err = controller
        .await_resolution(&checkpoint, waiter, Duration::from_millis(20))
        .await
        .expect_err("times out");
    assert!(matches!(err, AppError::CheckpointTimeout(_)));

    // The engine is gone, but the resolution is still recorded
    // write-once for the audit trail.
    let resolved = controller
        .respond(&mission.id, &checkpoint.id, "approve", None, None, None)
        .await
        .expect("late response");
    assert!(resolved.resolution.is_some());
}
