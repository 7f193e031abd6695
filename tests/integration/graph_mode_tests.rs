//! Integration tests for the dependency-graph executor.
//!
//! The graph executor must be indistinguishable from the sequential one
//! on the wire: same closed event grammar, same terminal semantics.

use std::time::Duration;

use mission_relay::delegate::scripted::ScriptedDelegate;
use mission_relay::models::mission::{MissionMode, MissionStatus};
use mission_relay::stream::EventKind;

use super::test_helpers::{
    auto_respond, build_engine, collect_events, events_of, sample_mission, scripted_router,
    setup, test_engine_config,
};

const GOAL: &str = "Summarize public information about topic X for the team";

#[tokio::test]
async fn graph_mission_completes_with_same_grammar() {
    let harness = setup().await;
    let mission = sample_mission(GOAL, MissionMode::Graph, 25.0);
    let mission_id = mission.id.clone();
    let (engine, rx) = build_engine(
        &harness,
        mission,
        scripted_router(ScriptedDelegate::new()),
        test_engine_config(Duration::from_secs(5)),
    )
    .await;

    let responder = auto_respond(&harness, &mission_id, Vec::new());
    let run = tokio::spawn(engine.run());
    let events = collect_events(rx).await;
    run.await.expect("engine task");
    responder.await.expect("responder task");

    assert_eq!(events.last().expect("events").kind, EventKind::Done);
    assert_eq!(events_of(&events, EventKind::Artifact).len(), 5);
    assert!(events_of(&events, EventKind::Error).is_empty());

    // Node deltas surface as plain status events carrying the step id.
    let step_status: Vec<_> = events_of(&events, EventKind::Status)
        .into_iter()
        .filter(|event| event.payload.get("step_id").is_some())
        .collect();
    assert!(!step_status.is_empty());
    assert!(step_status
        .iter()
        .any(|event| event.payload["step_status"] == "completed"));

    let stored = harness
        .repo
        .get_state(&mission_id)
        .await
        .expect("query")
        .expect("exists");
    assert_eq!(stored.status, MissionStatus::Completed);
    assert_eq!(stored.artifacts.len(), 5);
}

#[tokio::test]
async fn graph_steps_respect_dependency_order() {
    let harness = setup().await;
    let mission = sample_mission(GOAL, MissionMode::Graph, 25.0);
    let mission_id = mission.id.clone();
    let (engine, rx) = build_engine(
        &harness,
        mission,
        scripted_router(ScriptedDelegate::new()),
        test_engine_config(Duration::from_secs(5)),
    )
    .await;

    let responder = auto_respond(&harness, &mission_id, Vec::new());
    let run = tokio::spawn(engine.run());
    let events = collect_events(rx).await;
    run.await.expect("engine task");
    responder.await.expect("responder task");

    // Linear dependency chains force plan order even under the graph
    // scheduler.
    let artifact_steps: Vec<String> = events_of(&events, EventKind::Artifact)
        .iter()
        .filter_map(|event| event.payload["artifact"]["step_id"].as_str().map(str::to_owned))
        .collect();
    assert_eq!(
        artifact_steps,
        vec!["step_1", "step_2", "step_3", "step_4", "step_5"]
    );
}

#[tokio::test]
async fn graph_failure_matches_sequential_semantics() {
    let harness = setup().await;
    let mission = sample_mission(GOAL, MissionMode::Graph, 25.0);
    let mission_id = mission.id.clone();
    let (engine, rx) = build_engine(
        &harness,
        mission,
        scripted_router(ScriptedDelegate::new().fail_on_step("Evidence Retrieval")),
        test_engine_config(Duration::from_secs(5)),
    )
    .await;

    let run = tokio::spawn(engine.run());
    let events = collect_events(rx).await;
    run.await.expect("engine task");

    let errors = events_of(&events, EventKind::Error);
    assert_eq!(errors.len(), 1);
    assert!(events_of(&events, EventKind::Done).is_empty());

    let stored = harness
        .repo
        .get_state(&mission_id)
        .await
        .expect("query")
        .expect("exists");
    assert_eq!(stored.status, MissionStatus::Failed);
    assert_eq!(stored.artifacts.len(), 1);
}
