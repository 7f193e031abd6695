//! Unit tests for the outward event grammar and signal normalization.

use mission_relay::stream::adapter::{normalize, GraphSignal};
use mission_relay::stream::{EventEmitter, EventKind, StreamEvent, END_OF_STREAM};
use serde_json::json;

#[test]
fn wire_names_are_stable() {
    let cases = [
        (EventKind::Status, "status"),
        (EventKind::Plan, "plan"),
        (EventKind::ThinkingStart, "thinking_start"),
        (EventKind::Progress, "progress"),
        (EventKind::ToolStart, "tool_start"),
        (EventKind::Sources, "sources"),
        (EventKind::Artifact, "artifact"),
        (EventKind::Cost, "cost"),
        (EventKind::Token, "token"),
        (EventKind::AgentSelected, "agent_selected"),
        (EventKind::Delegation, "delegation"),
        (EventKind::Checkpoint, "checkpoint"),
        (EventKind::Done, "done"),
        (EventKind::Error, "error"),
    ];
    for (kind, expected) in cases {
        assert_eq!(kind.wire_name(), expected);
    }
}

#[test]
fn envelope_serializes_with_type_field() {
    let event = StreamEvent::new(EventKind::Cost, json!({ "total": 4.2 }));
    let value = serde_json::to_value(&event).expect("serialize");

    assert_eq!(value["type"], "cost");
    assert_eq!(value["payload"]["total"], 4.2);
    assert!(value["timestamp"].is_string());
}

#[test]
fn end_of_stream_sentinel() {
    assert_eq!(END_OF_STREAM, "[DONE]");
}

#[test]
fn full_state_normalizes_to_progress() {
    let event = normalize(GraphSignal::FullState {
        completed: 2,
        total: 5,
        cost: 3.3,
    })
    .expect("mapped");
    assert_eq!(event.kind, EventKind::Progress);
    assert_eq!(event.payload["completed"], 2);
    assert_eq!(event.payload["total"], 5);
}

#[test]
fn delta_normalizes_to_status() {
    let event = normalize(GraphSignal::Delta {
        step_id: "step_2".to_owned(),
        status: "in_progress".to_owned(),
    })
    .expect("mapped");
    assert_eq!(event.kind, EventKind::Status);
    assert_eq!(event.payload["step_id"], "step_2");
}

#[test]
fn message_token_normalizes_to_token() {
    let event = normalize(GraphSignal::MessageToken {
        index: 7,
        token: "evidence".to_owned(),
    })
    .expect("mapped");
    assert_eq!(event.kind, EventKind::Token);
    assert_eq!(event.payload["index"], 7);
}

#[test]
fn known_custom_signals_survive() {
    let event = normalize(GraphSignal::Custom {
        name: "sources".to_owned(),
        payload: json!({ "citations": [] }),
    })
    .expect("mapped");
    assert_eq!(event.kind, EventKind::Sources);
}

#[test]
fn unknown_custom_signals_are_dropped() {
    assert!(normalize(GraphSignal::Custom {
        name: "scheduler_heartbeat".to_owned(),
        payload: json!({}),
    })
    .is_none());
}

#[test]
fn debug_signals_are_dropped() {
    assert!(normalize(GraphSignal::Debug {
        message: "node settled".to_owned(),
    })
    .is_none());
}

#[tokio::test]
async fn emitter_delivers_in_order() {
    let (emitter, mut rx) = EventEmitter::channel(8);

    emitter.emit(EventKind::Status, json!({ "status": "planning" })).await;
    emitter.emit(EventKind::Plan, json!({ "steps": [] })).await;
    drop(emitter);

    let first = rx.recv().await.expect("first");
    let second = rx.recv().await.expect("second");
    assert_eq!(first.kind, EventKind::Status);
    assert_eq!(second.kind, EventKind::Plan);
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn emitter_tolerates_dropped_receiver() {
    let (emitter, rx) = EventEmitter::channel(1);
    drop(rx);
    // Must not panic or block.
    emitter.emit(EventKind::Cost, json!({ "total": 1.0 })).await;
}
