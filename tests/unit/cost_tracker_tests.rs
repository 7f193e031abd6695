//! Unit tests for cost accounting and the budget-gate latch.

use mission_relay::delegate::{ComplexityClass, RunnerMeta};
use mission_relay::orchestrator::cost_tracker::CostTracker;

fn meta(complexity: ComplexityClass, tokens: u64) -> RunnerMeta {
    RunnerMeta {
        complexity,
        token_count: tokens,
        runner: "test".to_owned(),
    }
}

#[test]
fn step_cost_is_base_plus_token_volume() {
    let tracker = CostTracker::new(0.001, 0.8);

    let light = tracker.step_cost(&meta(ComplexityClass::Light, 400));
    let medium = tracker.step_cost(&meta(ComplexityClass::Medium, 400));
    let heavy = tracker.step_cost(&meta(ComplexityClass::Heavy, 1000));

    assert!((light - 0.9).abs() < f64::EPSILON);
    assert!((medium - 1.4).abs() < f64::EPSILON);
    assert!((heavy - 3.0).abs() < f64::EPSILON);
}

#[test]
fn record_accumulates_monotonically() {
    let mut tracker = CostTracker::new(0.001, 0.8);

    assert!((tracker.record(1.0) - 1.0).abs() < f64::EPSILON);
    assert!((tracker.record(0.5) - 1.5).abs() < f64::EPSILON);
    // Negative costs are clamped; the total never decreases.
    assert!((tracker.record(-2.0) - 1.5).abs() < f64::EPSILON);
    assert!((tracker.total() - 1.5).abs() < f64::EPSILON);
}

#[test]
fn budget_gate_fires_exactly_once() {
    let mut tracker = CostTracker::new(0.001, 0.8);
    let limit = 10.0;

    tracker.record(7.0);
    assert!(!tracker.should_raise_budget_gate(limit));

    tracker.record(1.5);
    assert!(tracker.should_raise_budget_gate(limit));
    assert!(tracker.budget_checkpoint_issued());

    // Latch armed: further spend never re-raises.
    tracker.record(100.0);
    assert!(!tracker.should_raise_budget_gate(limit));
}

#[test]
fn gate_does_not_fire_below_threshold_boundary() {
    let mut tracker = CostTracker::new(0.001, 0.8);
    tracker.record(7.99);
    assert!(!tracker.should_raise_budget_gate(10.0));

    // Reaching the boundary exactly fires the gate.
    tracker.record(0.01);
    assert!(tracker.should_raise_budget_gate(10.0));
}

#[test]
fn resume_restores_total_and_latch() {
    let mut tracker = CostTracker::resume(0.001, 0.8, 9.0, true);
    assert!((tracker.total() - 9.0).abs() < f64::EPSILON);
    assert!(tracker.budget_checkpoint_issued());
    assert!(!tracker.should_raise_budget_gate(10.0));
}
