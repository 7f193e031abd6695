//! Unit tests for stream request validation.

use mission_relay::api::validation::{
    require_tenant, validate_stream_request, StreamRequest, MAX_USER_CONTEXT_BYTES,
};
use mission_relay::models::mission::MissionMode;
use mission_relay::AppError;
use serde_json::json;

fn valid_request() -> StreamRequest {
    StreamRequest {
        goal: "Assess the regulatory pathway for compound X".to_owned(),
        mode: 3,
        mission_id: None,
        template_id: None,
        expert_id: None,
        budget_limit: Some(50.0),
        user_context: None,
    }
}

#[test]
fn valid_request_resolves_mode() {
    let mode = validate_stream_request(&valid_request()).expect("valid");
    assert_eq!(mode, MissionMode::Sequential);

    let mut req = valid_request();
    req.mode = 4;
    assert_eq!(validate_stream_request(&req).expect("valid"), MissionMode::Graph);
}

#[test]
fn goal_too_short_rejected() {
    let mut req = valid_request();
    req.goal = "too short".to_owned();
    let err = validate_stream_request(&req).expect_err("must fail");
    assert!(matches!(err, AppError::Validation(_)));
}

#[test]
fn goal_is_trimmed_before_length_check() {
    let mut req = valid_request();
    req.goal = format!("   {}   ", "x".repeat(9));
    assert!(validate_stream_request(&req).is_err());
}

#[test]
fn goal_too_long_rejected() {
    let mut req = valid_request();
    req.goal = "x".repeat(5001);
    assert!(validate_stream_request(&req).is_err());
}

#[test]
fn goal_length_counts_characters_not_bytes() {
    // 3000 CJK characters encode to 9000 bytes; the character count is
    // what the bounds apply to.
    let mut req = valid_request();
    req.goal = "薬".repeat(3000);
    assert!(validate_stream_request(&req).is_ok());

    // 5001 characters is over the limit regardless of encoding width.
    req.goal = "薬".repeat(5001);
    assert!(validate_stream_request(&req).is_err());

    // 9 multibyte characters are still too short even at 27 bytes.
    req.goal = "薬".repeat(9);
    assert!(validate_stream_request(&req).is_err());
}

#[test]
fn unsupported_mode_rejected() {
    for mode in [0, 1, 2, 5, 255] {
        let mut req = valid_request();
        req.mode = mode;
        assert!(validate_stream_request(&req).is_err(), "mode {mode}");
    }
}

#[test]
fn budget_bounds_enforced() {
    for budget in [0.0, -1.0, 1000.1, f64::NAN, f64::INFINITY] {
        let mut req = valid_request();
        req.budget_limit = Some(budget);
        assert!(validate_stream_request(&req).is_err(), "budget {budget}");
    }

    let mut req = valid_request();
    req.budget_limit = Some(1000.0);
    assert!(validate_stream_request(&req).is_ok());
}

#[test]
fn absent_budget_is_accepted() {
    let mut req = valid_request();
    req.budget_limit = None;
    assert!(validate_stream_request(&req).is_ok());
}

#[test]
fn oversized_user_context_rejected() {
    let mut req = valid_request();
    req.user_context = Some(json!({ "blob": "x".repeat(MAX_USER_CONTEXT_BYTES) }));
    assert!(validate_stream_request(&req).is_err());

    req.user_context = Some(json!({ "note": "small" }));
    assert!(validate_stream_request(&req).is_ok());
}

#[test]
fn tenant_header_required_and_trimmed() {
    assert_eq!(require_tenant(Some(" acme ")).expect("tenant"), "acme");
    assert!(require_tenant(Some("   ")).is_err());
    assert!(require_tenant(None).is_err());
}
