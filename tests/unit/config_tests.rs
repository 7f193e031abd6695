//! Unit tests for configuration parsing, defaults, and validation.

use std::path::PathBuf;

use mission_relay::config::GlobalConfig;
use mission_relay::AppError;

#[test]
fn empty_toml_yields_defaults() {
    let config = GlobalConfig::from_toml_str("").expect("parse");

    assert_eq!(config.http_port, 8080);
    assert_eq!(config.data_dir, PathBuf::from(".mission-relay"));
    assert_eq!(config.timeouts.checkpoint_seconds, 15);
    assert_eq!(config.timeouts.final_review_seconds, 15);
    assert!((config.cost.per_token_rate - 0.001).abs() < f64::EPSILON);
    assert!((config.cost.budget_threshold - 0.8).abs() < f64::EPSILON);
    assert!((config.cost.default_budget_limit - 25.0).abs() < f64::EPSILON);
    assert!(config.delegate.http_endpoint.is_none());
}

#[test]
fn explicit_values_override_defaults() {
    let toml = r#"
data_dir = "/var/lib/relay"
http_port = 9090

[timeouts]
checkpoint_seconds = 30
final_review_seconds = 60

[cost]
per_token_rate = 0.002
budget_threshold = 0.5
default_budget_limit = 100.0

[delegate]
http_endpoint = "http://workers.internal:8000"
"#;
    let config = GlobalConfig::from_toml_str(toml).expect("parse");

    assert_eq!(config.http_port, 9090);
    assert_eq!(config.data_dir, PathBuf::from("/var/lib/relay"));
    assert_eq!(config.timeouts.checkpoint_seconds, 30);
    assert_eq!(config.timeouts.final_review_seconds, 60);
    assert!((config.cost.budget_threshold - 0.5).abs() < f64::EPSILON);
    assert_eq!(
        config.delegate.http_endpoint.as_deref(),
        Some("http://workers.internal:8000")
    );
}

#[test]
fn db_path_is_under_data_dir() {
    let config = GlobalConfig::from_toml_str("data_dir = \"/tmp/relay\"").expect("parse");
    assert_eq!(config.db_path(), PathBuf::from("/tmp/relay/missions.db"));
}

#[test]
fn load_from_path_reads_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "http_port = 9191").expect("write config");

    let config = GlobalConfig::load_from_path(&path).expect("load");
    assert_eq!(config.http_port, 9191);
}

#[test]
fn load_from_missing_path_is_config_error() {
    let err = GlobalConfig::load_from_path("/nonexistent/config.toml").expect_err("must fail");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn invalid_toml_is_config_error() {
    let err = GlobalConfig::from_toml_str("http_port = \"not a port\"").expect_err("must fail");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn threshold_out_of_range_rejected() {
    let err = GlobalConfig::from_toml_str("[cost]\nbudget_threshold = 1.5")
        .expect_err("must fail");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn negative_token_rate_rejected() {
    let err = GlobalConfig::from_toml_str("[cost]\nper_token_rate = -0.5")
        .expect_err("must fail");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn zero_timeout_rejected() {
    let err = GlobalConfig::from_toml_str("[timeouts]\ncheckpoint_seconds = 0")
        .expect_err("must fail");
    assert!(matches!(err, AppError::Config(_)));
}
