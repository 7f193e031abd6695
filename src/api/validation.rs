//! Request validation for the mission stream endpoint.
//!
//! All validation happens before the SSE response starts, so a rejected
//! request is a plain HTTP 400 rather than an `error` event.

use serde::Deserialize;

use crate::models::mission::MissionMode;
use crate::{AppError, Result};

/// Minimum goal length after trimming.
pub const MIN_GOAL_LEN: usize = 10;
/// Maximum goal length after trimming.
pub const MAX_GOAL_LEN: usize = 5000;
/// Maximum accepted budget limit.
pub const MAX_BUDGET: f64 = 1000.0;
/// Maximum serialized size of the `user_context` object.
pub const MAX_USER_CONTEXT_BYTES: usize = 100 * 1024;

/// Body of `POST /missions/stream`.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamRequest {
    /// Mission goal text.
    pub goal: String,
    /// Numeric execution mode.
    pub mode: u8,
    /// Client-supplied mission identifier; generated when absent.
    #[serde(default)]
    pub mission_id: Option<String>,
    /// Optional content template identifier forwarded to delegates.
    #[serde(default)]
    pub template_id: Option<String>,
    /// Optional expert persona identifier forwarded to delegates.
    #[serde(default)]
    pub expert_id: Option<String>,
    /// Soft budget ceiling; the configured default applies when absent.
    #[serde(default)]
    pub budget_limit: Option<f64>,
    /// Opaque client context; size-limited but otherwise unchecked.
    #[serde(default)]
    pub user_context: Option<serde_json::Value>,
}

/// Validate a stream request and resolve its execution mode.
///
/// # Errors
///
/// Returns `AppError::Validation` naming the first failing field.
pub fn validate_stream_request(req: &StreamRequest) -> Result<MissionMode> {
    // The bounds are defined in characters, not bytes.
    let goal_chars = req.goal.trim().chars().count();
    if goal_chars < MIN_GOAL_LEN {
        return Err(AppError::Validation(format!(
            "goal must be at least {MIN_GOAL_LEN} characters"
        )));
    }
    if goal_chars > MAX_GOAL_LEN {
        return Err(AppError::Validation(format!(
            "goal must be at most {MAX_GOAL_LEN} characters"
        )));
    }

    let mode = MissionMode::from_wire(req.mode)
        .ok_or_else(|| AppError::Validation(format!("unsupported mode: {}", req.mode)))?;

    if let Some(budget) = req.budget_limit {
        if !budget.is_finite() || budget <= 0.0 || budget > MAX_BUDGET {
            return Err(AppError::Validation(format!(
                "budget_limit must be within (0, {MAX_BUDGET}]"
            )));
        }
    }

    if let Some(context) = &req.user_context {
        let size = serde_json::to_string(context)
            .map(|raw| raw.len())
            .unwrap_or(usize::MAX);
        if size > MAX_USER_CONTEXT_BYTES {
            return Err(AppError::Validation(format!(
                "user_context exceeds {MAX_USER_CONTEXT_BYTES} bytes"
            )));
        }
    }

    Ok(mode)
}

/// Extract and validate the required tenant header value.
///
/// # Errors
///
/// Returns `AppError::Validation` when the header is missing or blank.
pub fn require_tenant(value: Option<&str>) -> Result<String> {
    value
        .map(str::trim)
        .filter(|tenant| !tenant.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| AppError::Validation("missing x-tenant-id header".to_owned()))
}
