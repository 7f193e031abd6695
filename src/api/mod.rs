//! HTTP surface: the mission stream endpoint, checkpoint responses, and
//! state snapshots.

pub mod routes;
pub mod validation;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::error;

use crate::config::GlobalConfig;
use crate::delegate::router::DelegateRouter;
use crate::orchestrator::bus::ResumeBus;
use crate::persistence::db::Database;
use crate::AppError;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Loaded global configuration.
    pub config: GlobalConfig,
    /// Shared database pool.
    pub db: Arc<Database>,
    /// Resume bus waking paused missions.
    pub bus: ResumeBus,
    /// Tier-keyed delegate dispatch.
    pub router: Arc<DelegateRouter>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) | Self::CheckpointConflict(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "request failed");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
