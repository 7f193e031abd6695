//! Checkpoint repository for `SQLite` persistence.
//!
//! Resolution is write-once: `resolve` is guarded by a
//! `status = 'pending'` row predicate, so a second resolution attempt
//! surfaces as `AppError::CheckpointConflict` regardless of interleaving.

use std::sync::Arc;

use chrono::Utc;

use crate::models::checkpoint::{
    Checkpoint, CheckpointKind, CheckpointOption, CheckpointStatus, Resolution,
};
use crate::{AppError, Result};

use super::db::Database;

/// Repository wrapper around `SQLite` for checkpoint records.
#[derive(Clone)]
pub struct CheckpointRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct CheckpointRow {
    id: String,
    mission_id: String,
    kind: String,
    title: String,
    options: String,
    timeout_seconds: i64,
    status: String,
    resolution: Option<String>,
    context: String,
    created_at: String,
}

impl CheckpointRow {
    /// Convert a database row into the domain model.
    fn into_checkpoint(self) -> Result<Checkpoint> {
        let kind = parse_checkpoint_kind(&self.kind)?;
        let status = parse_checkpoint_status(&self.status)?;
        let options: Vec<CheckpointOption> = serde_json::from_str(&self.options)
            .map_err(|err| AppError::Db(format!("invalid options column: {err}")))?;
        let resolution: Option<Resolution> = self
            .resolution
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|err| AppError::Db(format!("invalid resolution column: {err}")))?;
        let context: serde_json::Value = serde_json::from_str(&self.context)
            .map_err(|err| AppError::Db(format!("invalid context column: {err}")))?;
        let created_at = chrono::DateTime::parse_from_rfc3339(&self.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|err| AppError::Db(format!("invalid created_at: {err}")))?;

        Ok(Checkpoint {
            id: self.id,
            mission_id: self.mission_id,
            kind,
            title: self.title,
            options,
            timeout_seconds: u64::try_from(self.timeout_seconds).unwrap_or(0),
            status,
            resolution,
            context,
            created_at,
        })
    }
}

fn parse_checkpoint_kind(raw: &str) -> Result<CheckpointKind> {
    match raw {
        "budget" => Ok(CheckpointKind::Budget),
        "quality" => Ok(CheckpointKind::Quality),
        "final_review" => Ok(CheckpointKind::FinalReview),
        other => Err(AppError::Db(format!("invalid checkpoint kind: {other}"))),
    }
}

fn parse_checkpoint_status(raw: &str) -> Result<CheckpointStatus> {
    match raw {
        "pending" => Ok(CheckpointStatus::Pending),
        "resolved" => Ok(CheckpointStatus::Resolved),
        other => Err(AppError::Db(format!("invalid checkpoint status: {other}"))),
    }
}

fn checkpoint_status_str(status: CheckpointStatus) -> &'static str {
    match status {
        CheckpointStatus::Pending => "pending",
        CheckpointStatus::Resolved => "resolved",
    }
}

impl CheckpointRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new checkpoint record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn create(&self, checkpoint: &Checkpoint) -> Result<Checkpoint> {
        let options = serde_json::to_string(&checkpoint.options)
            .map_err(|err| AppError::Db(format!("failed to serialize options: {err}")))?;
        let context = serde_json::to_string(&checkpoint.context)
            .map_err(|err| AppError::Db(format!("failed to serialize context: {err}")))?;
        let resolution = checkpoint
            .resolution
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|err| AppError::Db(format!("failed to serialize resolution: {err}")))?;

        sqlx::query(
            "INSERT INTO checkpoint (id, mission_id, kind, title, options, timeout_seconds,
             status, resolution, context, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&checkpoint.id)
        .bind(&checkpoint.mission_id)
        .bind(checkpoint.kind.wire_name())
        .bind(&checkpoint.title)
        .bind(&options)
        .bind(i64::try_from(checkpoint.timeout_seconds).unwrap_or(i64::MAX))
        .bind(checkpoint_status_str(checkpoint.status))
        .bind(&resolution)
        .bind(&context)
        .bind(checkpoint.created_at.to_rfc3339())
        .execute(self.db.as_ref())
        .await?;

        Ok(checkpoint.clone())
    }

    /// Retrieve a checkpoint by identifier.
    ///
    /// Returns `Ok(None)` if the checkpoint does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Checkpoint>> {
        let row: Option<CheckpointRow> = sqlx::query_as("SELECT * FROM checkpoint WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;

        row.map(CheckpointRow::into_checkpoint).transpose()
    }

    /// Retrieve the pending checkpoint for a mission, if any.
    ///
    /// At most one can exist at a time by engine construction.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_pending_for_mission(&self, mission_id: &str) -> Result<Option<Checkpoint>> {
        let row: Option<CheckpointRow> = sqlx::query_as(
            "SELECT * FROM checkpoint WHERE mission_id = ?1 AND status = 'pending' LIMIT 1",
        )
        .bind(mission_id)
        .fetch_optional(self.db.as_ref())
        .await?;

        row.map(CheckpointRow::into_checkpoint).transpose()
    }

    /// Record a resolution, rejecting a second attempt.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the checkpoint does not exist,
    /// `AppError::CheckpointConflict` if it is already resolved, or
    /// `AppError::Db` if the update fails.
    pub async fn resolve(&self, id: &str, resolution: &Resolution) -> Result<Checkpoint> {
        let payload = serde_json::to_string(resolution)
            .map_err(|err| AppError::Db(format!("failed to serialize resolution: {err}")))?;

        let result = sqlx::query(
            "UPDATE checkpoint SET status = 'resolved', resolution = ?1
             WHERE id = ?2 AND status = 'pending'",
        )
        .bind(&payload)
        .bind(id)
        .execute(self.db.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish a missing checkpoint from a double resolution.
            return match self.get_by_id(id).await? {
                Some(_) => Err(AppError::CheckpointConflict(format!(
                    "checkpoint {id} already resolved"
                ))),
                None => Err(AppError::NotFound(format!("checkpoint {id} not found"))),
            };
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("checkpoint {id} not found")))
    }
}
