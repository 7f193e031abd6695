//! Mission repository for `SQLite` persistence.
//!
//! `save_state` applies merge semantics: only the fields present in the
//! patch are written, never a destructive overwrite of the rest of the
//! row.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::QueryBuilder;

use crate::models::artifact::Artifact;
use crate::models::mission::{Mission, MissionMode, MissionStatus};
use crate::models::step::Step;
use crate::{AppError, Result};

use super::db::Database;

/// Repository wrapper around `SQLite` for mission records.
#[derive(Clone)]
pub struct MissionRepo {
    db: Arc<Database>,
}

/// Partial mission update. Unset fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct MissionPatch {
    /// New lifecycle status.
    pub status: Option<MissionStatus>,
    /// Finalized plan.
    pub plan: Option<Vec<Step>>,
    /// Index of the next unexecuted step.
    pub current_step: Option<u32>,
    /// Accumulated spend.
    pub current_cost: Option<f64>,
    /// Updated soft ceiling (budget extension).
    pub budget_limit: Option<f64>,
    /// Budget checkpoint latch.
    pub budget_checkpoint_issued: Option<bool>,
    /// Outstanding checkpoint reference; `Some(None)` clears it.
    pub checkpoint_id: Option<Option<String>>,
    /// Full artifact list (append-only by convention).
    pub artifacts: Option<Vec<Artifact>>,
    /// Terminal failure reason.
    pub failure_reason: Option<String>,
    /// Terminal timestamp.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct MissionRow {
    id: String,
    tenant_id: String,
    mode: i64,
    goal: String,
    template_id: Option<String>,
    expert_id: Option<String>,
    status: String,
    plan: String,
    current_step: i64,
    budget_limit: f64,
    current_cost: f64,
    budget_checkpoint_issued: bool,
    checkpoint_id: Option<String>,
    artifacts: String,
    failure_reason: Option<String>,
    started_at: String,
    completed_at: Option<String>,
}

impl MissionRow {
    /// Convert a database row into the domain model.
    fn into_mission(self) -> Result<Mission> {
        let mode = u8::try_from(self.mode)
            .ok()
            .and_then(MissionMode::from_wire)
            .ok_or_else(|| AppError::Db(format!("invalid mission mode: {}", self.mode)))?;
        let status = parse_mission_status(&self.status)?;
        let plan: Vec<Step> = serde_json::from_str(&self.plan)
            .map_err(|err| AppError::Db(format!("invalid plan column: {err}")))?;
        let artifacts: Vec<Artifact> = serde_json::from_str(&self.artifacts)
            .map_err(|err| AppError::Db(format!("invalid artifacts column: {err}")))?;
        let started_at = parse_timestamp(&self.started_at, "started_at")?;
        let completed_at = self
            .completed_at
            .as_deref()
            .map(|raw| parse_timestamp(raw, "completed_at"))
            .transpose()?;

        Ok(Mission {
            id: self.id,
            tenant_id: self.tenant_id,
            mode,
            goal: self.goal,
            template_id: self.template_id,
            expert_id: self.expert_id,
            status,
            plan,
            current_step: u32::try_from(self.current_step).unwrap_or(0),
            budget_limit: self.budget_limit,
            current_cost: self.current_cost,
            budget_checkpoint_issued: self.budget_checkpoint_issued,
            checkpoint_id: self.checkpoint_id,
            artifacts,
            failure_reason: self.failure_reason,
            started_at,
            completed_at,
        })
    }
}

fn parse_timestamp(raw: &str, field: &str) -> Result<DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| AppError::Db(format!("invalid {field}: {err}")))
}

fn parse_mission_status(raw: &str) -> Result<MissionStatus> {
    match raw {
        "pending" => Ok(MissionStatus::Pending),
        "planning" => Ok(MissionStatus::Planning),
        "running" => Ok(MissionStatus::Running),
        "awaiting_checkpoint" => Ok(MissionStatus::AwaitingCheckpoint),
        "completed" => Ok(MissionStatus::Completed),
        "failed" => Ok(MissionStatus::Failed),
        "cancelled" => Ok(MissionStatus::Cancelled),
        other => Err(AppError::Db(format!("invalid mission status: {other}"))),
    }
}

fn mission_status_str(status: MissionStatus) -> &'static str {
    match status {
        MissionStatus::Pending => "pending",
        MissionStatus::Planning => "planning",
        MissionStatus::Running => "running",
        MissionStatus::AwaitingCheckpoint => "awaiting_checkpoint",
        MissionStatus::Completed => "completed",
        MissionStatus::Failed => "failed",
        MissionStatus::Cancelled => "cancelled",
    }
}

fn to_json_column<T: serde::Serialize>(value: &T, field: &str) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|err| AppError::Db(format!("failed to serialize {field}: {err}")))
}

impl MissionRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new mission record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn create(&self, mission: &Mission) -> Result<Mission> {
        let plan = to_json_column(&mission.plan, "plan")?;
        let artifacts = to_json_column(&mission.artifacts, "artifacts")?;

        sqlx::query(
            "INSERT INTO mission (id, tenant_id, mode, goal, template_id, expert_id, status,
             plan, current_step, budget_limit, current_cost, budget_checkpoint_issued,
             checkpoint_id, artifacts, failure_reason, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        )
        .bind(&mission.id)
        .bind(&mission.tenant_id)
        .bind(i64::from(mission.mode.wire_value()))
        .bind(&mission.goal)
        .bind(&mission.template_id)
        .bind(&mission.expert_id)
        .bind(mission_status_str(mission.status))
        .bind(&plan)
        .bind(i64::from(mission.current_step))
        .bind(mission.budget_limit)
        .bind(mission.current_cost)
        .bind(mission.budget_checkpoint_issued)
        .bind(&mission.checkpoint_id)
        .bind(&artifacts)
        .bind(&mission.failure_reason)
        .bind(mission.started_at.to_rfc3339())
        .bind(mission.completed_at.map(|dt| dt.to_rfc3339()))
        .execute(self.db.as_ref())
        .await?;

        Ok(mission.clone())
    }

    /// Retrieve a mission by identifier.
    ///
    /// Returns `Ok(None)` if the mission does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_state(&self, mission_id: &str) -> Result<Option<Mission>> {
        let row: Option<MissionRow> = sqlx::query_as("SELECT * FROM mission WHERE id = ?1")
            .bind(mission_id)
            .fetch_optional(self.db.as_ref())
            .await?;

        row.map(MissionRow::into_mission).transpose()
    }

    /// List missions left in a non-terminal status, oldest first.
    ///
    /// Used by startup recovery: a prior process crash strands missions
    /// in `planning`, `running`, or `awaiting_checkpoint`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_unfinished(&self) -> Result<Vec<Mission>> {
        let rows: Vec<MissionRow> = sqlx::query_as(
            "SELECT * FROM mission
             WHERE status IN ('planning', 'running', 'awaiting_checkpoint')
             ORDER BY started_at ASC",
        )
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(MissionRow::into_mission).collect()
    }

    /// Apply a partial update to a mission record.
    ///
    /// Only the fields set on the patch are written. A patch with no
    /// fields set is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the mission does not exist, or
    /// `AppError::Db` if the update fails.
    pub async fn save_state(&self, mission_id: &str, patch: MissionPatch) -> Result<()> {
        let plan = patch
            .plan
            .as_ref()
            .map(|p| to_json_column(p, "plan"))
            .transpose()?;
        let artifacts = patch
            .artifacts
            .as_ref()
            .map(|a| to_json_column(a, "artifacts"))
            .transpose()?;

        let mut builder = QueryBuilder::new("UPDATE mission SET ");
        let mut fields = builder.separated(", ");
        let mut dirty = false;

        if let Some(status) = patch.status {
            fields
                .push("status = ")
                .push_bind_unseparated(mission_status_str(status));
            dirty = true;
        }
        if let Some(plan_json) = plan {
            fields.push("plan = ").push_bind_unseparated(plan_json);
            dirty = true;
        }
        if let Some(step) = patch.current_step {
            fields
                .push("current_step = ")
                .push_bind_unseparated(i64::from(step));
            dirty = true;
        }
        if let Some(cost) = patch.current_cost {
            fields.push("current_cost = ").push_bind_unseparated(cost);
            dirty = true;
        }
        if let Some(limit) = patch.budget_limit {
            fields.push("budget_limit = ").push_bind_unseparated(limit);
            dirty = true;
        }
        if let Some(issued) = patch.budget_checkpoint_issued {
            fields
                .push("budget_checkpoint_issued = ")
                .push_bind_unseparated(issued);
            dirty = true;
        }
        if let Some(checkpoint_id) = patch.checkpoint_id {
            fields
                .push("checkpoint_id = ")
                .push_bind_unseparated(checkpoint_id);
            dirty = true;
        }
        if let Some(artifacts_json) = artifacts {
            fields
                .push("artifacts = ")
                .push_bind_unseparated(artifacts_json);
            dirty = true;
        }
        if let Some(reason) = patch.failure_reason {
            fields.push("failure_reason = ").push_bind_unseparated(reason);
            dirty = true;
        }
        if let Some(completed_at) = patch.completed_at {
            fields
                .push("completed_at = ")
                .push_bind_unseparated(completed_at.to_rfc3339());
            dirty = true;
        }

        if !dirty {
            return Ok(());
        }

        builder.push(" WHERE id = ").push_bind(mission_id);
        let result = builder.build().execute(self.db.as_ref()).await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "mission {mission_id} not found"
            )));
        }

        Ok(())
    }
}
