//! `SQLite` schema bootstrap logic.
//!
//! All table definitions use `CREATE TABLE IF NOT EXISTS` — safe to
//! re-run on every server startup. Produces a convergent result.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table definitions to the connected `SQLite` database.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS mission (
    id                        TEXT PRIMARY KEY NOT NULL,
    tenant_id                 TEXT NOT NULL,
    mode                      INTEGER NOT NULL CHECK(mode IN (3,4)),
    goal                      TEXT NOT NULL,
    template_id               TEXT,
    expert_id                 TEXT,
    status                    TEXT NOT NULL CHECK(status IN ('pending','planning','running','awaiting_checkpoint','completed','failed','cancelled')),
    plan                      TEXT NOT NULL DEFAULT '[]',
    current_step              INTEGER NOT NULL DEFAULT 0,
    budget_limit              REAL NOT NULL,
    current_cost              REAL NOT NULL DEFAULT 0,
    budget_checkpoint_issued  INTEGER NOT NULL DEFAULT 0,
    checkpoint_id             TEXT,
    artifacts                 TEXT NOT NULL DEFAULT '[]',
    failure_reason            TEXT,
    started_at                TEXT NOT NULL,
    completed_at              TEXT
);

CREATE TABLE IF NOT EXISTS checkpoint (
    id              TEXT PRIMARY KEY NOT NULL,
    mission_id      TEXT NOT NULL,
    kind            TEXT NOT NULL CHECK(kind IN ('budget','quality','final_review')),
    title           TEXT NOT NULL,
    options         TEXT NOT NULL,
    timeout_seconds INTEGER NOT NULL,
    status          TEXT NOT NULL CHECK(status IN ('pending','resolved')),
    resolution      TEXT,
    context         TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_checkpoint_mission ON checkpoint(mission_id, status);
";

    for statement in ddl.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}
