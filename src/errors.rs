//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Persistence failure when interacting with `SQLite`.
    Db(String),
    /// Inbound request failed validation before any streaming started.
    Validation(String),
    /// Plan generation failure; recoverable via the generic fallback plan.
    Planning(String),
    /// Delegate invocation raised or violated the stream contract.
    Delegate(String),
    /// A checkpoint expired without a human decision. Carries the
    /// checkpoint kind wire name for the persisted failure reason.
    CheckpointTimeout(String),
    /// Attempt to resolve a checkpoint that is already resolved.
    CheckpointConflict(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::Validation(msg) => write!(f, "validation: {msg}"),
            Self::Planning(msg) => write!(f, "planning: {msg}"),
            Self::Delegate(msg) => write!(f, "delegate: {msg}"),
            Self::CheckpointTimeout(kind) => write!(f, "checkpoint timeout: {kind}"),
            Self::CheckpointConflict(msg) => write!(f, "checkpoint conflict: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
