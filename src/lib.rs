#![forbid(unsafe_code)]

//! `mission-relay` — mission orchestration and streaming core.
//!
//! Turns a high-level goal into an executable plan, drives the plan
//! step-by-step through tiered delegate workers, tracks spend against a
//! soft budget, pauses at human checkpoints, and streams every state
//! change to the client as ordered typed SSE events.

pub mod api;
pub mod config;
pub mod delegate;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod persistence;
pub mod stream;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
