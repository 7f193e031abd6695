//! Mission orchestration modules.
//!
//! Covers plan generation, the sequential and dependency-graph
//! executors, checkpoint raise/resolve machinery, cost accounting, and
//! the resume bus that wakes paused missions.

pub mod bus;
pub mod checkpoint_controller;
pub mod cost_tracker;
pub mod engine;
pub mod graph;
pub mod planner;
