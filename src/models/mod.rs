//! Domain models persisted by the mission store.

pub mod artifact;
pub mod checkpoint;
pub mod mission;
pub mod step;
