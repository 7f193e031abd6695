//! Artifact model — the persisted output of one completed step.

use serde::{Deserialize, Serialize};

/// A source reference attached to an artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub struct Citation {
    /// Citation title.
    pub title: String,
    /// Source registry or database the citation came from.
    pub source: String,
    /// Optional resolvable URL.
    pub url: Option<String>,
}

/// Result of one step execution. Appended to the mission's artifact list
/// and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Artifact {
    /// Step that produced this artifact.
    pub step_id: String,
    /// Delegate summary text.
    pub summary: String,
    /// Source citations gathered during the step.
    pub citations: Vec<Citation>,
    /// Cost attributed to the step.
    pub cost: f64,
    /// Tools invoked by the delegate while producing the artifact.
    pub tools_used: Vec<String>,
}
