//! Status projection types.

use crate::session::SessionId;
use crate::step::StepName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether a step's checkpoint exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    /// No checkpoint yet. Covers both "running" and "not started".
    Pending,
    /// The step's checkpoint exists.
    Completed,
}

/// Coarse lifecycle of a session as seen from its checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// No pipeline checkpoint exists yet (also reported for unknown ids).
    NotStarted,
    /// At least one step finished, the run has not ended.
    Running,
    /// The terminal checkpoint exists.
    Completed,
    /// An error checkpoint exists.
    Failed,
}

/// Snapshot of a session's progress, recomputed from checkpoints on every
/// read and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStatus {
    /// The session the snapshot describes.
    pub session_id: SessionId,
    /// Derived lifecycle state.
    pub state: RunState,
    /// Number of leading pipeline steps that are complete.
    pub current_step_index: usize,
    /// Number of steps in the pipeline.
    pub total_steps: usize,
    /// Per-step completion, keyed by step name.
    pub step_states: BTreeMap<StepName, StepState>,
    /// Weighted progress of the completed prefix (0..=100).
    pub progress_percentage: u8,
    /// Error recorded by a failed run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When this snapshot was computed.
    pub last_update: DateTime<Utc>,
}

impl WorkflowStatus {
    /// Returns `true` once the run has completed or failed.
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, RunState::Completed | RunState::Failed)
    }

    /// Returns the state of a single step, if the pipeline has it.
    pub fn step_state(&self, name: &str) -> Option<StepState> {
        self.step_states.get(name).copied()
    }
}
