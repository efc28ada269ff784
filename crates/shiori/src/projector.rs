//! Status projection from existing checkpoints.

use chrono::Utc;
use shiori_core::{
    Category, CheckpointKey, CheckpointStore, RunState, SessionId, StepName, StepPipeline,
    StepState, WorkflowError, WorkflowStatus, COMPLETED_STEP, ERROR_STEP,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::warn;

/// Reconstructs a [`WorkflowStatus`] purely from which checkpoints exist.
///
/// The projector never talks to the executor. A step that is executing
/// has no checkpoint yet, so it reads as `pending` exactly like a step
/// that has not started.
#[derive(Debug, Clone)]
pub struct StatusProjector {
    store: Arc<dyn CheckpointStore>,
}

impl StatusProjector {
    /// Creates a projector reading through `store`.
    pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
        Self { store }
    }

    /// Computes the current status of `session_id` against `pipeline`.
    ///
    /// Progress accumulates weights in pipeline order up to the first
    /// missing checkpoint. `step_states` reports every step whose
    /// checkpoint exists as completed, even past a gap. An `error`
    /// checkpoint populates `error` regardless of other steps.
    ///
    /// Unknown session ids project as a session with every step pending.
    pub async fn project(
        &self,
        session_id: &SessionId,
        pipeline: &StepPipeline,
    ) -> Result<WorkflowStatus, WorkflowError> {
        let workflow = Category::workflow();
        let mut present: HashMap<Category, HashSet<StepName>> = HashMap::new();
        for category in pipeline.categories().into_iter().chain([workflow.clone()]) {
            if !present.contains_key(&category) {
                let names = self.store.list_step_names(&category, session_id).await?;
                present.insert(category, names);
            }
        }
        let exists = |category: &Category, name: &str| {
            present
                .get(category)
                .is_some_and(|names| names.contains(name))
        };

        let mut step_states = BTreeMap::new();
        let mut current_step_index = None;
        for (index, step) in pipeline.steps().iter().enumerate() {
            let completed = exists(&step.category, step.name.as_str());
            if !completed && current_step_index.is_none() {
                current_step_index = Some(index);
            }
            let state = if completed {
                StepState::Completed
            } else {
                StepState::Pending
            };
            step_states.insert(step.name.clone(), state);
        }
        let current_step_index = current_step_index.unwrap_or(pipeline.len());

        let error = if exists(&workflow, ERROR_STEP) {
            Some(self.read_error(session_id).await?)
        } else {
            None
        };

        let state = if error.is_some() {
            RunState::Failed
        } else if exists(&workflow, COMPLETED_STEP) {
            RunState::Completed
        } else if step_states.values().any(|s| *s == StepState::Completed) {
            RunState::Running
        } else {
            RunState::NotStarted
        };

        Ok(WorkflowStatus {
            session_id: session_id.clone(),
            state,
            current_step_index,
            total_steps: pipeline.len(),
            step_states,
            progress_percentage: pipeline.progress_percentage(current_step_index),
            error,
            last_update: Utc::now(),
        })
    }

    async fn read_error(&self, session_id: &SessionId) -> Result<String, WorkflowError> {
        match self.store.get(&CheckpointKey::error(session_id.clone())).await {
            Ok(checkpoint) => Ok(checkpoint
                .payload
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("unknown error")
                .to_string()),
            // Listed a moment ago; a store that lost it still means failure.
            Err(WorkflowError::NotFound(_)) => {
                warn!(session_id = %session_id, "Error checkpoint vanished during projection");
                Ok("unknown error".to_string())
            }
            Err(e) => Err(e),
        }
    }
}
