//! Background execution of a pipeline for one session.

use chrono::Utc;
use serde_json::json;
use shiori_core::{
    Category, CheckpointKey, CheckpointStore, Session, SessionId, StepName, StepPipeline,
    COMPLETED_STEP,
};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Executor settings.
#[derive(Debug, Clone, Default)]
pub struct ExecutorConfig {
    /// Upper bound on runs executing at once. Runs beyond the bound wait
    /// for a slot inside their own task, in arrival order. `None` leaves
    /// concurrency unbounded.
    pub max_concurrent_runs: Option<usize>,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every step and the terminal checkpoint were written.
    Completed,
    /// The run halted at `step_name`.
    Failed {
        /// The step that failed.
        step_name: StepName,
        /// Description recorded in the error checkpoint.
        details: String,
    },
}

impl RunOutcome {
    /// Returns `true` for [`RunOutcome::Completed`].
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Handle to a spawned run.
///
/// Dropping the handle detaches the run; it keeps going in the background
/// and its progress stays observable through checkpoints.
#[derive(Debug)]
pub struct RunHandle {
    session_id: SessionId,
    handle: JoinHandle<RunOutcome>,
}

impl RunHandle {
    /// The session being run.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Returns `true` once the run has ended.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the run to end. Returns `None` if the task was torn down
    /// before producing an outcome.
    pub async fn wait(self) -> Option<RunOutcome> {
        match self.handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "Run task ended abnormally");
                None
            }
        }
    }
}

/// Drives a [`StepPipeline`] to completion for one session at a time,
/// writing a checkpoint after every step.
///
/// Steps run strictly in pipeline order. The first failure writes a single
/// `error` checkpoint in the `workflow` category and halts the run: no
/// retry, no rollback, no skipping ahead. After the last step a terminal
/// `completed` checkpoint is written.
#[derive(Clone)]
pub struct WorkflowExecutor {
    store: Arc<dyn CheckpointStore>,
    pipeline: Arc<StepPipeline>,
    admission: Option<Arc<Semaphore>>,
}

impl fmt::Debug for WorkflowExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowExecutor")
            .field("pipeline", &self.pipeline)
            .field(
                "available_slots",
                &self.admission.as_ref().map(|s| s.available_permits()),
            )
            .finish()
    }
}

impl WorkflowExecutor {
    /// Creates an executor for `pipeline`, writing through `store`.
    pub fn new(
        store: Arc<dyn CheckpointStore>,
        pipeline: Arc<StepPipeline>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            store,
            pipeline,
            admission: config
                .max_concurrent_runs
                .map(|n| Arc::new(Semaphore::new(n.max(1)))),
        }
    }

    /// The pipeline this executor runs.
    pub fn pipeline(&self) -> &Arc<StepPipeline> {
        &self.pipeline
    }

    /// Schedules a run on the tokio runtime and returns immediately,
    /// before any step executes.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(&self, session: Session) -> RunHandle {
        let executor = self.clone();
        let session_id = session.session_id.clone();
        let span = info_span!("workflow_run", session_id = %session_id);

        let handle = tokio::spawn(
            async move {
                let _slot = executor.admit().await;
                executor.run(&session).await
            }
            .instrument(span),
        );

        RunHandle { session_id, handle }
    }

    async fn admit(&self) -> Option<OwnedSemaphorePermit> {
        let semaphore = self.admission.as_ref()?;
        if semaphore.available_permits() == 0 {
            info!("Run queued, waiting for a free slot");
        }
        Arc::clone(semaphore).acquire_owned().await.ok()
    }

    /// Executes the pipeline inline for `session`.
    ///
    /// Step failures never escape: they are recorded as the `error`
    /// checkpoint and reported in the returned outcome.
    pub async fn run(&self, session: &Session) -> RunOutcome {
        let session_id = &session.session_id;
        info!(session_id = %session_id, steps = self.pipeline.len(), "Workflow run started");

        for (index, step) in self.pipeline.steps().iter().enumerate() {
            debug!(session_id = %session_id, step = %step.name, index, "Executing step");

            // Run the action in its own task so a panic is contained to it.
            let action = Arc::clone(&step.action);
            let owned = session.clone();
            let result = tokio::spawn(async move { action.execute(&owned).await }).await;

            let payload = match result {
                Ok(Ok(payload)) => payload,
                Ok(Err(e)) => {
                    return self
                        .fail(session_id, &step.category, &step.name, e.to_string())
                        .await
                }
                Err(e) => {
                    return self
                        .fail(
                            session_id,
                            &step.category,
                            &step.name,
                            format!("step task aborted: {e}"),
                        )
                        .await
                }
            };

            let key = CheckpointKey::new(
                step.category.clone(),
                session_id.clone(),
                step.name.clone(),
            );
            if let Err(e) = self.store.put(&key, payload).await {
                return self
                    .fail(
                        session_id,
                        &step.category,
                        &step.name,
                        format!("failed to record checkpoint: {e}"),
                    )
                    .await;
            }
            info!(
                session_id = %session_id,
                step = %step.name,
                progress = self.pipeline.progress_percentage(index + 1),
                "Step completed"
            );
        }

        let completion = json!({
            "session_id": session_id,
            "status": "completed",
            "timestamp": Utc::now(),
        });
        if let Err(e) = self
            .store
            .put(&CheckpointKey::completed(session_id.clone()), completion)
            .await
        {
            return self
                .fail(
                    session_id,
                    &Category::workflow(),
                    &StepName::new(COMPLETED_STEP),
                    format!("failed to record completion: {e}"),
                )
                .await;
        }

        info!(session_id = %session_id, "Workflow run completed");
        RunOutcome::Completed
    }

    async fn fail(
        &self,
        session_id: &SessionId,
        category: &Category,
        step_name: &StepName,
        details: String,
    ) -> RunOutcome {
        warn!(session_id = %session_id, step = %step_name, error = %details, "Step failed, halting run");

        let record = json!({
            "session_id": session_id,
            "step_name": step_name,
            "category": category,
            "error": details,
            "timestamp": Utc::now(),
        });
        if let Err(e) = self
            .store
            .put(&CheckpointKey::error(session_id.clone()), record)
            .await
        {
            error!(
                session_id = %session_id,
                step = %step_name,
                error = %e,
                "Failed to record error checkpoint, failure is lost"
            );
        }

        RunOutcome::Failed {
            step_name: step_name.clone(),
            details,
        }
    }
}
