//! Request-level facade tying the components together.

use crate::executor::{ExecutorConfig, RunHandle, WorkflowExecutor};
use crate::projector::StatusProjector;
use crate::registry::SessionRegistry;
use crate::results::{ResultsRetriever, ResultsSummary};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shiori_core::{
    Category, CheckpointStore, SessionId, StepName, StepPipeline, WorkflowError, WorkflowStatus,
};
use std::sync::Arc;
use tracing::info;

/// Service settings.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Human-readable duration hint returned when a run starts.
    pub estimated_duration: String,
    /// Prefix of the status lookup reference; the session id is appended.
    pub status_path_prefix: String,
    /// Answer status and result queries for never-created ids with
    /// [`WorkflowError::UnknownSession`] instead of an all-pending status
    /// or an empty summary.
    pub reject_unknown_sessions: bool,
    /// Executor settings.
    pub executor: ExecutorConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            estimated_duration: "12-25 minutes".to_string(),
            status_path_prefix: "/api/workflow/status/".to_string(),
            reject_unknown_sessions: false,
            executor: ExecutorConfig::default(),
        }
    }
}

/// Returned to the caller as soon as a run is scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartAcknowledgement {
    /// Id of the new session.
    pub session_id: SessionId,
    /// Human-readable acknowledgement.
    pub message: String,
    /// Duration hint.
    pub estimated_duration: String,
    /// Where to poll for status.
    pub status_endpoint: String,
}

/// Starts sessions and answers status and result queries.
///
/// Reads go through the checkpoint store only; they never consult a
/// running executor.
#[derive(Debug, Clone)]
pub struct WorkflowService {
    registry: SessionRegistry,
    executor: WorkflowExecutor,
    projector: StatusProjector,
    results: ResultsRetriever,
    config: ServiceConfig,
}

impl WorkflowService {
    /// Wires a service for `pipeline` over `store`.
    pub fn new(
        store: Arc<dyn CheckpointStore>,
        pipeline: StepPipeline,
        config: ServiceConfig,
    ) -> Self {
        let pipeline = Arc::new(pipeline);
        Self {
            registry: SessionRegistry::new(Arc::clone(&store)),
            executor: WorkflowExecutor::new(
                Arc::clone(&store),
                pipeline,
                config.executor.clone(),
            ),
            projector: StatusProjector::new(Arc::clone(&store)),
            results: ResultsRetriever::new(store),
            config,
        }
    }

    /// The pipeline every session runs.
    pub fn pipeline(&self) -> &StepPipeline {
        self.executor.pipeline()
    }

    /// The session registry.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Creates a session and schedules its run in the background.
    ///
    /// Returns before any step executes. Use [`WorkflowService::start_with_handle`]
    /// to also get the run handle.
    pub async fn start(
        &self,
        segment: &str,
        context: Value,
    ) -> Result<StartAcknowledgement, WorkflowError> {
        self.start_with_handle(segment, context)
            .await
            .map(|(ack, _handle)| ack)
    }

    /// Like [`WorkflowService::start`], also returning the run handle.
    pub async fn start_with_handle(
        &self,
        segment: &str,
        context: Value,
    ) -> Result<(StartAcknowledgement, RunHandle), WorkflowError> {
        let session = self.registry.create(segment, context).await?;
        let session_id = session.session_id.clone();
        let handle = self.executor.spawn(session);
        info!(session_id = %session_id, "Workflow scheduled");

        let ack = StartAcknowledgement {
            status_endpoint: format!("{}{}", self.config.status_path_prefix, session_id),
            session_id,
            message: "Workflow started in the background".to_string(),
            estimated_duration: self.config.estimated_duration.clone(),
        };
        Ok((ack, handle))
    }

    /// Parses `session_id` and, in strict mode, requires that it was created.
    async fn resolve(&self, session_id: &str) -> Result<SessionId, WorkflowError> {
        let session_id = SessionId::parse(session_id)?;
        if self.config.reject_unknown_sessions && !self.registry.is_known(&session_id).await? {
            return Err(WorkflowError::UnknownSession(session_id));
        }
        Ok(session_id)
    }

    /// Projects the status of `session_id`.
    pub async fn status(&self, session_id: &str) -> Result<WorkflowStatus, WorkflowError> {
        let session_id = self.resolve(session_id).await?;
        self.projector.project(&session_id, self.pipeline()).await
    }

    /// Returns one stored artifact.
    pub async fn result(
        &self,
        session_id: &str,
        category: &str,
        artifact: &str,
    ) -> Result<Value, WorkflowError> {
        let category = Category::parse(category)?;
        let artifact = StepName::new(artifact);
        artifact.validate()?;
        let session_id = self.resolve(session_id).await?;
        self.results
            .get_result(&session_id, &category, &artifact)
            .await
    }

    /// Lists which artifacts exist for the session.
    pub async fn results(&self, session_id: &str) -> Result<ResultsSummary, WorkflowError> {
        let session_id = self.resolve(session_id).await?;
        self.results.summary(&session_id, self.pipeline()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCheckpointStore;
    use serde_json::json;
    use shiori_core::step_fn;

    fn service(config: ServiceConfig) -> WorkflowService {
        let pipeline = StepPipeline::builder()
            .step("only", 100, step_fn(|_session| async { Ok(json!({ "ok": true })) }))
            .build()
            .expect("valid pipeline");
        WorkflowService::new(Arc::new(MemoryCheckpointStore::new()), pipeline, config)
    }

    #[tokio::test]
    async fn test_start_acknowledgement() {
        let service = service(ServiceConfig::default());
        let (ack, handle) = service
            .start_with_handle("sample", json!({}))
            .await
            .expect("started");

        assert_eq!(
            ack.status_endpoint,
            format!("/api/workflow/status/{}", ack.session_id)
        );
        assert_eq!(ack.estimated_duration, "12-25 minutes");
        assert!(handle.wait().await.is_some_and(|o| o.is_completed()));
    }

    #[tokio::test]
    async fn test_status_rejects_malformed_id() {
        let service = service(ServiceConfig::default());
        let error = service.status("../../etc").await.unwrap_err();
        assert!(matches!(error, WorkflowError::Validation(_)));
    }

    #[tokio::test]
    async fn test_strict_mode_rejects_unknown_sessions() {
        let service = service(ServiceConfig {
            reject_unknown_sessions: true,
            ..ServiceConfig::default()
        });
        let error = service.status("session_1_deadbeef").await.unwrap_err();
        assert!(matches!(error, WorkflowError::UnknownSession(_)));

        let ack = service.start("sample", json!({})).await.expect("started");
        assert!(service.status(ack.session_id.as_str()).await.is_ok());
    }

    #[tokio::test]
    async fn test_strict_mode_covers_result_reads() {
        let service = service(ServiceConfig {
            reject_unknown_sessions: true,
            ..ServiceConfig::default()
        });
        let error = service.results("session_1_deadbeef").await.unwrap_err();
        assert!(matches!(error, WorkflowError::UnknownSession(_)));
        let error = service
            .result("session_1_deadbeef", "workflow", "only")
            .await
            .unwrap_err();
        assert!(matches!(error, WorkflowError::UnknownSession(_)));

        let (ack, handle) = service
            .start_with_handle("sample", json!({}))
            .await
            .expect("started");
        handle.wait().await;
        let id = ack.session_id.as_str();
        assert!(service.results(id).await.expect("summary").completed);
        assert_eq!(
            service.result(id, "workflow", "only").await.expect("result"),
            json!({ "ok": true })
        );
    }

    #[tokio::test]
    async fn test_permissive_mode_summarizes_unknown_session_as_empty() {
        let service = service(ServiceConfig::default());
        let summary = service.results("session_1_deadbeef").await.expect("summary");
        assert!(summary.available.is_empty());
        assert!(!summary.completed);
    }

    #[tokio::test]
    async fn test_result_validates_inputs() {
        let service = service(ServiceConfig::default());
        let error = service
            .result("session_1_deadbeef", "work/flow", "only")
            .await
            .unwrap_err();
        assert!(matches!(error, WorkflowError::Validation(_)));

        let error = service
            .result("session_1_deadbeef", "workflow", "only")
            .await
            .unwrap_err();
        assert!(error.is_not_found());
    }
}
