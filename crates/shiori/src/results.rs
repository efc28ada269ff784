//! Read access to stored step artifacts.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shiori_core::{
    Category, CheckpointKey, CheckpointStore, SessionId, StepName, StepPipeline, WorkflowError,
    COMPLETED_STEP, ERROR_STEP,
};
use std::sync::Arc;

/// One stored artifact of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Category the artifact is stored under.
    pub category: Category,
    /// Step that produced it.
    pub step_name: StepName,
}

/// Which of a pipeline's artifacts exist for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsSummary {
    /// The session described.
    pub session_id: SessionId,
    /// Artifacts present, in pipeline order.
    pub available: Vec<ArtifactRef>,
    /// The terminal checkpoint exists.
    pub completed: bool,
    /// An error checkpoint exists.
    pub failed: bool,
}

/// Thin read layer over the checkpoint store.
#[derive(Debug, Clone)]
pub struct ResultsRetriever {
    store: Arc<dyn CheckpointStore>,
}

impl ResultsRetriever {
    /// Creates a retriever reading through `store`.
    pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
        Self { store }
    }

    /// Returns the payload stored for `artifact` in `category`.
    ///
    /// A missing checkpoint is [`WorkflowError::NotFound`], which callers
    /// should read as "not finished yet" rather than a failure.
    pub async fn get_result(
        &self,
        session_id: &SessionId,
        category: &Category,
        artifact: &StepName,
    ) -> Result<Value, WorkflowError> {
        let key = CheckpointKey::new(category.clone(), session_id.clone(), artifact.clone());
        Ok(self.store.get(&key).await?.payload)
    }

    /// Lists which of `pipeline`'s artifacts exist for the session.
    pub async fn summary(
        &self,
        session_id: &SessionId,
        pipeline: &StepPipeline,
    ) -> Result<ResultsSummary, WorkflowError> {
        let mut available = Vec::new();
        for step in pipeline.steps() {
            let key = CheckpointKey::new(
                step.category.clone(),
                session_id.clone(),
                step.name.clone(),
            );
            if self.store.exists(&key).await? {
                available.push(ArtifactRef {
                    category: step.category.clone(),
                    step_name: step.name.clone(),
                });
            }
        }

        let lifecycle = self
            .store
            .list_step_names(&Category::workflow(), session_id)
            .await?;

        Ok(ResultsSummary {
            session_id: session_id.clone(),
            available,
            completed: lifecycle.contains(COMPLETED_STEP),
            failed: lifecycle.contains(ERROR_STEP),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCheckpointStore;
    use serde_json::json;
    use shiori_core::step_fn;

    #[tokio::test]
    async fn test_missing_result_is_not_found() {
        let retriever = ResultsRetriever::new(Arc::new(MemoryCheckpointStore::new()));
        let error = retriever
            .get_result(
                &SessionId::generate(),
                &Category::workflow(),
                &StepName::new("synthesis"),
            )
            .await
            .unwrap_err();
        assert!(error.is_not_found());
        assert!(!error.is_storage());
    }

    #[tokio::test]
    async fn test_summary_lists_present_artifacts() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let pipeline = StepPipeline::builder()
            .step("collection", 50, step_fn(|_session| async { Ok(json!({})) }))
            .step_in(
                "artifacts",
                "synthesis",
                50,
                step_fn(|_session| async { Ok(json!({})) }),
            )
            .build()
            .expect("valid pipeline");
        let id = SessionId::generate();
        let key = CheckpointKey::new("artifacts".into(), id.clone(), "synthesis".into());
        store.put(&key, json!({ "insights": [] })).await.expect("put");

        let retriever = ResultsRetriever::new(store);
        let summary = retriever.summary(&id, &pipeline).await.expect("summary");
        assert_eq!(
            summary.available,
            vec![ArtifactRef {
                category: Category::new("artifacts"),
                step_name: StepName::new("synthesis"),
            }]
        );
        assert!(!summary.completed);
        assert!(!summary.failed);

        let payload = retriever
            .get_result(&id, &Category::new("artifacts"), &StepName::new("synthesis"))
            .await
            .expect("result");
        assert_eq!(payload, json!({ "insights": [] }));
    }
}
