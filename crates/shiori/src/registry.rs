//! Session creation and lookup.

use serde_json::Value;
use shiori_core::{CheckpointKey, CheckpointStore, Session, SessionId, StorageError, WorkflowError};
use std::sync::Arc;
use tracing::info;

/// Creates sessions and records each one as its `initiated` checkpoint.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    store: Arc<dyn CheckpointStore>,
}

impl SessionRegistry {
    /// Creates a registry writing through `store`.
    pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
        Self { store }
    }

    /// Creates and durably records a new session.
    ///
    /// # Errors
    ///
    /// - [`WorkflowError::Validation`] if `segment` is empty or whitespace;
    ///   nothing is written in that case.
    /// - [`WorkflowError::Storage`] if the `initiated` checkpoint cannot be
    ///   written.
    pub async fn create(&self, segment: &str, context: Value) -> Result<Session, WorkflowError> {
        let session = Session::new(segment, context)?;
        let payload = serde_json::to_value(&session).map_err(StorageError::from)?;
        self.store
            .put(&CheckpointKey::initiated(session.session_id.clone()), payload)
            .await?;

        info!(
            session_id = %session.session_id,
            segment = %session.segment,
            "Session created"
        );
        Ok(session)
    }

    /// Reads a session back from its `initiated` checkpoint.
    ///
    /// Returns [`WorkflowError::UnknownSession`] if it was never created.
    pub async fn load(&self, session_id: &SessionId) -> Result<Session, WorkflowError> {
        let checkpoint = match self
            .store
            .get(&CheckpointKey::initiated(session_id.clone()))
            .await
        {
            Ok(checkpoint) => checkpoint,
            Err(WorkflowError::NotFound(_)) => {
                return Err(WorkflowError::UnknownSession(session_id.clone()))
            }
            Err(e) => return Err(e),
        };
        serde_json::from_value(checkpoint.payload)
            .map_err(|e| WorkflowError::from(StorageError::from(e)))
    }

    /// Returns `true` if the session was created through a registry
    /// sharing this store.
    pub async fn is_known(&self, session_id: &SessionId) -> Result<bool, WorkflowError> {
        self.store
            .exists(&CheckpointKey::initiated(session_id.clone()))
            .await
    }
}
