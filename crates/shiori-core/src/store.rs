//! Durable checkpoint persistence.

use crate::checkpoint::{Category, CheckpointKey, StepCheckpoint};
use crate::error::WorkflowError;
use crate::session::SessionId;
use crate::step::StepName;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt::Debug;

/// Key-value persistence for checkpoints, keyed by
/// `(category, session_id, step_name)`.
///
/// Implementations must make `put` atomic with respect to readers: a
/// concurrent `get` returns either the previous document or the new one,
/// never a partial write. Writing an existing key overwrites it.
///
/// Store failures surface as [`WorkflowError::Storage`]; a missing key on
/// `get` is [`WorkflowError::NotFound`]. Nothing is retried.
#[async_trait]
pub trait CheckpointStore: Send + Sync + Debug {
    /// Writes `payload` under `key`, replacing any previous record.
    async fn put(&self, key: &CheckpointKey, payload: Value) -> Result<(), WorkflowError>;

    /// Reads the record stored under `key`.
    async fn get(&self, key: &CheckpointKey) -> Result<StepCheckpoint, WorkflowError>;

    /// Returns `true` if a record exists under `key`.
    async fn exists(&self, key: &CheckpointKey) -> Result<bool, WorkflowError>;

    /// Returns the step names that currently have a record for the session
    /// in `category`. Order is unspecified.
    async fn list_step_names(
        &self,
        category: &Category,
        session_id: &SessionId,
    ) -> Result<HashSet<StepName>, WorkflowError>;
}
