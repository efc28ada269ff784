//! Workflow error types.

use crate::checkpoint::CheckpointKey;
use crate::session::SessionId;
use crate::step::StepName;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the durable checkpoint store.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StorageError {
    /// The underlying filesystem operation failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A document could not be serialized for writing.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored document exists but could not be decoded.
    #[error("Corrupt checkpoint at {}: {source}", path.display())]
    Corrupt {
        /// The path of the unreadable document.
        path: PathBuf,
        /// The decoding error.
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    /// Wraps an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors surfaced by the workflow runner.
///
/// `NotFound` is a normal outcome for result queries issued before the
/// requested step has finished; it is kept distinct from `Storage` so
/// callers can tell "not finished yet" from "storage is broken".
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum WorkflowError {
    /// Caller input was rejected.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A pipeline step's action failed.
    #[error("Step failed: {step_name}, details: {details}")]
    StepExecution {
        /// The name of the step that failed.
        step_name: StepName,
        /// Details about the failure.
        details: String,
    },

    /// No checkpoint exists under the key.
    #[error("Checkpoint not found: {0}")]
    NotFound(CheckpointKey),

    /// The session id was never created by this store.
    #[error("Unknown session: {0}")]
    UnknownSession(SessionId),

    /// The checkpoint store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The pipeline definition is invalid.
    #[error("Invalid pipeline configuration: {0}")]
    Configuration(String),
}

impl WorkflowError {
    /// Builds a [`WorkflowError::StepExecution`] for the given step.
    pub fn step(step_name: impl Into<StepName>, details: impl Into<String>) -> Self {
        Self::StepExecution {
            step_name: step_name.into(),
            details: details.into(),
        }
    }

    /// Returns `true` if this is a missing-checkpoint outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::UnknownSession(_))
    }

    /// Returns `true` if the checkpoint store itself failed.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
