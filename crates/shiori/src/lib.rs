//! A session-scoped asynchronous workflow runner with durable checkpoints.
//!
//! A caller starts a session; its pipeline runs in the background and a
//! checkpoint is written after every step. Status is reconstructed on
//! demand from the checkpoints that exist, so the read path holds no
//! shared state with the executor and survives restarts of the writer.
//!
//! # Example
//!
//! ```rust,no_run
//! use shiori::prelude::*;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), WorkflowError> {
//!     let pipeline = StepPipeline::builder()
//!         .step("collect", 50, step_fn(|_session| async { Ok(json!({ "x": 1 })) }))
//!         .step("report", 50, step_fn(|_session| async { Ok(json!({ "y": 2 })) }))
//!         .build()?;
//!
//!     let store = Arc::new(FileCheckpointStore::new("analyses_data"));
//!     let service = WorkflowService::new(store, pipeline, ServiceConfig::default());
//!
//!     let (ack, handle) = service.start_with_handle("sample", json!({})).await?;
//!     handle.wait().await;
//!
//!     let status = service.status(ack.session_id.as_str()).await?;
//!     assert_eq!(status.progress_percentage, 100);
//!     Ok(())
//! }
//! ```
//!
//! # Limitations
//!
//! Runs cannot be cancelled and steps have no timeout; a hung step stalls
//! its session indefinitely. Concurrency is unbounded unless
//! [`ExecutorConfig::max_concurrent_runs`] is set.

mod executor;
mod projector;
mod registry;
mod results;
mod service;
pub mod store;

// Re-export core types
pub use shiori_core::*;

pub use executor::{ExecutorConfig, RunHandle, RunOutcome, WorkflowExecutor};
pub use projector::StatusProjector;
pub use registry::SessionRegistry;
pub use results::{ArtifactRef, ResultsRetriever, ResultsSummary};
pub use service::{ServiceConfig, StartAcknowledgement, WorkflowService};
pub use store::{FileCheckpointStore, MemoryCheckpointStore};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        step_fn, Category, CheckpointKey, CheckpointStore, ExecutorConfig, FileCheckpointStore,
        MemoryCheckpointStore, RunOutcome, RunState, ServiceConfig, Session, SessionId, Step,
        StepName, StepPipeline, StepState, WorkflowError, WorkflowService, WorkflowStatus,
    };
}
