//! Core traits and types for the shiori workflow runner.
//!
//! This crate provides minimal abstractions without runtime dependencies.
//! Library authors should depend on this crate to implement custom steps
//! or checkpoint stores.
//!
//! # Core Types
//!
//! - [`Step`] - The action run for each session at one pipeline position
//! - [`StepPipeline`] - Ordered, weighted step definitions
//! - [`Session`] / [`SessionId`] - One logical run and its identity
//! - [`CheckpointStore`] - Durable `(category, session, step)` records
//! - [`WorkflowStatus`] - Progress projected from existing checkpoints
//! - [`WorkflowError`] - Error types for the runner

mod checkpoint;
mod error;
mod pipeline;
mod session;
mod status;
mod step;
mod store;

pub use checkpoint::{
    Category, CheckpointKey, StepCheckpoint, COMPLETED_STEP, ERROR_STEP, INITIATED_STEP,
    RESERVED_STEPS, WORKFLOW_CATEGORY,
};
pub use error::{StorageError, WorkflowError};
pub use pipeline::{StepDefinition, StepPipeline, StepPipelineBuilder};
pub use session::{Session, SessionId};
pub use status::{RunState, StepState, WorkflowStatus};
pub use step::{step_fn, FnStep, Step, StepName};
pub use store::CheckpointStore;
