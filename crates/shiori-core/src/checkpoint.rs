//! Checkpoint keys and records.

use crate::error::WorkflowError;
use crate::session::SessionId;
use crate::step::StepName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Category holding lifecycle records (`initiated`, `completed`, `error`).
pub const WORKFLOW_CATEGORY: &str = "workflow";
/// Checkpoint written when a session is created.
pub const INITIATED_STEP: &str = "initiated";
/// Checkpoint written after the last pipeline step succeeds.
pub const COMPLETED_STEP: &str = "completed";
/// Checkpoint written when a step fails.
pub const ERROR_STEP: &str = "error";

/// Step names pipelines may not use in the workflow category.
pub const RESERVED_STEPS: [&str; 3] = [INITIATED_STEP, COMPLETED_STEP, ERROR_STEP];

/// Checks that `value` can be used as one component of a storage key.
///
/// Accepts ASCII alphanumerics plus `_`, `-` and `.`, with no leading dot.
pub(crate) fn validate_component(kind: &str, value: &str) -> Result<(), WorkflowError> {
    if value.is_empty() {
        return Err(WorkflowError::Validation(format!("{kind} must not be empty")));
    }
    if value.starts_with('.') {
        return Err(WorkflowError::Validation(format!(
            "{kind} must not start with '.': {value:?}"
        )));
    }
    if let Some(c) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(WorkflowError::Validation(format!(
            "{kind} contains invalid character {c:?}: {value:?}"
        )));
    }
    Ok(())
}

/// Namespace a checkpoint belongs to, e.g. `workflow` or an artifact group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    /// Creates a category without validation.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Parses and validates a category received from a caller.
    pub fn parse(name: &str) -> Result<Self, WorkflowError> {
        validate_component("category", name)?;
        Ok(Self(name.to_string()))
    }

    /// The lifecycle category.
    pub fn workflow() -> Self {
        Self::new(WORKFLOW_CATEGORY)
    }

    /// Returns the category as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks that the category is usable as a storage key component.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        validate_component("category", &self.0)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Category {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Category {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Composite key addressing exactly one checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckpointKey {
    /// Namespace of the record.
    pub category: Category,
    /// Owning session.
    pub session_id: SessionId,
    /// Step the record proves finished.
    pub step_name: StepName,
}

impl CheckpointKey {
    /// Creates a key from its three components.
    pub fn new(category: Category, session_id: SessionId, step_name: StepName) -> Self {
        Self {
            category,
            session_id,
            step_name,
        }
    }

    /// Key of the `initiated` lifecycle record.
    pub fn initiated(session_id: SessionId) -> Self {
        Self::lifecycle(session_id, INITIATED_STEP)
    }

    /// Key of the terminal `completed` lifecycle record.
    pub fn completed(session_id: SessionId) -> Self {
        Self::lifecycle(session_id, COMPLETED_STEP)
    }

    /// Key of the `error` lifecycle record.
    pub fn error(session_id: SessionId) -> Self {
        Self::lifecycle(session_id, ERROR_STEP)
    }

    fn lifecycle(session_id: SessionId, step: &str) -> Self {
        Self::new(Category::workflow(), session_id, StepName::new(step))
    }

    /// Validates every component.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        self.category.validate()?;
        self.session_id.validate()?;
        self.step_name.validate()
    }
}

impl fmt::Display for CheckpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.category, self.session_id, self.step_name)
    }
}

/// A durable record proving one step finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepCheckpoint {
    /// Namespace of the record.
    pub category: Category,
    /// Owning session.
    pub session_id: SessionId,
    /// Step the record belongs to.
    pub step_name: StepName,
    /// Opaque document produced by the writer.
    pub payload: Value,
    /// When the record was written.
    pub written_at: DateTime<Utc>,
}

impl StepCheckpoint {
    /// Creates a record for `key`, stamped with the current time.
    pub fn new(key: CheckpointKey, payload: Value) -> Self {
        Self {
            category: key.category,
            session_id: key.session_id,
            step_name: key.step_name,
            payload,
            written_at: Utc::now(),
        }
    }

    /// Returns the key this record is stored under.
    pub fn key(&self) -> CheckpointKey {
        CheckpointKey::new(
            self.category.clone(),
            self.session_id.clone(),
            self.step_name.clone(),
        )
    }
}
