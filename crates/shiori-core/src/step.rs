//! Step trait and related types.

use crate::error::WorkflowError;
use crate::session::Session;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Debug};
use std::future::Future;

/// Type-safe step name wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepName(String);

impl StepName {
    /// Creates a new StepName.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the step name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks that the name is usable as a storage key component.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        crate::checkpoint::validate_component("step name", &self.0)
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StepName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StepName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for StepName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for StepName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// The action behind one pipeline step.
///
/// A step receives the immutable [`Session`] it runs for and returns an
/// opaque JSON document, which the executor stores as the step's
/// checkpoint. Returning an error halts the session's pipeline.
///
/// # Examples
///
/// ```
/// use shiori_core::{Session, Step, WorkflowError};
/// use async_trait::async_trait;
/// use serde_json::{json, Value};
///
/// #[derive(Debug)]
/// struct CollectStep;
///
/// #[async_trait]
/// impl Step for CollectStep {
///     async fn execute(&self, session: &Session) -> Result<Value, WorkflowError> {
///         Ok(json!({ "segment": session.segment }))
///     }
/// }
/// ```
#[async_trait]
pub trait Step: Send + Sync + Debug {
    /// Executes the step for one session.
    async fn execute(&self, session: &Session) -> Result<Value, WorkflowError>;
}

/// A [`Step`] backed by an async closure. Built with [`step_fn`].
pub struct FnStep<F> {
    f: F,
}

impl<F> Debug for FnStep<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStep").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> Step for FnStep<F>
where
    F: Fn(Session) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, WorkflowError>> + Send + 'static,
{
    async fn execute(&self, session: &Session) -> Result<Value, WorkflowError> {
        (self.f)(session.clone()).await
    }
}

/// Adapts an async closure into a [`Step`].
///
/// ```
/// use shiori_core::step_fn;
/// use serde_json::json;
///
/// let step = step_fn(|_session| async { Ok(json!({ "x": 1 })) });
/// ```
pub fn step_fn<F, Fut>(f: F) -> FnStep<F>
where
    F: Fn(Session) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, WorkflowError>> + Send + 'static,
{
    FnStep { f }
}
