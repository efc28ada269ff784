//! Session identity and metadata.

use crate::error::WorkflowError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Opaque unique identifier of one workflow run.
///
/// Generated ids look like `session_1718000000000_9f2c01ab`: the creation
/// time in milliseconds followed by a random 32-bit suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a new id.
    pub fn generate() -> Self {
        Self(format!(
            "session_{}_{:08x}",
            Utc::now().timestamp_millis(),
            rand::random::<u32>()
        ))
    }

    /// Parses an id received from a caller.
    ///
    /// Ids are used as storage key components, so anything outside
    /// `[A-Za-z0-9_.-]` is rejected.
    pub fn parse(id: &str) -> Result<Self, WorkflowError> {
        crate::checkpoint::validate_component("session id", id)?;
        Ok(Self(id.to_string()))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks that the id is usable as a storage key component.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        crate::checkpoint::validate_component("session id", &self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One logical run of a pipeline. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique id.
    pub session_id: SessionId,
    /// Caller-supplied subject of the run. Never empty.
    pub segment: String,
    /// Caller-supplied opaque document.
    pub context: Value,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session with a fresh id.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Validation`] when `segment` is empty or
    /// whitespace only.
    pub fn new(segment: &str, context: Value) -> Result<Self, WorkflowError> {
        let segment = segment.trim();
        if segment.is_empty() {
            return Err(WorkflowError::Validation("segment required".to_string()));
        }
        Ok(Self {
            session_id: SessionId::generate(),
            segment: segment.to_string(),
            context,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_generated_ids_are_unique() {
        let ids: HashSet<SessionId> = (0..1_000).map(|_| SessionId::generate()).collect();
        assert_eq!(ids.len(), 1_000);
    }

    #[test]
    fn test_generated_id_shape() {
        let id = SessionId::generate();
        let parts: Vec<&str> = id.as_str().split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "session");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 8);
        assert!(id.validate().is_ok());
    }

    #[test]
    fn test_session_requires_segment() {
        assert!(matches!(
            Session::new("", json!({})),
            Err(WorkflowError::Validation(msg)) if msg == "segment required"
        ));
        assert!(Session::new("   \t", json!({})).is_err());
    }

    #[test]
    fn test_session_trims_segment() {
        let session = Session::new("  retail  ", json!({ "region": "south" })).expect("valid");
        assert_eq!(session.segment, "retail");
        assert_eq!(session.context["region"], "south");
    }

    #[test]
    fn test_parse_rejects_path_components() {
        assert!(SessionId::parse("session_1_ab").is_ok());
        assert!(SessionId::parse("../other").is_err());
        assert!(SessionId::parse("a/b").is_err());
        assert!(SessionId::parse("").is_err());
    }
}
