//! In-process checkpoint store.

use async_trait::async_trait;
use serde_json::Value;
use shiori_core::{
    Category, CheckpointKey, CheckpointStore, SessionId, StepCheckpoint, StepName, WorkflowError,
};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

/// Keeps checkpoints in a map guarded by a read-write lock.
///
/// Each write replaces a whole record under the lock, so readers never see
/// partial documents. Contents are lost when the store is dropped.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    records: RwLock<HashMap<CheckpointKey, StepCheckpoint>>,
}

impl MemoryCheckpointStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored checkpoints.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns `true` if nothing has been written.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn put(&self, key: &CheckpointKey, payload: Value) -> Result<(), WorkflowError> {
        key.validate()?;
        let checkpoint = StepCheckpoint::new(key.clone(), payload);
        self.records.write().await.insert(key.clone(), checkpoint);
        Ok(())
    }

    async fn get(&self, key: &CheckpointKey) -> Result<StepCheckpoint, WorkflowError> {
        self.records
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| WorkflowError::NotFound(key.clone()))
    }

    async fn exists(&self, key: &CheckpointKey) -> Result<bool, WorkflowError> {
        Ok(self.records.read().await.contains_key(key))
    }

    async fn list_step_names(
        &self,
        category: &Category,
        session_id: &SessionId,
    ) -> Result<HashSet<StepName>, WorkflowError> {
        Ok(self
            .records
            .read()
            .await
            .keys()
            .filter(|k| &k.category == category && &k.session_id == session_id)
            .map(|k| k.step_name.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_overwrite_keeps_latest_payload() {
        let store = MemoryCheckpointStore::new();
        let key = CheckpointKey::new(
            Category::workflow(),
            SessionId::generate(),
            StepName::new("collection"),
        );

        store.put(&key, json!({ "v": 1 })).await.expect("put");
        store.put(&key, json!({ "v": 2 })).await.expect("put");

        assert_eq!(store.len().await, 1);
        assert_eq!(store.get(&key).await.expect("get").payload, json!({ "v": 2 }));
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_session_and_category() {
        let store = MemoryCheckpointStore::new();
        let a = SessionId::generate();
        let b = SessionId::parse("session_0_other").expect("valid id");
        for (category, session, step) in [
            ("workflow", &a, "one"),
            ("workflow", &a, "two"),
            ("artifacts", &a, "three"),
            ("workflow", &b, "four"),
        ] {
            let key = CheckpointKey::new(
                Category::new(category),
                session.clone(),
                StepName::new(step),
            );
            store.put(&key, json!(null)).await.expect("put");
        }

        let names = store
            .list_step_names(&Category::workflow(), &a)
            .await
            .expect("list");
        let expected: HashSet<StepName> = ["one", "two"].into_iter().map(StepName::new).collect();
        assert_eq!(names, expected);
    }
}
