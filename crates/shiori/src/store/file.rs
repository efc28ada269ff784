//! Filesystem checkpoint store.

use async_trait::async_trait;
use serde_json::Value;
use shiori_core::{
    Category, CheckpointKey, CheckpointStore, SessionId, StepCheckpoint, StepName, StorageError,
    WorkflowError,
};
use std::collections::HashSet;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const EXTENSION: &str = "json";

/// Stores each checkpoint as one JSON file at
/// `<root>/<category>/<session_id>/<step_name>.json`.
///
/// Writes go to a uniquely named temp file in the same directory and are
/// renamed into place, so readers see either the old document or the new
/// one. The session directory is created by the first write.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    root: PathBuf,
}

impl FileCheckpointStore {
    /// Creates a store rooted at `root`. Nothing is touched on disk until
    /// the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn session_dir(&self, category: &Category, session_id: &SessionId) -> PathBuf {
        self.root.join(category.as_str()).join(session_id.as_str())
    }

    fn path_for(&self, key: &CheckpointKey) -> PathBuf {
        self.session_dir(&key.category, &key.session_id)
            .join(format!("{}.{EXTENSION}", key.step_name))
    }
}

/// Writes `data` to `path` through a temp file and an atomic rename.
async fn atomic_write(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    atomic_write_with(path, data, |from, to| async move {
        tokio::fs::rename(from, to).await
    })
    .await
}

/// Like [`atomic_write`], with `commit` moving the synced temp file into
/// place. On any failure the temp file is removed and `path` is untouched.
async fn atomic_write_with<F, Fut>(path: &Path, data: &[u8], commit: F) -> Result<(), StorageError>
where
    F: FnOnce(PathBuf, PathBuf) -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("checkpoint");
    let temp_path = path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

    let written = async {
        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        commit(temp_path.clone(), path.to_path_buf()).await
    }
    .await;

    if let Err(source) = written {
        if let Err(e) = tokio::fs::remove_file(&temp_path).await {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %temp_path.display(), error = %e, "Failed to remove temp file");
            }
        }
        return Err(StorageError::io(path, source));
    }

    if let Some(parent) = path.parent() {
        sync_dir(parent)
            .await
            .map_err(|e| StorageError::io(parent, e))?;
    }
    Ok(())
}

/// Flushes a directory entry so a completed rename survives a crash.
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    tokio::fs::File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn put(&self, key: &CheckpointKey, payload: Value) -> Result<(), WorkflowError> {
        key.validate()?;
        let dir = self.session_dir(&key.category, &key.session_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::io(&dir, e))?;

        let checkpoint = StepCheckpoint::new(key.clone(), payload);
        let data = serde_json::to_vec_pretty(&checkpoint).map_err(StorageError::from)?;
        let path = self.path_for(key);
        atomic_write(&path, &data).await?;

        debug!(checkpoint = %key, path = %path.display(), "Checkpoint written");
        Ok(())
    }

    async fn get(&self, key: &CheckpointKey) -> Result<StepCheckpoint, WorkflowError> {
        key.validate()?;
        let path = self.path_for(key);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(WorkflowError::NotFound(key.clone()))
            }
            Err(e) => return Err(StorageError::io(&path, e).into()),
        };
        serde_json::from_slice(&data)
            .map_err(|source| StorageError::Corrupt { path, source }.into())
    }

    async fn exists(&self, key: &CheckpointKey) -> Result<bool, WorkflowError> {
        key.validate()?;
        let path = self.path_for(key);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StorageError::io(&path, e).into())
    }

    async fn list_step_names(
        &self,
        category: &Category,
        session_id: &SessionId,
    ) -> Result<HashSet<StepName>, WorkflowError> {
        category.validate()?;
        session_id.validate()?;
        let dir = self.session_dir(category, session_id);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(StorageError::io(&dir, e).into()),
        };

        let mut names = HashSet::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                // Temp files start with '.', which step names never do.
                if !stem.starts_with('.') {
                    names.insert(StepName::new(stem));
                }
            }
        }
        Ok(names)
    }
}
