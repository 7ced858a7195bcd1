// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! File-backed state store.
//!
//! Layout: `{dir}/{project}/{stack}.json` plus `{stack}.lock` while an
//! operation is running.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{Result, STATE_VERSION, StackState, StateError, StateLock, StateStore};

/// State store writing one JSON file per stack.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    /// Create a store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory of the store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn project_dir(&self, project: &str) -> PathBuf {
        self.dir.join(project)
    }

    /// Path of a stack's snapshot file.
    pub fn state_path(&self, project: &str, stack: &str) -> PathBuf {
        self.project_dir(project).join(format!("{}.json", stack))
    }

    fn lock_path(&self, project: &str, stack: &str) -> PathBuf {
        self.project_dir(project).join(format!("{}.lock", stack))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    fn backend(&self) -> &'static str {
        "file"
    }

    async fn load(&self, project: &str, stack: &str) -> Result<Option<StackState>> {
        let path = self.state_path(project, stack);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let state: StackState = serde_json::from_str(&content)?;
        if state.version > STATE_VERSION {
            return Err(StateError::UnsupportedVersion(state.version));
        }
        Ok(Some(state))
    }

    async fn save(&self, state: &StackState) -> Result<()> {
        let path = self.state_path(&state.project, &state.stack);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write-then-rename so readers never observe a partial snapshot
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(state)?;
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(
            stack = %state.stack,
            resources = state.resources.len(),
            "State checkpoint written"
        );
        Ok(())
    }

    async fn delete(&self, project: &str, stack: &str) -> Result<()> {
        match tokio::fs::remove_file(self.state_path(project, stack)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, project: &str) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(self.project_dir(project)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut stacks = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Some(stem) = path.file_stem()
            {
                stacks.push(stem.to_string_lossy().to_string());
            }
        }
        stacks.sort();
        Ok(stacks)
    }

    async fn lock(&self, project: &str, stack: &str) -> Result<StateLock> {
        tokio::fs::create_dir_all(self.project_dir(project)).await?;
        let path = self.lock_path(project, stack);

        let created = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;

        match created {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StateError::Locked(stack.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        let release_path = path.clone();
        Ok(StateLock::new(move || {
            if let Err(e) = std::fs::remove_file(&release_path) {
                warn!(path = %release_path.display(), error = %e, "Failed to remove stack lock");
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path());

        let mut state = StackState::new("proj", "plane-1");
        state.outputs = serde_json::json!({"vpcId": "vpc-1"});
        store.save(&state).await.unwrap();

        let loaded = store.load("proj", "plane-1").await.unwrap().unwrap();
        assert_eq!(loaded, state);
        assert!(!store.state_path("proj", "plane-1").with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_load_missing_stack() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path());
        assert!(store.load("proj", "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_ignores_lock_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path());
        store.save(&StackState::new("proj", "tier-2")).await.unwrap();
        store.save(&StackState::new("proj", "plane-1")).await.unwrap();
        let _lock = store.lock("proj", "plane-1").await.unwrap();

        assert_eq!(store.list("proj").await.unwrap(), vec!["plane-1", "tier-2"]);
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_and_released_on_drop() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path());

        let lock = store.lock("proj", "plane-1").await.unwrap();
        assert!(matches!(
            store.lock("proj", "plane-1").await,
            Err(StateError::Locked(_))
        ));

        drop(lock);
        assert!(store.lock("proj", "plane-1").await.is_ok());
    }

    #[tokio::test]
    async fn test_rejects_newer_version() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path());
        let mut state = StackState::new("proj", "s");
        state.version = STATE_VERSION + 1;
        store.save(&state).await.unwrap();

        assert!(matches!(
            store.load("proj", "s").await,
            Err(StateError::UnsupportedVersion(_))
        ));
    }
}
