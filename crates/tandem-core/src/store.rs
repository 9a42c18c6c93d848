//! State persistence
//!
//! One JSON document per scope (a user, or a user/channel pair). The store
//! trait is async and object-safe so the orchestrator can run against an
//! in-memory map in tests and a file tree in the CLI without changing shape.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{Error, Result};
use crate::state::OrchestratorState;

/// Async persistence for per-scope orchestration state
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the state for a scope; `None` when the scope has no state yet
    async fn load(&self, scope: &str) -> Result<Option<OrchestratorState>>;

    /// Persist the state for a scope, replacing any previous value
    async fn save(&self, scope: &str, state: &OrchestratorState) -> Result<()>;

    /// Remove the stored state for a scope; a missing scope is not an error
    async fn delete(&self, scope: &str) -> Result<()>;
}

/// In-memory store, used by tests and embedders that persist elsewhere
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<String, OrchestratorState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self, scope: &str) -> Result<Option<OrchestratorState>> {
        Ok(self.inner.read().get(scope).cloned())
    }

    async fn save(&self, scope: &str, state: &OrchestratorState) -> Result<()> {
        self.inner.write().insert(scope.to_string(), state.clone());
        Ok(())
    }

    async fn delete(&self, scope: &str) -> Result<()> {
        self.inner.write().remove(scope);
        Ok(())
    }
}

/// File-backed store: one pretty-printed JSON file per scope
///
/// Writes go through a temp file then rename, so a crash mid-write leaves
/// the previous state intact. An unreadable file surfaces as an error rather
/// than silently resetting the scope.
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, scope: &str) -> PathBuf {
        // Scope strings come from callers, not users, but keep filenames tame.
        let safe: String = scope
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join(format!("{}.json", safe))
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self, scope: &str) -> Result<Option<OrchestratorState>> {
        let path = self.path_for(scope);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };
        let state = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Store(format!("{}: {}", path.display(), e)))?;
        debug!(scope, path = %path.display(), "Loaded state");
        Ok(Some(state))
    }

    async fn save(&self, scope: &str, state: &OrchestratorState) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.path_for(scope);
        let tmp = path.with_extension("json.tmp");
        let text = serde_json::to_vec_pretty(state)?;
        tokio::fs::write(&tmp, &text).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(scope, path = %path.display(), "Saved state");
        Ok(())
    }

    async fn delete(&self, scope: &str) -> Result<()> {
        let path = self.path_for(scope);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(scope, path = %path.display(), "Deleted state");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}
