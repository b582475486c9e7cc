//! Persistence of the queue state across host reloads.

use crate::queue::QueueState;
use buildq_core::{Error, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Durable home of the [`QueueState`].
///
/// The driver loads at the start of every step and saves before every
/// suspension point, so an implementation must return exactly what was last
/// saved, even from a fresh process.
pub trait QueueStore: Send + Sync {
    /// Load the persisted state, `None` when no batch is stored.
    fn load(&self) -> Result<Option<QueueState>>;

    fn save(&self, state: &QueueState) -> Result<()>;

    fn clear(&self) -> Result<()>;
}

/// In-process store for hosts that never reload.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<Option<QueueState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueueStore for MemoryStore {
    fn load(&self) -> Result<Option<QueueState>> {
        let state = self
            .state
            .lock()
            .map_err(|_| Error::Storage("queue state lock poisoned".to_string()))?;
        Ok(state.clone())
    }

    fn save(&self, state: &QueueState) -> Result<()> {
        let mut slot = self
            .state
            .lock()
            .map_err(|_| Error::Storage("queue state lock poisoned".to_string()))?;
        *slot = Some(state.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut slot = self
            .state
            .lock()
            .map_err(|_| Error::Storage("queue state lock poisoned".to_string()))?;
        *slot = None;
        Ok(())
    }
}

/// Store that keeps the state as a JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "queue".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl QueueStore for JsonFileStore {
    fn load(&self) -> Result<Option<QueueState>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let state: QueueState = serde_json::from_str(&content)?;
        Ok(Some(state))
    }

    fn save(&self, state: &QueueState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Write beside the target and rename so readers never see a torn file
        let temp = self.temp_path();
        fs::write(&temp, serde_json::to_vec_pretty(state)?)?;
        fs::rename(&temp, &self.path)?;

        debug!(path = %self.path.display(), requests = state.requests.len(), "Saved queue state");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
