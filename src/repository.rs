//! Alarm state persistence.
//!
//! The server keeps the alarm flag in a small JSON document so that a restart
//! does not silently lower a raised alarm.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::State;
use crate::error::{AlarmError, Result};

/// Storage for the alarm state.
#[async_trait]
pub trait StateRepository: Send + Sync {
    /// Loads the stored state.
    ///
    /// Returns [`AlarmError::StateNotFound`] when nothing has been stored yet.
    async fn load(&self) -> Result<State>;

    /// Replaces the stored state.
    async fn save(&self, state: &State) -> Result<()>;
}

/// Stores the state as JSON in a single file.
pub struct FileStateRepository {
    /// Target file.
    path: PathBuf,
    /// Serialises reads and writes of the file.
    lock: Mutex<()>,
}

impl FileStateRepository {
    /// Creates a repository backed by `path`. The file is not touched until
    /// the first load or save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file the new document is written to before it replaces the
    /// target.
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateRepository for FileStateRepository {
    async fn load(&self) -> Result<State> {
        let _guard = self.lock.lock().await;

        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AlarmError::StateNotFound {
                    path: self.path.clone(),
                })
            }
            Err(e) => {
                return Err(AlarmError::persistence_with_source(
                    format!("Failed to read state file '{}'", self.path.display()),
                    e,
                ))
            }
        };

        let state: State = serde_json::from_slice(&contents).map_err(|e| {
            AlarmError::persistence_with_source(
                format!("Failed to decode state file '{}'", self.path.display()),
                e,
            )
        })?;

        debug!(path = %self.path.display(), state = %state.describe(), "Loaded alarm state");
        Ok(state)
    }

    async fn save(&self, state: &State) -> Result<()> {
        let _guard = self.lock.lock().await;

        let contents = serde_json::to_vec_pretty(state)
            .map_err(|e| AlarmError::persistence_with_source("Failed to encode state", e))?;

        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, &contents).await.map_err(|e| {
            AlarmError::persistence_with_source(
                format!("Failed to write state file '{}'", temp_path.display()),
                e,
            )
        })?;

        if let Err(e) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(AlarmError::persistence_with_source(
                format!("Failed to replace state file '{}'", self.path.display()),
                e,
            ));
        }

        debug!(path = %self.path.display(), state = %state.describe(), "Saved alarm state");
        Ok(())
    }
}
