//! Update marker: keeps two updaters (or an updater and the packager) from
//! working on the same directory at once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

use crate::error::{AlarmError, Result};

/// File name of the marker inside the installation directory.
pub const MARKER_FILENAME: &str = "alarm-button-update-marker.bin";

/// Age after which a marker is treated as left over by a crashed updater.
pub const MARKER_LIFETIME: Duration = Duration::from_secs(30);

/// Contents of the marker file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Process ID holding the lock.
    pub pid: u32,
    /// When the lock was acquired.
    pub acquired_at: DateTime<Utc>,
}

/// Held update marker. The marker file is removed on drop, unless another
/// run has taken it over in the meantime.
#[derive(Debug)]
pub struct UpdateLock {
    path: PathBuf,
    info: LockInfo,
}

impl UpdateLock {
    /// Creates the marker at `path`.
    ///
    /// Fails while a marker younger than `lifetime` exists. An older marker is
    /// removed first.
    pub fn acquire(path: &Path, lifetime: Duration) -> Result<Self> {
        if Self::is_held(path, lifetime) {
            return Err(AlarmError::update(format!(
                "Another updater is running (marker {})",
                path.display()
            )));
        }

        match fs::remove_file(path) {
            Ok(()) => info!(path = %path.display(), "Removed stale update marker"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(AlarmError::update_with_source(
                    format!("Failed to remove stale marker {}", path.display()),
                    e,
                ))
            }
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| {
                if e.kind() == ErrorKind::AlreadyExists {
                    AlarmError::update(format!(
                        "Another updater is running (marker {})",
                        path.display()
                    ))
                } else {
                    AlarmError::update_with_source(
                        format!("Failed to create marker {}", path.display()),
                        e,
                    )
                }
            })?;

        let info = LockInfo {
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };
        let contents = serde_json::to_vec(&info)
            .map_err(|e| AlarmError::update_with_source("Failed to encode update marker", e))?;
        file.write_all(&contents).map_err(|e| {
            AlarmError::update_with_source(
                format!("Failed to write marker {}", path.display()),
                e,
            )
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            info,
        })
    }

    /// Rewrites the marker so that it stays younger than its lifetime.
    ///
    /// Fails when the marker no longer belongs to this lock.
    pub fn refresh(&self) -> Result<()> {
        if !self.is_owned() {
            return Err(AlarmError::update(format!(
                "Update marker {} was taken over by another run",
                self.path.display()
            )));
        }

        let contents = serde_json::to_vec(&self.info)
            .map_err(|e| AlarmError::update_with_source("Failed to encode update marker", e))?;
        fs::write(&self.path, contents).map_err(|e| {
            AlarmError::update_with_source(
                format!("Failed to refresh marker {}", self.path.display()),
                e,
            )
        })
    }

    /// Returns true while the marker on disk is the one this lock wrote.
    fn is_owned(&self) -> bool {
        fs::read(&self.path)
            .ok()
            .and_then(|contents| serde_json::from_slice::<LockInfo>(&contents).ok())
            .is_some_and(|info| info == self.info)
    }

    /// Returns true while a marker younger than `lifetime` exists at `path`.
    pub fn is_held(path: &Path, lifetime: Duration) -> bool {
        let modified = match fs::metadata(path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) if e.kind() == ErrorKind::NotFound => return false,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unable to read update marker");
                return false;
            }
        };

        // A timestamp in the future counts as fresh.
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        age <= lifetime
    }

    /// Returns the marker path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UpdateLock {
    fn drop(&mut self) {
        if !self.is_owned() {
            warn!(path = %self.path.display(), "Update marker taken over, leaving it in place");
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove update marker");
        }
    }
}
