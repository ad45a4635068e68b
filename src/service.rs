//! Alarm service: the single authority over the alarm flag.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::domain::{Actor, State};
use crate::error::{AlarmError, Result};
use crate::repository::StateRepository;

/// Holds the current alarm state and writes every change through to the
/// repository before publishing it.
pub struct AlarmService {
    state: RwLock<State>,
    repository: Option<Arc<dyn StateRepository>>,
}

impl AlarmService {
    /// Creates the service, loading the initial state from `repository`.
    ///
    /// A repository without stored state starts the alarm disabled. Any other
    /// load failure is returned.
    pub async fn new(repository: Option<Arc<dyn StateRepository>>) -> Result<Self> {
        let initial = match &repository {
            Some(repo) => match repo.load().await {
                Ok(state) => {
                    info!(state = %state.describe(), "Restored alarm state");
                    state
                }
                Err(AlarmError::StateNotFound { path }) => {
                    info!(path = %path.display(), "No stored alarm state, starting disabled");
                    State::initial()
                }
                Err(e) => return Err(e),
            },
            None => State::initial(),
        };

        Ok(Self {
            state: RwLock::new(initial),
            repository,
        })
    }

    /// Sets the alarm flag on behalf of `actor`.
    ///
    /// The last write wins. The new state is persisted first; when that fails
    /// the in-memory state is left as it was.
    pub async fn set_alarm_state(&self, actor: Actor, is_enabled: bool) -> Result<State> {
        let next = State::changed_by(actor, is_enabled);

        let mut current = self.state.write().await;

        if let Some(repo) = &self.repository {
            if let Err(e) = repo.save(&next).await {
                warn!(error = %e, "Failed to persist alarm state");
                return Err(match e {
                    AlarmError::Persistence { .. } => e,
                    other => AlarmError::persistence_with_source("Failed to persist state", other),
                });
            }
        }

        *current = next.clone();
        info!(state = %next.describe(), "Alarm state changed");

        Ok(next)
    }

    /// Returns a copy of the current state.
    pub async fn get_alarm_state(&self) -> State {
        self.state.read().await.clone()
    }
}
