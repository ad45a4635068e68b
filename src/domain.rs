//! Alarm domain values: who acted and what the alarm flag looks like.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AlarmError, Result};

/// Environment variables consulted for the login name, in order.
const USERNAME_VARIABLES: [&str; 3] = ["USER", "USERNAME", "LOGNAME"];

/// The machine and user that performed an action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    /// Host name of the machine.
    pub hostname: String,
    /// Login name of the user.
    pub username: String,
}

impl Actor {
    /// Creates an actor from explicit values.
    pub fn new(hostname: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            username: username.into(),
        }
    }

    /// Detects the actor of the current process.
    pub fn detect() -> Result<Self> {
        let hostname = hostname::get()
            .map_err(|e| AlarmError::internal(format!("Unable to determine host name: {}", e)))?
            .into_string()
            .map_err(|_| AlarmError::internal("Host name is not valid UTF-8"))?;

        if hostname.trim().is_empty() {
            return Err(AlarmError::internal("Host name is empty"));
        }

        let username = USERNAME_VARIABLES
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|value| !value.trim().is_empty())
            .or_else(account_name)
            .ok_or_else(|| AlarmError::internal("Unable to determine user name"))?;

        Ok(Self::new(hostname, username))
    }
}

/// Looks the current user up in the account database.
#[cfg(unix)]
fn account_name() -> Option<String> {
    nix::unistd::User::from_uid(nix::unistd::Uid::current())
        .ok()
        .flatten()
        .map(|user| user.name)
}

#[cfg(not(unix))]
fn account_name() -> Option<String> {
    None
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.username, self.hostname)
    }
}

/// Snapshot of the alarm flag.
///
/// A state is replaced as a whole on every change; readers always get their
/// own copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// When the flag was last changed.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    /// Who changed the flag last.
    #[serde(default, alias = "lastActor")]
    pub last_actor: Option<Actor>,

    /// Whether the alarm is raised.
    #[serde(default, alias = "isEnabled")]
    pub is_enabled: bool,
}

impl State {
    /// Creates a state changed by `actor` right now.
    pub fn changed_by(actor: Actor, is_enabled: bool) -> Self {
        Self {
            timestamp: Some(Utc::now()),
            last_actor: Some(actor),
            is_enabled,
        }
    }

    /// Creates the disabled state used when nothing has been persisted yet.
    pub fn initial() -> Self {
        Self {
            timestamp: Some(Utc::now()),
            last_actor: None,
            is_enabled: false,
        }
    }

    /// Renders the state for log lines, e.g.
    /// `enabled by alice@desk-7 (2024-05-01T10:00:00Z)`.
    pub fn describe(&self) -> String {
        let status = if self.is_enabled { "enabled" } else { "disabled" };
        let actor = self
            .last_actor
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "<unknown>".to_string());
        let timestamp = self
            .timestamp
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            .unwrap_or_else(|| "<unknown>".to_string());

        format!("{} by {} ({})", status, actor, timestamp)
    }
}
