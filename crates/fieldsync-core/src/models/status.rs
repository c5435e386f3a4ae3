//! Per-entity sync state machine shared by drafts and photos.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Flat status tag, as persisted in the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Syncing,
    Synced,
    Error,
}

impl SyncStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Error => "error",
        }
    }

    /// Pending and errored entities are picked up by the next pass.
    #[must_use]
    pub const fn is_retry_eligible(self) -> bool {
        matches!(self, Self::Pending | Self::Error)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "syncing" => Ok(Self::Syncing),
            "synced" => Ok(Self::Synced),
            "error" => Ok(Self::Error),
            other => Err(Error::InvalidInput(format!("Unknown sync status: {other}"))),
        }
    }
}

/// Sync state of a single draft or photo.
///
/// The error message lives inside the `Error` variant, so a message can never
/// be attached to an entity that is not in the error state.
///
/// ```text
/// pending ──► syncing ──► synced
///                │
///                └──────► error ──► syncing ...
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SyncState {
    #[default]
    Pending,
    Syncing,
    Synced,
    Error {
        message: String,
    },
}

impl SyncState {
    #[must_use]
    pub const fn status(&self) -> SyncStatus {
        match self {
            Self::Pending => SyncStatus::Pending,
            Self::Syncing => SyncStatus::Syncing,
            Self::Synced => SyncStatus::Synced,
            Self::Error { .. } => SyncStatus::Error,
        }
    }

    /// Error message, if this entity failed its last sync attempt.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Error { message } => Some(message),
            _ => None,
        }
    }

    /// `pending | error → syncing`
    pub fn begin(&self) -> Result<Self> {
        if self.status().is_retry_eligible() {
            Ok(Self::Syncing)
        } else {
            Err(self.invalid(SyncStatus::Syncing))
        }
    }

    /// `syncing → synced`
    pub fn complete(&self) -> Result<Self> {
        match self {
            Self::Syncing => Ok(Self::Synced),
            _ => Err(self.invalid(SyncStatus::Synced)),
        }
    }

    /// `syncing → error`
    pub fn fail(&self, message: impl Into<String>) -> Result<Self> {
        match self {
            Self::Syncing => Ok(Self::Error {
                message: message.into(),
            }),
            _ => Err(self.invalid(SyncStatus::Error)),
        }
    }

    /// Rebuild a state from its persisted columns.
    pub(crate) fn from_columns(status: SyncStatus, message: Option<String>) -> Self {
        match status {
            SyncStatus::Pending => Self::Pending,
            SyncStatus::Syncing => Self::Syncing,
            SyncStatus::Synced => Self::Synced,
            SyncStatus::Error => Self::Error {
                message: message.unwrap_or_default(),
            },
        }
    }

    fn invalid(&self, to: SyncStatus) -> Error {
        Error::InvalidTransition(format!("{} -> {to}", self.status()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_and_error_may_begin() {
        assert_eq!(SyncState::Pending.begin().unwrap(), SyncState::Syncing);
        let failed = SyncState::Error {
            message: "boom".to_string(),
        };
        assert_eq!(failed.begin().unwrap(), SyncState::Syncing);
    }

    #[test]
    fn synced_and_syncing_may_not_begin() {
        assert!(SyncState::Synced.begin().is_err());
        assert!(SyncState::Syncing.begin().is_err());
    }

    #[test]
    fn only_syncing_resolves() {
        assert_eq!(SyncState::Syncing.complete().unwrap(), SyncState::Synced);
        assert!(SyncState::Pending.complete().is_err());

        let failed = SyncState::Syncing.fail("timeout").unwrap();
        assert_eq!(failed.message(), Some("timeout"));
        assert_eq!(failed.status(), SyncStatus::Error);
        assert!(SyncState::Synced.fail("late").is_err());
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            SyncStatus::Pending,
            SyncStatus::Syncing,
            SyncStatus::Synced,
            SyncStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<SyncStatus>().unwrap(), status);
        }
        assert!("done".parse::<SyncStatus>().is_err());
    }

    #[test]
    fn from_columns_keeps_message_only_for_errors() {
        let state = SyncState::from_columns(SyncStatus::Synced, Some("stale".to_string()));
        assert_eq!(state, SyncState::Synced);
        assert_eq!(state.message(), None);
    }
}
