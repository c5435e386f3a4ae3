//! Observability types shared by the CLI and any embedding shell.

use std::fmt;

use serde::Serialize;

/// Badge-level status of the whole engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateStatus {
    Synced,
    Pending,
    Syncing,
    Offline,
    Error,
}

impl AggregateStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Pending => "pending",
            Self::Syncing => "syncing",
            Self::Offline => "offline",
            Self::Error => "error",
        }
    }

    /// Resolve the badge from its inputs, in priority order.
    #[must_use]
    pub const fn resolve(online: bool, counts: PendingCounts, syncing: bool) -> Self {
        if !online {
            Self::Offline
        } else if counts.total() > 0 {
            Self::Pending
        } else if syncing {
            Self::Syncing
        } else {
            Self::Synced
        }
    }
}

impl fmt::Display for AggregateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retry-eligible (`pending` or `error`) entity counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PendingCounts {
    pub drafts: usize,
    pub photos: usize,
}

impl PendingCounts {
    #[must_use]
    pub const fn total(self) -> usize {
        self.drafts + self.photos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_wins_over_everything() {
        let counts = PendingCounts {
            drafts: 3,
            photos: 1,
        };
        assert_eq!(
            AggregateStatus::resolve(false, counts, true),
            AggregateStatus::Offline
        );
    }

    #[test]
    fn pending_work_wins_over_active_pass() {
        let counts = PendingCounts {
            drafts: 0,
            photos: 1,
        };
        assert_eq!(
            AggregateStatus::resolve(true, counts, true),
            AggregateStatus::Pending
        );
        assert_eq!(
            AggregateStatus::resolve(true, PendingCounts::default(), true),
            AggregateStatus::Syncing
        );
        assert_eq!(
            AggregateStatus::resolve(true, PendingCounts::default(), false),
            AggregateStatus::Synced
        );
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&AggregateStatus::Offline).unwrap();
        assert_eq!(json, "\"offline\"");
    }
}
