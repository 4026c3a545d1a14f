//! Progress status shared by goals, strategies and action steps

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a tracked item. Any state may move to any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    Unbegun,
    InProgress,
    Paused,
    Complete,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Unbegun,
        Status::InProgress,
        Status::Paused,
        Status::Complete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Unbegun => "UNBEGUN",
            Status::InProgress => "IN_PROGRESS",
            Status::Paused => "PAUSED",
            Status::Complete => "COMPLETE",
        }
    }

    /// Counts against the active goal quota
    pub fn is_active(&self) -> bool {
        !matches!(self, Status::Complete)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Status must be one of UNBEGUN, IN_PROGRESS, PAUSED, COMPLETE")]
pub struct ParseStatusError;

impl FromStr for Status {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or(ParseStatusError)
    }
}

/// Timestamps stamped by status transitions. They are set, never cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusStamps {
    pub start_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StatusStamps {
    /// Apply the side effects of entering `next` at `now`.
    ///
    /// The first start wins; every entry into COMPLETE re-stamps completion.
    pub fn transition(self, next: Status, now: DateTime<Utc>) -> Self {
        match next {
            Status::InProgress => Self {
                start_date: self.start_date.or(Some(now)),
                ..self
            },
            Status::Complete => Self {
                completed_at: Some(now),
                ..self
            },
            Status::Unbegun | Status::Paused => self,
        }
    }
}
