//! Shared types and constants for the Mentorline platform.
//!
//! This crate holds the domain vocabulary used by every other crate in the
//! workspace: query and response statuses, mentor records, respond actions
//! and their outcomes, and the language catalogue used by the speech
//! services. It has no dependency on storage or networking so it can sit at
//! the bottom of the dependency graph.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

mod language;
pub use language::{Language, DEFAULT_LANGUAGE_CODE, DEFAULT_LANGUAGE_ID};

/// Transcript substituted when the speech service returns no text.
pub const TRANSCRIPT_NOT_FOUND: &str = "Transcription not found";

/// Message body stored for chat entries that carry audio instead of text.
pub const VOICE_MESSAGE_SENTINEL: &str = "[voice]";

/// Error returned when a stored status string is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseStatusError {
    kind: &'static str,
    value: String,
}

/// Lifecycle state of a mentee query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    /// At least one mentor was matched and no mentor has accepted yet.
    Pending,
    /// No mentor matched; the mentee is routed to the automated coach.
    Chatbot,
    /// A mentor accepted the query.
    Resolved,
}

impl QueryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Chatbot => "chatbot",
            Self::Resolved => "resolved",
        }
    }

    /// Initial status for a freshly submitted query.
    pub fn for_match_count(matched: usize) -> Self {
        if matched > 0 {
            Self::Pending
        } else {
            Self::Chatbot
        }
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "chatbot" => Ok(Self::Chatbot),
            "resolved" => Ok(Self::Resolved),
            other => Err(ParseStatusError {
                kind: "query status",
                value: other.to_string(),
            }),
        }
    }
}

/// State of a single mentor's fan-out row for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ResponseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(ParseStatusError {
                kind: "response status",
                value: other.to_string(),
            }),
        }
    }
}

/// Action a mentor takes on a matched query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RespondAction {
    Accept,
    Reject,
}

/// Result of applying a [`RespondAction`].
///
/// Only `Accepted` and `Rejected` change storage. The `Already*` variants
/// report an idempotent repeat. `Superseded` reports an accept that lost the
/// race to another mentor, and `Locked` reports a reject of a row the same
/// mentor already accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RespondOutcome {
    Accepted,
    Rejected,
    AlreadyAccepted,
    AlreadyRejected,
    Superseded,
    Locked,
}

impl RespondOutcome {
    /// Whether the caller's intent now holds in storage.
    pub fn is_success(self) -> bool {
        !matches!(self, Self::Superseded | Self::Locked)
    }
}

/// A mentor as seen by the matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mentor {
    /// The mentor's user id.
    pub user_id: i64,
    /// Display name from the users table.
    pub name: String,
    /// Expertise labels, e.g. `["NEET", "JEE Advanced"]`.
    pub expertise: Vec<String>,
    /// Whether the mentor currently accepts new queries.
    pub available: bool,
}

/// Minimal mentor identity returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentorSummary {
    pub id: i64,
    pub name: String,
}

impl From<&Mentor> for MentorSummary {
    fn from(m: &Mentor) -> Self {
        Self {
            id: m.user_id,
            name: m.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_status_round_trip() {
        for status in [
            QueryStatus::Pending,
            QueryStatus::Chatbot,
            QueryStatus::Resolved,
        ] {
            assert_eq!(status.as_str().parse::<QueryStatus>(), Ok(status));
        }
        assert!("closed".parse::<QueryStatus>().is_err());
    }

    #[test]
    fn initial_status_depends_on_matches() {
        assert_eq!(QueryStatus::for_match_count(0), QueryStatus::Chatbot);
        assert_eq!(QueryStatus::for_match_count(3), QueryStatus::Pending);
    }

    #[test]
    fn response_status_rejects_unknown() {
        let err = "maybe".parse::<ResponseStatus>().unwrap_err();
        assert_eq!(err.to_string(), "unknown response status: maybe");
    }

    #[test]
    fn outcome_success_flags() {
        assert!(RespondOutcome::Accepted.is_success());
        assert!(RespondOutcome::AlreadyRejected.is_success());
        assert!(!RespondOutcome::Superseded.is_success());
        assert!(!RespondOutcome::Locked.is_success());
    }

    #[test]
    fn action_deserializes_lowercase() {
        let action: RespondAction = serde_json::from_str("\"accept\"").unwrap();
        assert_eq!(action, RespondAction::Accept);
    }
}
