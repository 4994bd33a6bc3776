//! Domain event kinds and the subscription whitelist.
//!
//! Live sessions subscribe to [`Topic`]s: either a single [`EventKind`] or
//! the `all_events` wildcard. Anything outside this closed set is dropped
//! silently by the gateway.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Wire name of the wildcard topic.
pub const TOPIC_ALL: &str = "all_events";

/// Accepted alias for [`TOPIC_ALL`].
pub const TOPIC_ALL_ALIAS: &str = "all";

/// Category of a domain event, used for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    CitizenRegistered,
    CitizenVerified,
    DocumentUploaded,
    DocumentVerified,
    DocumentRejected,
    GrievanceSubmitted,
    GrievanceAssigned,
    GrievanceResolved,
    SystemBroadcast,
}

impl EventKind {
    pub const ALL: [EventKind; 9] = [
        EventKind::CitizenRegistered,
        EventKind::CitizenVerified,
        EventKind::DocumentUploaded,
        EventKind::DocumentVerified,
        EventKind::DocumentRejected,
        EventKind::GrievanceSubmitted,
        EventKind::GrievanceAssigned,
        EventKind::GrievanceResolved,
        EventKind::SystemBroadcast,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::CitizenRegistered => "citizen_registered",
            EventKind::CitizenVerified => "citizen_verified",
            EventKind::DocumentUploaded => "document_uploaded",
            EventKind::DocumentVerified => "document_verified",
            EventKind::DocumentRejected => "document_rejected",
            EventKind::GrievanceSubmitted => "grievance_submitted",
            EventKind::GrievanceAssigned => "grievance_assigned",
            EventKind::GrievanceResolved => "grievance_resolved",
            EventKind::SystemBroadcast => "system_broadcast",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown event kind '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Topic
// ---------------------------------------------------------------------------

/// One entry of a session's subscription set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Event(EventKind),
    All,
}

impl Topic {
    /// Parse a client-supplied topic name. Returns `None` for anything
    /// outside the whitelist.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            TOPIC_ALL | TOPIC_ALL_ALIAS => Some(Topic::All),
            other => other.parse().ok().map(Topic::Event),
        }
    }

    /// Canonical wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Event(kind) => kind.as_str(),
            Topic::All => TOPIC_ALL,
        }
    }

    /// Filter a list of requested names down to the accepted topics,
    /// preserving request order and dropping duplicates.
    pub fn filter_whitelisted<S: AsRef<str>>(requested: &[S]) -> Vec<Topic> {
        let mut accepted = Vec::new();
        for name in requested {
            if let Some(topic) = Topic::parse(name.as_ref()) {
                if !accepted.contains(&topic) {
                    accepted.push(topic);
                }
            }
        }
        accepted
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
