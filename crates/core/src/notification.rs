//! Notification kinds, priorities and rendered content.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// NotificationKind
// ---------------------------------------------------------------------------

/// Closed set of notification categories stored with every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
    CitizenRegistration,
    DocumentVerification,
    GrievanceUpdate,
    SystemAnnouncement,
}

/// Default expiry for informational kinds (7 days).
const SHORT_EXPIRY_HOURS: i64 = 168;

/// Default expiry for transient success messages (3 days).
const SUCCESS_EXPIRY_HOURS: i64 = 72;

/// Default expiry for long-lived citizen records (30 days).
const LONG_EXPIRY_HOURS: i64 = 720;

impl NotificationKind {
    pub const ALL: [NotificationKind; 8] = [
        NotificationKind::Info,
        NotificationKind::Success,
        NotificationKind::Warning,
        NotificationKind::Error,
        NotificationKind::CitizenRegistration,
        NotificationKind::DocumentVerification,
        NotificationKind::GrievanceUpdate,
        NotificationKind::SystemAnnouncement,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Success => "success",
            NotificationKind::Warning => "warning",
            NotificationKind::Error => "error",
            NotificationKind::CitizenRegistration => "citizen_registration",
            NotificationKind::DocumentVerification => "document_verification",
            NotificationKind::GrievanceUpdate => "grievance_update",
            NotificationKind::SystemAnnouncement => "system_announcement",
        }
    }

    /// Lifetime applied when the caller does not supply an expiry.
    pub fn default_expiry(self) -> Duration {
        let hours = match self {
            NotificationKind::CitizenRegistration | NotificationKind::GrievanceUpdate => {
                LONG_EXPIRY_HOURS
            }
            NotificationKind::Success => SUCCESS_EXPIRY_HOURS,
            _ => SHORT_EXPIRY_HOURS,
        };
        Duration::hours(hours)
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown notification kind '{s}'")))
    }
}

impl TryFrom<String> for NotificationKind {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, CoreError> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Notification priority. Variant order is the sort order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Urgent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::Validation(format!("Unknown priority '{s}'")))
    }
}

impl TryFrom<String> for Priority {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// Call-to-action attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub url: String,
    pub label: String,
}

/// Fully rendered notification text, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub action: Option<NotificationAction>,
}

impl NotificationContent {
    /// Reject content that would produce an empty notification.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.title.trim().is_empty() {
            return Err(CoreError::Validation(
                "Notification title must not be empty".to_string(),
            ));
        }
        if self.message.trim().is_empty() {
            return Err(CoreError::Validation(
                "Notification message must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
