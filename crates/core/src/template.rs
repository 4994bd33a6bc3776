//! Notification template catalogue and `{placeholder}` rendering.
//!
//! Templates are static and process-wide. Rendering never fails: tokens
//! without a matching data key are left verbatim.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::kinds::EventKind;
use crate::notification::{NotificationAction, NotificationContent, NotificationKind, Priority};

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+)\}").expect("valid regex"));

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// A cataloged notification pattern.
#[derive(Debug, Clone, Serialize)]
pub struct Template {
    pub key: &'static str,
    pub title: &'static str,
    pub message: &'static str,
    pub kind: NotificationKind,
    pub priority: Priority,
    pub action_label: Option<&'static str>,
    pub action_url: Option<&'static str>,
}

impl Template {
    /// Substitute `data` into title, message and action url.
    pub fn render(&self, data: &Map<String, Value>) -> NotificationContent {
        let action = match (self.action_url, self.action_label) {
            (Some(url), Some(label)) => Some(NotificationAction {
                url: render_placeholders(url, data),
                label: label.to_string(),
            }),
            _ => None,
        };

        NotificationContent {
            title: render_placeholders(self.title, data),
            message: render_placeholders(self.message, data),
            kind: self.kind,
            priority: self.priority,
            action,
        }
    }
}

const fn template(
    key: &'static str,
    title: &'static str,
    message: &'static str,
    kind: NotificationKind,
    priority: Priority,
    action_label: &'static str,
    action_url: &'static str,
) -> Template {
    Template {
        key,
        title,
        message,
        kind,
        priority,
        action_label: Some(action_label),
        action_url: Some(action_url),
    }
}

/// The full template catalogue, loaded once at startup.
pub static TEMPLATES: &[Template] = &[
    template(
        "citizen_registered",
        "Welcome to BharatChain! 🎉",
        "Your citizen registration has been successfully completed. You can now access all government services.",
        NotificationKind::CitizenRegistration,
        Priority::High,
        "View Profile",
        "/dashboard/profile",
    ),
    template(
        "citizen_verified",
        "Account Verified ✅",
        "Your citizen account has been verified by government authorities.",
        NotificationKind::CitizenRegistration,
        Priority::High,
        "View Profile",
        "/dashboard/profile",
    ),
    template(
        "document_uploaded",
        "Document Uploaded 📄",
        "Your {documentType} has been successfully uploaded and is pending verification.",
        NotificationKind::DocumentVerification,
        Priority::Medium,
        "View Documents",
        "/dashboard/documents",
    ),
    template(
        "document_verified",
        "Document Verified ✅",
        "Your {documentType} has been verified and is now officially recognized.",
        NotificationKind::DocumentVerification,
        Priority::High,
        "View Documents",
        "/dashboard/documents",
    ),
    template(
        "document_rejected",
        "Document Rejected ❌",
        "Your {documentType} has been rejected. Please check the requirements and upload again.",
        NotificationKind::DocumentVerification,
        Priority::High,
        "Upload Again",
        "/dashboard/documents/upload",
    ),
    template(
        "grievance_submitted",
        "Grievance Submitted 📝",
        "Your grievance \"_{title}_\" has been submitted successfully. Reference ID: {grievanceId}",
        NotificationKind::GrievanceUpdate,
        Priority::Medium,
        "Track Grievance",
        "/dashboard/grievances/{grievanceId}",
    ),
    template(
        "grievance_assigned",
        "Grievance Assigned 👮\u{200d}♂\u{fe0f}",
        "Your grievance \"_{title}_\" has been assigned to an officer for resolution.",
        NotificationKind::GrievanceUpdate,
        Priority::Medium,
        "View Progress",
        "/dashboard/grievances/{grievanceId}",
    ),
    template(
        "grievance_resolved",
        "Grievance Resolved ✅",
        "Your grievance \"_{title}_\" has been resolved. Please review the resolution and provide feedback.",
        NotificationKind::GrievanceUpdate,
        Priority::High,
        "Review Resolution",
        "/dashboard/grievances/{grievanceId}",
    ),
    template(
        "system_maintenance",
        "System Maintenance Notice 🔧",
        "BharatChain will undergo scheduled maintenance on {date} from {startTime} to {endTime}.",
        NotificationKind::SystemAnnouncement,
        Priority::Medium,
        "Learn More",
        "/announcements",
    ),
    template(
        "policy_update",
        "Policy Update 📋",
        "New government policy \"{policyName}\" has been announced. Review how it affects you.",
        NotificationKind::SystemAnnouncement,
        Priority::Medium,
        "Read Policy",
        "/policies/{policyId}",
    ),
    template(
        "service_outage",
        "Service Alert ⚠️",
        "We are experiencing issues with {serviceName}. Our team is working to resolve this quickly.",
        NotificationKind::SystemAnnouncement,
        Priority::High,
        "Status Page",
        "/status",
    ),
];

/// Look up a template by key.
pub fn lookup(key: &str) -> Option<&'static Template> {
    TEMPLATES.iter().find(|t| t.key == key)
}

/// Template issued automatically for a domain event, if any.
pub fn for_event(kind: EventKind) -> Option<&'static Template> {
    match kind {
        EventKind::SystemBroadcast => None,
        other => lookup(other.as_str()),
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Replace `{word}` tokens in `text` with values from `data`.
///
/// Strings are inserted as-is, other scalars via their JSON form. Missing
/// keys and `null` values leave the token untouched.
pub fn render_placeholders(text: &str, data: &Map<String, Value>) -> String {
    PLACEHOLDER_RE
        .replace_all(text, |caps: &regex::Captures| match data.get(&caps[1]) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => caps[0].to_string(),
            Some(other) => other.to_string(),
        })
        .into_owned()
}

// ---------------------------------------------------------------------------
// TemplateSource
// ---------------------------------------------------------------------------

/// What a caller asks to send: a cataloged template key or ad hoc content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateSource {
    Key(String),
    Custom(NotificationContent),
}

impl TemplateSource {
    /// Produce the rendered content for this source.
    ///
    /// Custom content is passed through unchanged; an unknown key is an
    /// error.
    pub fn resolve(&self, data: &Map<String, Value>) -> Result<NotificationContent, CoreError> {
        match self {
            TemplateSource::Key(key) => lookup(key)
                .map(|t| t.render(data))
                .ok_or_else(|| CoreError::UnknownTemplate(key.clone())),
            TemplateSource::Custom(content) => {
                content.validate()?;
                Ok(content.clone())
            }
        }
    }
}

impl From<&str> for TemplateSource {
    fn from(key: &str) -> Self {
        TemplateSource::Key(key.to_string())
    }
}

impl From<NotificationContent> for TemplateSource {
    fn from(content: NotificationContent) -> Self {
        TemplateSource::Custom(content)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn document_verified_substitutes_document_type() {
        let content = TemplateSource::from("document_verified")
            .resolve(&data(json!({"documentType": "PAN"})))
            .unwrap();
        assert_eq!(content.title, "Document Verified ✅");
        assert!(content.message.contains("PAN"));
        assert!(!content.message.contains("{documentType}"));
        assert_eq!(content.priority, Priority::High);
        assert_eq!(content.kind, NotificationKind::DocumentVerification);
    }

    #[test]
    fn registration_and_maintenance_texts() {
        let welcome = TemplateSource::from("citizen_registered")
            .resolve(&Map::new())
            .unwrap();
        assert_eq!(welcome.title, "Welcome to BharatChain! 🎉");

        let maintenance = TemplateSource::from("system_maintenance")
            .resolve(&data(json!({
                "date": "2026-11-02",
                "startTime": "01:00",
                "endTime": "03:00"
            })))
            .unwrap();
        assert_eq!(
            maintenance.message,
            "BharatChain will undergo scheduled maintenance on 2026-11-02 from 01:00 to 03:00."
        );
    }

    #[test]
    fn grievance_title_is_emphasised() {
        let content = TemplateSource::from("grievance_assigned")
            .resolve(&data(json!({"grievanceId": "G-3", "title": "Pothole"})))
            .unwrap();
        assert_eq!(content.title, "Grievance Assigned 👮\u{200d}♂\u{fe0f}");
        assert_eq!(
            content.message,
            "Your grievance \"_Pothole_\" has been assigned to an officer for resolution."
        );
    }

    #[test]
    fn unmatched_tokens_are_left_verbatim() {
        let out = render_placeholders("Hello {name}, ref {id}", &data(json!({"name": "Asha"})));
        assert_eq!(out, "Hello Asha, ref {id}");
    }

    #[test]
    fn numbers_render_without_quotes() {
        let out = render_placeholders("#{grievanceId}", &data(json!({"grievanceId": 42})));
        assert_eq!(out, "#42");
    }

    #[test]
    fn null_values_leave_token() {
        let out = render_placeholders("{title}", &data(json!({"title": null})));
        assert_eq!(out, "{title}");
    }

    #[test]
    fn action_url_is_rendered() {
        let content = lookup("grievance_resolved")
            .unwrap()
            .render(&data(json!({"grievanceId": "G-7", "title": "Streetlight"})));
        let action = content.action.unwrap();
        assert_eq!(action.url, "/dashboard/grievances/G-7");
        assert_eq!(action.label, "Review Resolution");
    }

    #[test]
    fn unknown_key_is_rejected() {
        assert_matches!(
            TemplateSource::from("no_such_template").resolve(&Map::new()),
            Err(CoreError::UnknownTemplate(key)) if key == "no_such_template"
        );
    }

    #[test]
    fn custom_content_passes_through_unchanged() {
        let custom = NotificationContent {
            title: "Ad hoc {x}".into(),
            message: "Body".into(),
            kind: NotificationKind::Warning,
            priority: Priority::Urgent,
            action: None,
        };
        let out = TemplateSource::from(custom.clone())
            .resolve(&data(json!({"x": "ignored"})))
            .unwrap();
        assert_eq!(out, custom);
    }

    #[test]
    fn source_deserializes_key_or_object() {
        let key: TemplateSource = serde_json::from_str("\"policy_update\"").unwrap();
        assert_matches!(key, TemplateSource::Key(k) if k == "policy_update");

        let custom: TemplateSource =
            serde_json::from_str(r#"{"title":"t","message":"m","kind":"info"}"#).unwrap();
        assert_matches!(custom, TemplateSource::Custom(_));
    }

    #[test]
    fn every_chain_event_except_broadcast_has_a_template() {
        for kind in EventKind::ALL {
            let found = for_event(kind).is_some();
            assert_eq!(found, kind != EventKind::SystemBroadcast, "{kind}");
        }
    }
}
