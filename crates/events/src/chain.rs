//! Typed contract events.
//!
//! The chain client reports enum fields as small integers. [`ChainEvent`]
//! carries them as received and names them when converting into a
//! [`DomainEvent`], so every body on the bus uses the same camelCase shape.

use chrono::{DateTime, Utc};
use civic_core::kinds::EventKind;
use serde_json::{json, Value};

use crate::bus::DomainEvent;

/// Document type names indexed by the contract's enum value.
pub const DOCUMENT_TYPES: [&str; 7] = [
    "AADHAR",
    "PAN",
    "DRIVING_LICENSE",
    "PASSPORT",
    "VOTER_ID",
    "BIRTH_CERTIFICATE",
    "OTHER",
];

/// Grievance category names indexed by the contract's enum value.
pub const GRIEVANCE_CATEGORIES: [&str; 9] = [
    "INFRASTRUCTURE",
    "WATER_SUPPLY",
    "ELECTRICITY",
    "SANITATION",
    "ROADS",
    "HEALTHCARE",
    "EDUCATION",
    "CORRUPTION",
    "OTHER",
];

/// Grievance priority names indexed by the contract's enum value.
pub const GRIEVANCE_PRIORITIES: [&str; 4] = ["LOW", "MEDIUM", "HIGH", "URGENT"];

/// Name for a document type index; out of range maps to `OTHER`.
pub fn document_type_name(index: u8) -> &'static str {
    DOCUMENT_TYPES.get(index as usize).copied().unwrap_or("OTHER")
}

/// Name for a grievance category index; out of range maps to `OTHER`.
pub fn grievance_category_name(index: u8) -> &'static str {
    GRIEVANCE_CATEGORIES
        .get(index as usize)
        .copied()
        .unwrap_or("OTHER")
}

/// Name for a grievance priority index; out of range maps to `LOW`.
pub fn grievance_priority_name(index: u8) -> &'static str {
    GRIEVANCE_PRIORITIES
        .get(index as usize)
        .copied()
        .unwrap_or("LOW")
}

/// Block metadata shared by every contract event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainMeta {
    /// Block timestamp in seconds since the epoch.
    pub timestamp: i64,
    pub block_number: u64,
    pub transaction_hash: String,
}

impl ChainMeta {
    fn iso_timestamp(&self) -> String {
        DateTime::<Utc>::from_timestamp(self.timestamp, 0)
            .unwrap_or_else(Utc::now)
            .to_rfc3339()
    }

    fn extend(&self, mut body: Value) -> Value {
        if let Some(map) = body.as_object_mut() {
            map.insert("timestamp".into(), json!(self.iso_timestamp()));
            map.insert("blockNumber".into(), json!(self.block_number));
            map.insert("transactionHash".into(), json!(self.transaction_hash));
        }
        body
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    CitizenRegistered {
        citizen_address: String,
        name: String,
        meta: ChainMeta,
    },
    CitizenVerified {
        citizen_address: String,
        verifier: String,
        meta: ChainMeta,
    },
    DocumentUploaded {
        document_id: u64,
        owner: String,
        doc_type: u8,
        document_hash: String,
        meta: ChainMeta,
    },
    DocumentVerified {
        document_id: u64,
        owner: Option<String>,
        doc_type: u8,
        verifier: String,
        meta: ChainMeta,
    },
    DocumentRejected {
        document_id: u64,
        owner: Option<String>,
        doc_type: u8,
        reason: String,
        meta: ChainMeta,
    },
    GrievanceSubmitted {
        grievance_id: u64,
        citizen: String,
        title: String,
        category: u8,
        priority: u8,
        meta: ChainMeta,
    },
    GrievanceAssigned {
        grievance_id: u64,
        citizen: Option<String>,
        title: String,
        officer: String,
        meta: ChainMeta,
    },
    GrievanceResolved {
        grievance_id: u64,
        citizen: Option<String>,
        title: String,
        officer: String,
        resolution: String,
        meta: ChainMeta,
    },
}

impl ChainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ChainEvent::CitizenRegistered { .. } => EventKind::CitizenRegistered,
            ChainEvent::CitizenVerified { .. } => EventKind::CitizenVerified,
            ChainEvent::DocumentUploaded { .. } => EventKind::DocumentUploaded,
            ChainEvent::DocumentVerified { .. } => EventKind::DocumentVerified,
            ChainEvent::DocumentRejected { .. } => EventKind::DocumentRejected,
            ChainEvent::GrievanceSubmitted { .. } => EventKind::GrievanceSubmitted,
            ChainEvent::GrievanceAssigned { .. } => EventKind::GrievanceAssigned,
            ChainEvent::GrievanceResolved { .. } => EventKind::GrievanceResolved,
        }
    }

    /// Convert into the bus envelope with a named, camelCase body.
    ///
    /// Ids are rendered as strings; optional recipients are omitted when
    /// absent so the event is routed to every subscriber.
    pub fn into_domain_event(self) -> DomainEvent {
        let kind = self.kind();
        let (body, meta) = match self {
            ChainEvent::CitizenRegistered {
                citizen_address,
                name,
                meta,
            } => (json!({"citizenAddress": citizen_address, "name": name}), meta),
            ChainEvent::CitizenVerified {
                citizen_address,
                verifier,
                meta,
            } => (
                json!({"citizenAddress": citizen_address, "verifier": verifier}),
                meta,
            ),
            ChainEvent::DocumentUploaded {
                document_id,
                owner,
                doc_type,
                document_hash,
                meta,
            } => (
                json!({
                    "documentId": document_id.to_string(),
                    "owner": owner,
                    "documentType": document_type_name(doc_type),
                    "documentHash": document_hash,
                }),
                meta,
            ),
            ChainEvent::DocumentVerified {
                document_id,
                owner,
                doc_type,
                verifier,
                meta,
            } => (
                with_optional(
                    json!({
                        "documentId": document_id.to_string(),
                        "documentType": document_type_name(doc_type),
                        "verifier": verifier,
                    }),
                    "owner",
                    owner,
                ),
                meta,
            ),
            ChainEvent::DocumentRejected {
                document_id,
                owner,
                doc_type,
                reason,
                meta,
            } => (
                with_optional(
                    json!({
                        "documentId": document_id.to_string(),
                        "documentType": document_type_name(doc_type),
                        "reason": reason,
                    }),
                    "owner",
                    owner,
                ),
                meta,
            ),
            ChainEvent::GrievanceSubmitted {
                grievance_id,
                citizen,
                title,
                category,
                priority,
                meta,
            } => (
                json!({
                    "grievanceId": grievance_id.to_string(),
                    "citizen": citizen,
                    "title": title,
                    "category": grievance_category_name(category),
                    "priority": grievance_priority_name(priority),
                }),
                meta,
            ),
            ChainEvent::GrievanceAssigned {
                grievance_id,
                citizen,
                title,
                officer,
                meta,
            } => (
                with_optional(
                    json!({
                        "grievanceId": grievance_id.to_string(),
                        "title": title,
                        "officer": officer,
                    }),
                    "citizen",
                    citizen,
                ),
                meta,
            ),
            ChainEvent::GrievanceResolved {
                grievance_id,
                citizen,
                title,
                officer,
                resolution,
                meta,
            } => (
                with_optional(
                    json!({
                        "grievanceId": grievance_id.to_string(),
                        "title": title,
                        "officer": officer,
                        "resolution": resolution,
                    }),
                    "citizen",
                    citizen,
                ),
                meta,
            ),
        };

        DomainEvent::new(kind, meta.extend(body))
    }
}

fn with_optional(mut body: Value, field: &str, value: Option<String>) -> Value {
    if let (Some(map), Some(value)) = (body.as_object_mut(), value) {
        map.insert(field.to_string(), Value::String(value));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> ChainMeta {
        ChainMeta {
            timestamp: 1_700_000_000,
            block_number: 12,
            transaction_hash: "0xfeed".into(),
        }
    }

    #[test]
    fn enum_indices_map_to_names_with_fallbacks() {
        assert_eq!(document_type_name(1), "PAN");
        assert_eq!(document_type_name(200), "OTHER");
        assert_eq!(grievance_category_name(4), "ROADS");
        assert_eq!(grievance_category_name(9), "OTHER");
        assert_eq!(grievance_priority_name(3), "URGENT");
        assert_eq!(grievance_priority_name(7), "LOW");
    }

    #[test]
    fn document_upload_body_names_type_and_owner() {
        let event = ChainEvent::DocumentUploaded {
            document_id: 99,
            owner: "0xOwner".into(),
            doc_type: 1,
            document_hash: "Qm123".into(),
            meta: meta(),
        }
        .into_domain_event();

        assert_eq!(event.kind, EventKind::DocumentUploaded);
        assert_eq!(event.body["documentId"], "99");
        assert_eq!(event.body["documentType"], "PAN");
        assert_eq!(event.body["blockNumber"], 12);
        assert_eq!(event.body["transactionHash"], "0xfeed");
        assert_eq!(event.body["timestamp"], "2023-11-14T22:13:20+00:00");
        assert_eq!(event.recipient(), Some("0xOwner"));
    }

    #[test]
    fn grievance_submission_names_category_and_priority() {
        let event = ChainEvent::GrievanceSubmitted {
            grievance_id: 5,
            citizen: "0xabc".into(),
            title: "Broken streetlight".into(),
            category: 2,
            priority: 2,
            meta: meta(),
        }
        .into_domain_event();

        assert_eq!(event.body["category"], "ELECTRICITY");
        assert_eq!(event.body["priority"], "HIGH");
        assert_eq!(event.recipient(), Some("0xabc"));
    }

    #[test]
    fn missing_owner_leaves_event_unaddressed() {
        let event = ChainEvent::DocumentVerified {
            document_id: 1,
            owner: None,
            doc_type: 0,
            verifier: "0xgov".into(),
            meta: meta(),
        }
        .into_domain_event();

        assert!(event.body.get("owner").is_none());
        assert_eq!(event.recipient(), None);
    }
}
