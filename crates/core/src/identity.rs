//! Recipient identities and session proof verification.
//!
//! An [`Identity`] is the string used to scope personal notifications and
//! events to one user (a wallet address in practice). Identities are always
//! stored lowercased so comparisons are case-insensitive.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Regex pattern for an EVM-style wallet address.
pub const ADDRESS_PATTERN: &str = r"^0x[a-fA-F0-9]{40}$";

static ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(ADDRESS_PATTERN).expect("valid regex"));

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A normalized (trimmed, lowercased) recipient identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Normalize a raw identity string. Rejects blank input.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::Validation(
                "Identity must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against an un-normalized string.
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.trim())
    }

    /// Whether this identity has the shape of a wallet address.
    pub fn is_address(&self) -> bool {
        ADDRESS_RE.is_match(&self.0)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identity {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.0
    }
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Verifies a claimed identity for a live session.
///
/// Implementations may check a signature in `proof`; the default
/// [`AddressFormatVerifier`] only checks the identity shape.
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, claimed: &str, proof: Option<&str>) -> Result<Identity, CoreError>;
}

/// Accepts any well-formed wallet address and ignores the proof.
#[derive(Debug, Default, Clone, Copy)]
pub struct AddressFormatVerifier;

impl IdentityVerifier for AddressFormatVerifier {
    fn verify(&self, claimed: &str, _proof: Option<&str>) -> Result<Identity, CoreError> {
        let identity = Identity::parse(claimed)?;
        if !identity.is_address() {
            return Err(CoreError::Validation(
                "Invalid address or signature".to_string(),
            ));
        }
        Ok(identity)
    }
}
