//! Authentication and authorization middleware extractors.
//!
//! - [`auth::AuthIdentity`] -- Extracts the caller's identity from a JWT Bearer token.
//! - [`rbac::RequireAdmin`] -- Requires the `admin` role.

pub mod auth;
pub mod rbac;
