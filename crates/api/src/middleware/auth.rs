//! JWT-based authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use civic_core::error::CoreError;
use civic_core::identity::Identity;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// Caller identity extracted from a JWT Bearer token in the `Authorization`
/// header.
///
/// There is no fallback identity: a missing, malformed or expired token,
/// or a token whose subject is blank, is rejected with 401.
///
/// ```ignore
/// async fn my_handler(auth: AuthIdentity) -> AppResult<Json<()>> {
///     tracing::info!(identity = %auth.identity, role = %auth.role, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthIdentity {
    /// Normalized identity taken from `claims.sub`.
    pub identity: Identity,
    /// The caller's role name (e.g. `"admin"`, `"citizen"`).
    pub role: String,
}

impl FromRequestParts<AppState> for AuthIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing Authorization header".into(),
                ))
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid Authorization format. Expected: Bearer <token>".into(),
            ))
        })?;

        let claims = validate_token(token, &state.config.jwt).map_err(|_| {
            AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
        })?;

        let identity = Identity::parse(&claims.sub).map_err(|_| {
            AppError::Core(CoreError::Unauthorized("Token has no subject".into()))
        })?;

        Ok(AuthIdentity {
            identity,
            role: claims.role,
        })
    }
}
