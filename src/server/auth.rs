//! Auth Gate: bearer-token middleware for the protected API.
//!
//! ```text
//! Authorization: Bearer {user_id}.{expiry}.{signature}
//!        │
//!        ▼
//! TokenService::verify ──► CredentialStore::exists ──► AuthUser in extensions
//!        │ fail                   │ absent
//!        ▼                        ▼
//!     401 (handler never runs)   401 auth_invalid
//! ```
//!
//! Handlers receive the caller through the [`AuthUser`] extractor, which reads
//! the extension inserted here and rejects the request if it is missing. A
//! protected handler mounted without the gate therefore fails closed.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, error, warn};

use super::handlers::{AppState, ErrorResponse};
use crate::auth::UserId;
use crate::error::TokenError;

const BEARER_PREFIX: &str = "Bearer ";

/// Why a request was refused by the Auth Gate.
#[derive(Debug, Clone)]
pub enum AuthError {
    /// No `Authorization` header, or the gate did not run
    MissingToken,

    /// Header present but not a bearer credential
    MalformedHeader,

    /// Token signature or shape is wrong, or its user no longer exists
    Invalid,

    /// Token is past its expiry
    Expired { expired_at: u64, current_time: u64 },

    /// Subject lookup failed
    Internal(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "Missing bearer token"),
            AuthError::MalformedHeader => {
                write!(f, "Authorization header must be 'Bearer <token>'")
            }
            AuthError::Invalid => write!(f, "Invalid session token"),
            AuthError::Expired { expired_at, .. } => {
                write!(f, "Session token expired at {}", expired_at)
            }
            AuthError::Internal(_) => write!(f, "Internal server error"),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => AuthError::Invalid,
            TokenError::Expired {
                expired_at,
                current_time,
            } => AuthError::Expired {
                expired_at,
                current_time,
            },
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "missing_token"),
            AuthError::MalformedHeader | AuthError::Invalid => {
                (StatusCode::UNAUTHORIZED, "auth_invalid")
            }
            AuthError::Expired { .. } => (StatusCode::UNAUTHORIZED, "auth_expired"),
            AuthError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        let message = self.to_string();

        match &self {
            AuthError::Internal(detail) => {
                error!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Auth gate failure: {}",
                    detail
                );
            }
            AuthError::Invalid | AuthError::MalformedHeader => {
                warn!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Authentication failed: {}",
                    message
                );
            }
            _ => {
                debug!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Authentication failed: {}",
                    message
                );
            }
        }

        let body = Json(ErrorResponse::with_status(error_type, message, status));
        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// The authenticated caller, bound by [`require_auth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: UserId,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or(AuthError::MissingToken)
    }
}

/// Pull the token out of an `Authorization` header value.
fn bearer_token(request: &Request) -> Result<&str, AuthError> {
    let value = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?;

    let value = value.to_str().map_err(|_| AuthError::MalformedHeader)?;
    let token = match value.get(..BEARER_PREFIX.len()) {
        Some(scheme) if scheme.eq_ignore_ascii_case(BEARER_PREFIX) => {
            value[BEARER_PREFIX.len()..].trim()
        }
        _ => return Err(AuthError::MalformedHeader),
    };

    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

/// Axum middleware guarding every authenticated route.
///
/// ```ignore
/// let protected = Router::new()
///     .route("/images", get(list_images))
///     .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));
/// ```
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user_id = state.tokens.verify(bearer_token(&request)?)?;

    let exists = state
        .credentials
        .exists(user_id)
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))?;
    if !exists {
        debug!(user_id = %user_id, "Token subject no longer exists");
        return Err(AuthError::Invalid);
    }

    request.extensions_mut().insert(AuthUser { user_id });
    Ok(next.run(request).await)
}
