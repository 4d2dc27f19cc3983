//! Signed media URLs.
//!
//! Image bytes are never served from an authenticated endpoint. Instead, API
//! responses carry short-lived URLs whose query string holds an expiry and an
//! HMAC-SHA256 signature over the path:
//!
//! ```text
//! signature = HMAC-SHA256(secret_key, "media:{path}?exp={expiry}")
//! /media/3f2a9c...e1.png?exp=1735689600&sig=abc123...
//! ```
//!
//! A URL is only ever minted for an image its owner listed, or for a
//! published image in a resolved gallery, so holding the URL is proof of
//! access until `exp`.
//!
//! # Security Properties
//!
//! - **Path binding**: a signature for one key does not verify for another
//! - **Time-limited**: signatures expire after the configured media URL TTL
//! - **Domain separated**: a media signature can never pass as a session token
//! - **Constant-time comparison** via `subtle`

use std::time::Duration;

use axum::{
    extract::{OriginalUri, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use url::form_urlencoded;

use super::handlers::ErrorResponse;
use crate::auth::unix_now;

type HmacSha256 = Hmac<Sha256>;

/// Path prefix under which signed media is served.
pub const MEDIA_PATH_PREFIX: &str = "/media/";

const MEDIA_DOMAIN: &str = "media:";

/// Signed media URL verification failures.
#[derive(Debug, Clone)]
pub enum SignatureError {
    /// Signature is missing from request
    MissingSignature,

    /// Expiry timestamp is missing from request
    MissingExpiry,

    /// Signature has expired
    Expired { expired_at: u64, current_time: u64 },

    /// Signature does not match
    InvalidSignature,

    /// Signature is not valid hex, or appears twice
    InvalidSignatureFormat,

    /// Expiry is not an integer, or appears twice
    InvalidExpiryFormat,
}

impl std::fmt::Display for SignatureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignatureError::MissingSignature => write!(f, "Missing signature parameter"),
            SignatureError::MissingExpiry => write!(f, "Missing expiry parameter"),
            SignatureError::Expired {
                expired_at,
                current_time,
            } => write!(
                f,
                "Signature expired at {} (current time: {})",
                expired_at, current_time
            ),
            SignatureError::InvalidSignature => write!(f, "Invalid signature"),
            SignatureError::InvalidSignatureFormat => write!(f, "Invalid signature format"),
            SignatureError::InvalidExpiryFormat => write!(f, "Invalid expiry format"),
        }
    }
}

impl IntoResponse for SignatureError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            SignatureError::MissingSignature => (StatusCode::UNAUTHORIZED, "missing_signature"),
            SignatureError::MissingExpiry => (StatusCode::UNAUTHORIZED, "missing_expiry"),
            SignatureError::Expired { .. } => (StatusCode::UNAUTHORIZED, "signature_expired"),
            SignatureError::InvalidSignature => (StatusCode::UNAUTHORIZED, "invalid_signature"),
            SignatureError::InvalidSignatureFormat => {
                (StatusCode::BAD_REQUEST, "invalid_signature_format")
            }
            SignatureError::InvalidExpiryFormat => {
                (StatusCode::BAD_REQUEST, "invalid_expiry_format")
            }
        };
        let message = self.to_string();

        // A bad signature may be probing; expiry is routine
        match &self {
            SignatureError::InvalidSignature => {
                warn!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Media signature rejected: {}",
                    message
                );
            }
            _ => {
                debug!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Media signature rejected: {}",
                    message
                );
            }
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

/// Mints and checks signed `/media/{key}` URLs.
#[derive(Clone)]
pub struct MediaUrlSigner {
    secret_key: Vec<u8>,
    ttl: Duration,
}

impl std::fmt::Debug for MediaUrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaUrlSigner")
            .field("secret_key", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl MediaUrlSigner {
    pub fn new(secret_key: impl AsRef<[u8]>, ttl: Duration) -> Self {
        Self {
            secret_key: secret_key.as_ref().to_vec(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Relative signed URL for a storage key, valid for the configured TTL.
    pub fn url_for(&self, storage_key: &str) -> String {
        self.url_with_expiry(storage_key, unix_now() + self.ttl.as_secs())
    }

    /// Relative signed URL for a storage key with an explicit expiry.
    pub fn url_with_expiry(&self, storage_key: &str, expiry: u64) -> String {
        let path = format!("{}{}", MEDIA_PATH_PREFIX, storage_key);
        let signature = self.compute_signature(&path, expiry);

        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("exp", &expiry.to_string())
            .append_pair("sig", &signature)
            .finish();

        format!("{}?{}", path, query)
    }

    /// Verify a signature for `path` against the current time.
    pub fn verify(&self, path: &str, signature: &str, expiry: u64) -> Result<(), SignatureError> {
        self.verify_at(path, signature, expiry, unix_now())
    }

    /// Verify a signature for `path` as of `now`.
    pub fn verify_at(
        &self,
        path: &str,
        signature: &str,
        expiry: u64,
        now: u64,
    ) -> Result<(), SignatureError> {
        let provided = hex::decode(signature).map_err(|_| SignatureError::InvalidSignatureFormat)?;
        let expected = self.mac(path, expiry);

        if !bool::from(provided.ct_eq(&expected)) {
            return Err(SignatureError::InvalidSignature);
        }

        if now > expiry {
            return Err(SignatureError::Expired {
                expired_at: expiry,
                current_time: now,
            });
        }

        Ok(())
    }

    fn compute_signature(&self, path: &str, expiry: u64) -> String {
        hex::encode(self.mac(path, expiry))
    }

    fn mac(&self, path: &str, expiry: u64) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret_key).expect("HMAC can take key of any size");
        mac.update(MEDIA_DOMAIN.as_bytes());
        mac.update(path.as_bytes());
        mac.update(b"?exp=");
        mac.update(expiry.to_string().as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

/// Axum middleware rejecting `/media/*` requests without a valid signature.
pub async fn media_signature_middleware(
    State(signer): State<MediaUrlSigner>,
    OriginalUri(original_uri): OriginalUri,
    request: Request,
    next: Next,
) -> Result<Response, SignatureError> {
    let query = original_uri.query().unwrap_or("");
    let mut signature: Option<String> = None;
    let mut expiry: Option<u64> = None;

    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "sig" => {
                if signature.is_some() {
                    return Err(SignatureError::InvalidSignatureFormat);
                }
                signature = Some(value.into_owned());
            }
            "exp" => {
                if expiry.is_some() {
                    return Err(SignatureError::InvalidExpiryFormat);
                }
                let parsed = value
                    .parse::<u64>()
                    .map_err(|_| SignatureError::InvalidExpiryFormat)?;
                expiry = Some(parsed);
            }
            _ => {}
        }
    }

    let signature = signature.ok_or(SignatureError::MissingSignature)?;
    let expiry = expiry.ok_or(SignatureError::MissingExpiry)?;

    signer.verify(original_uri.path(), &signature, expiry)?;

    Ok(next.run(request).await)
}
