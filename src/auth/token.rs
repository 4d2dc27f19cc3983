//! Signed session tokens.
//!
//! Tokens are HMAC-SHA256 signed claims binding a user id to an expiry time.
//! Nothing is persisted: verification needs only the process-wide secret.
//!
//! # Token Format
//!
//! ```text
//! token     = "{user_id}.{expiry}.{signature}"
//! signature = hex(HMAC-SHA256(secret_key, "session:{user_id}.{expiry}"))
//! ```
//!
//! # Security Properties
//!
//! - **Tamper detection**: the signature is checked before the expiry, so any
//!   modified byte yields [`TokenError::Invalid`]
//! - **Time-limited**: tokens expire after a configurable TTL; there is no
//!   revocation before expiry
//! - **Constant-time comparison**: signatures are compared with `subtle`
//!
//! # Example
//!
//! ```rust
//! use pic_host::auth::{TokenService, UserId};
//! use std::time::Duration;
//!
//! let tokens = TokenService::new("my-secret-key", Duration::from_secs(3600));
//! let issued = tokens.issue(UserId::new(42));
//!
//! assert_eq!(tokens.verify(&issued.token).unwrap(), UserId::new(42));
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use subtle::ConstantTimeEq;

use super::UserId;
use crate::error::TokenError;

/// Default session lifetime (24 hours)
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Domain separator so session signatures can never be replayed as media URL signatures
const SESSION_DOMAIN: &str = "session:";

type HmacSha256 = Hmac<sha2::Sha256>;

/// A freshly issued token with its expiry (Unix epoch seconds).
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: u64,
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct TokenService {
    secret_key: Vec<u8>,
    ttl: Duration,
}

impl TokenService {
    /// Create a token service with the given secret and token lifetime.
    pub fn new(secret_key: impl AsRef<[u8]>, ttl: Duration) -> Self {
        Self {
            secret_key: secret_key.as_ref().to_vec(),
            ttl,
        }
    }

    /// Lifetime of issued tokens.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `user` expiring `ttl` from now.
    pub fn issue(&self, user: UserId) -> IssuedToken {
        let expires_at = unix_now() + self.ttl.as_secs();
        IssuedToken {
            token: self.issue_with_expiry(user, expires_at),
            expires_at,
        }
    }

    /// Issue a token with an explicit expiry timestamp.
    pub fn issue_with_expiry(&self, user: UserId, expiry: u64) -> String {
        let claims = format!("{}.{}", user, expiry);
        let signature = self.compute_signature(&claims);
        format!("{}.{}", claims, signature)
    }

    /// Verify a token against the current time.
    pub fn verify(&self, token: &str) -> Result<UserId, TokenError> {
        self.verify_at(token, unix_now())
    }

    /// Verify a token as of `current_time` (Unix epoch seconds).
    pub fn verify_at(&self, token: &str, current_time: u64) -> Result<UserId, TokenError> {
        let mut parts = token.split('.');
        let (Some(user_part), Some(expiry_part), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Invalid);
        };

        let provided_sig = hex::decode(signature).map_err(|_| TokenError::Invalid)?;
        let claims = &token[..user_part.len() + 1 + expiry_part.len()];
        let expected_sig = self.compute_mac(claims);

        if !bool::from(provided_sig.ct_eq(&expected_sig)) {
            return Err(TokenError::Invalid);
        }

        // Signature covers both fields, but a signer bug must still not yield garbage ids
        let user_id: i64 = user_part.parse().map_err(|_| TokenError::Invalid)?;
        let expiry: u64 = expiry_part.parse().map_err(|_| TokenError::Invalid)?;

        if current_time > expiry {
            return Err(TokenError::Expired {
                expired_at: expiry,
                current_time,
            });
        }

        Ok(UserId::new(user_id))
    }

    fn compute_signature(&self, claims: &str) -> String {
        hex::encode(self.compute_mac(claims))
    }

    fn compute_mac(&self, claims: &str) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret_key).expect("HMAC can take key of any size");
        mac.update(SESSION_DOMAIN.as_bytes());
        mac.update(claims.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("secret_key", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
