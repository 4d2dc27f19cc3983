//! Identity layer: user ids, password hashing, the credential store and
//! signed session tokens.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐      ┌──────────────────────┐
//! │   CredentialStore    │      │     TokenService     │
//! │ (users + argon2 PHC) │      │ (HMAC session token) │
//! └──────────┬───────────┘      └──────────┬───────────┘
//!            │  register / authenticate    │ issue / verify
//!            └──────────────┬──────────────┘
//!                           ▼
//!                 server::auth (Auth Gate)
//! ```

mod credentials;
mod password;
mod token;

use serde::{Deserialize, Serialize};

pub use credentials::{
    CredentialStore, MAX_PASSWORD_LEN, MAX_USERNAME_LEN, MIN_PASSWORD_LEN, MIN_USERNAME_LEN,
};
pub use password::{hash_password, verify_password};
pub use token::{IssuedToken, TokenService, DEFAULT_TOKEN_TTL};

pub(crate) use token::unix_now;

/// Database identifier of a user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct UserId(i64);

impl UserId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
