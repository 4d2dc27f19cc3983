use thiserror::Error;

/// Errors from the content store holding image bytes
#[derive(Debug, Clone, Error)]
pub enum ContentError {
    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Local filesystem error
    #[error("I/O error: {0}")]
    Io(String),

    /// Object not found
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Storage key contains characters outside the generated key alphabet
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

/// Reasons an upload is rejected by the media policy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    /// Upload carried no bytes
    #[error("Upload is empty")]
    Empty,

    /// Upload exceeds the configured maximum size (should map to HTTP 413)
    #[error("Upload too large: {size} bytes (maximum is {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    /// Content type is not on the allow-list (should map to HTTP 415)
    #[error("Unsupported media type: {content_type}")]
    UnsupportedType { content_type: String },

    /// Declared content type disagrees with the sniffed content
    #[error("Declared type {declared} does not match detected type {detected}")]
    ContentMismatch { declared: String, detected: String },
}

/// Errors from the ownership-scoped stores and the credential store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Resource is absent or owned by someone else
    #[error("Resource not found")]
    NotFound,

    /// Gallery slug is held by another user
    #[error("Gallery slug '{slug}' is already taken")]
    SlugConflict { slug: String },

    /// Gallery slug fails the URL-safe format rules
    #[error("Invalid gallery slug: {reason}")]
    InvalidSlug { reason: String },

    /// Upload rejected by the media policy
    #[error("Invalid media: {0}")]
    InvalidMedia(#[from] MediaError),

    /// Username is already registered
    #[error("Username '{0}' is already registered")]
    UsernameTaken(String),

    /// Unknown username or wrong password
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Request field fails validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Content store failure
    #[error("Content storage error: {0}")]
    Content(#[from] ContentError),

    /// Database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Password hashing failure
    #[error("Password hashing error: {0}")]
    PasswordHash(String),
}

/// Errors from the third-party token verifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExternalError {
    /// The caller-supplied token was rejected upstream (not retried)
    #[error("External token is invalid or revoked")]
    InvalidToken,

    /// Upstream failed transiently; says nothing about the token
    #[error("External service unavailable: {0}")]
    Unavailable(String),
}

/// Session token verification failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Signature does not verify or the token is malformed
    #[error("Invalid session token")]
    Invalid,

    /// Token is past its expiry
    #[error("Session token expired at {expired_at} (current time: {current_time})")]
    Expired { expired_at: u64, current_time: u64 },
}
