//! Image content storage and upload policy.
//!
//! Image bytes live outside the database behind the [`ContentStore`] trait,
//! addressed by random keys of the form `{uuid}.{ext}`. The relational store
//! only keeps the key.
//!
//! ```text
//! upload ──► MediaPolicy::validate ──► ContentStore::put(key) ──► INSERT images
//!                (type, size)            (local dir or S3)
//! ```

mod local;
mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use image::ImageFormat;

use crate::error::{ContentError, MediaError};

pub use local::LocalContentStore;
pub use s3::{create_s3_client, S3ContentStore};

/// Default maximum upload size (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Content types accepted for upload.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Longest storage key accepted from a request path.
const MAX_KEY_LEN: usize = 128;

// =============================================================================
// Content Store
// =============================================================================

/// Byte storage for uploaded images.
///
/// Implementations must treat keys as opaque, but may assume they passed
/// [`is_valid_storage_key`].
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store `data` under `key`, replacing anything already there.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), ContentError>;

    /// Fetch the bytes stored under `key`.
    async fn get(&self, key: &str) -> Result<Bytes, ContentError>;

    /// Remove `key`. Removing a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), ContentError>;

    /// Human-readable location for logs (e.g. `s3://bucket/prefix`).
    fn identifier(&self) -> String;
}

/// Generate a fresh random storage key for the given content type.
pub fn new_storage_key(content_type: &str) -> String {
    let ext = extension_for(content_type).unwrap_or("bin");
    format!("{}.{}", uuid::Uuid::new_v4().simple(), ext)
}

/// Whether `key` has the shape of a generated storage key.
///
/// Keys arrive from request paths, so this is also the path traversal guard
/// for filesystem-backed stores.
pub fn is_valid_storage_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && !key.starts_with('.')
        && !key.contains("..")
        && key
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'.' || b == b'-')
}

/// File extension used for a canonical content type.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Content type implied by a storage key's extension.
pub fn content_type_for_key(key: &str) -> &'static str {
    match key.rsplit_once('.').map(|(_, ext)| ext) {
        Some("jpg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

// =============================================================================
// Upload Policy
// =============================================================================

/// Allow-list and size limit applied to every upload.
#[derive(Debug, Clone)]
pub struct MediaPolicy {
    max_bytes: u64,
}

impl Default for MediaPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UPLOAD_BYTES)
    }
}

impl MediaPolicy {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Validate an upload and return its canonical content type.
    ///
    /// The type is sniffed from the magic bytes; a declared type, if any, must
    /// be on the allow-list and agree with what was sniffed.
    pub fn validate(
        &self,
        declared: Option<&str>,
        data: &[u8],
    ) -> Result<&'static str, MediaError> {
        if data.is_empty() {
            return Err(MediaError::Empty);
        }

        let size = data.len() as u64;
        if size > self.max_bytes {
            return Err(MediaError::TooLarge {
                size,
                max: self.max_bytes,
            });
        }

        let declared = declared.and_then(canonical_content_type);
        if let Some(ref declared) = declared {
            if !ALLOWED_CONTENT_TYPES.contains(&declared.as_str()) {
                return Err(MediaError::UnsupportedType {
                    content_type: declared.clone(),
                });
            }
        }

        let detected = sniff_content_type(data).ok_or_else(|| MediaError::UnsupportedType {
            content_type: declared.clone().unwrap_or_else(|| "unknown".to_string()),
        })?;

        match declared {
            Some(declared) if declared != detected => Err(MediaError::ContentMismatch {
                declared,
                detected: detected.to_string(),
            }),
            _ => Ok(detected),
        }
    }
}

/// Normalise a declared content type; generic or blank types count as undeclared.
fn canonical_content_type(raw: &str) -> Option<String> {
    let essence = raw.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match essence.as_str() {
        "" | "application/octet-stream" => None,
        "image/jpg" | "image/pjpeg" => Some("image/jpeg".to_string()),
        _ => Some(essence),
    }
}

fn sniff_content_type(data: &[u8]) -> Option<&'static str> {
    match image::guess_format(data).ok()? {
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::WebP => Some("image/webp"),
        _ => None,
    }
}
