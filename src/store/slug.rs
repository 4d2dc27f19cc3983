//! Gallery slug rules.
//!
//! A slug is lowercase ASCII letters, digits and single hyphens, between
//! [`MIN_SLUG_LEN`] and [`MAX_SLUG_LEN`] characters, and never starts or ends
//! with a hyphen.

use crate::error::StoreError;

/// Minimum slug length.
pub const MIN_SLUG_LEN: usize = 3;

/// Maximum slug length.
pub const MAX_SLUG_LEN: usize = 64;

/// Slugs that collide with static API paths under `/api/gallery/`.
const RESERVED_SLUGS: &[&str] = &["check-slug"];

/// Trim and lowercase a requested slug. Blank input means "no slug".
pub fn normalize_slug(raw: Option<&str>) -> Result<Option<String>, StoreError> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    let slug = raw.trim().to_ascii_lowercase();
    if slug.is_empty() {
        return Ok(None);
    }

    validate_slug(&slug)?;
    Ok(Some(slug))
}

/// Check an already-normalised slug against the format rules.
pub fn validate_slug(slug: &str) -> Result<(), StoreError> {
    let invalid = |reason: &str| {
        Err(StoreError::InvalidSlug {
            reason: reason.to_string(),
        })
    };

    if slug.len() < MIN_SLUG_LEN || slug.len() > MAX_SLUG_LEN {
        return invalid(&format!(
            "must be between {} and {} characters",
            MIN_SLUG_LEN, MAX_SLUG_LEN
        ));
    }
    if !slug
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return invalid("may only contain lowercase letters, digits and hyphens");
    }
    if slug.starts_with('-') || slug.ends_with('-') || slug.contains("--") {
        return invalid("hyphens must separate letters or digits");
    }
    if RESERVED_SLUGS.contains(&slug) {
        return invalid("this slug is reserved");
    }

    Ok(())
}
