//! Row types and write requests for the relational store.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::auth::UserId;

/// A registered account.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Per-user integration and gallery settings. At most one row per user.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct UserConfig {
    pub user_id: UserId,
    pub github_token: Option<String>,
    pub github_repo: Option<String>,
    pub github_branch: Option<String>,
    pub gallery_slug: Option<String>,
    pub gallery_enabled: bool,
    pub gallery_title: Option<String>,
    pub gallery_description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted by a config save.
///
/// `github_token`: `None` keeps the stored token, an empty string clears it.
/// Every other field replaces the stored value.
#[derive(Debug, Clone, Default)]
pub struct ConfigUpdate {
    pub github_token: Option<String>,
    pub github_repo: Option<String>,
    pub github_branch: Option<String>,
    pub gallery_slug: Option<String>,
    pub gallery_enabled: bool,
    pub gallery_title: Option<String>,
    pub gallery_description: Option<String>,
}

/// A stored image. The owner is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ImageRecord {
    pub id: i64,
    pub owner_id: UserId,
    pub storage_key: String,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub title: Option<String>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
}

/// An upload waiting for policy checks.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub filename: String,
    pub declared_content_type: Option<String>,
    pub title: Option<String>,
    pub published: bool,
    pub data: Bytes,
}

/// Partial image update; `None` leaves the field untouched, an empty title clears it.
#[derive(Debug, Clone, Default)]
pub struct ImageUpdate {
    pub published: Option<bool>,
    pub title: Option<String>,
}

/// An image as it appears in a public gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct GalleryImage {
    pub id: i64,
    #[serde(skip)]
    pub storage_key: String,
    pub filename: String,
    pub content_type: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Read-only public projection of a published gallery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryView {
    pub slug: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub images: Vec<GalleryImage>,
}
