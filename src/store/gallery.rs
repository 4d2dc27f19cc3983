//! Public, read-only gallery lookup.

use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use super::models::{GalleryImage, GalleryView};
use super::slug::normalize_slug;
use crate::auth::UserId;
use crate::error::StoreError;

#[derive(FromRow)]
struct PublishedGallery {
    user_id: UserId,
    gallery_slug: String,
    gallery_title: Option<String>,
    gallery_description: Option<String>,
}

/// Resolves a slug to its published gallery.
///
/// Takes no caller identity: the only data reachable here is data its owner
/// explicitly published.
#[derive(Clone)]
pub struct GalleryResolver {
    pool: SqlitePool,
}

impl GalleryResolver {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Look up the gallery published under `slug`.
    ///
    /// Malformed, unknown and disabled slugs all fail with the same
    /// [`StoreError::NotFound`].
    pub async fn resolve(&self, slug: &str) -> Result<GalleryView, StoreError> {
        let slug = match normalize_slug(Some(slug)) {
            Ok(Some(slug)) => slug,
            _ => return Err(StoreError::NotFound),
        };

        // One read transaction, so the config and its images come from the
        // same snapshot
        let mut tx = self.pool.begin().await?;

        let gallery = sqlx::query_as::<_, PublishedGallery>(
            "SELECT user_id, gallery_slug, gallery_title, gallery_description
             FROM configs
             WHERE gallery_slug = ? AND gallery_enabled = 1",
        )
        .bind(&slug)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            debug!(slug = %slug, "No published gallery for slug");
            StoreError::NotFound
        })?;

        let images = sqlx::query_as::<_, GalleryImage>(
            "SELECT id, storage_key, filename, content_type, title, created_at
             FROM images
             WHERE owner_id = ? AND published = 1
             ORDER BY id ASC",
        )
        .bind(gallery.user_id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(GalleryView {
            slug: gallery.gallery_slug,
            title: gallery.gallery_title,
            description: gallery.gallery_description,
            images,
        })
    }
}
