//! Ownership-scoped access to configs and images.
//!
//! [`ResourceStore`] holds the pool privately. Request code gets at per-user
//! rows only through [`ResourceStore::owned_by`], and every statement issued by
//! [`OwnedResources`] carries the owner in its `WHERE` clause (or `VALUES`, for
//! inserts). A row that exists but belongs to someone else is reported exactly
//! like a row that does not exist.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use super::models::{ConfigUpdate, ImageRecord, ImageUpdate, NewImage, UserConfig};
use super::slug::normalize_slug;
use super::{is_foreign_key_violation, is_unique_violation};
use crate::auth::UserId;
use crate::error::StoreError;
use crate::media::{extension_for, new_storage_key, ContentStore, MediaPolicy};

const CONFIG_COLUMNS: &str = "user_id, github_token, github_repo, github_branch, gallery_slug, \
     gallery_enabled, gallery_title, gallery_description, updated_at";

const IMAGE_COLUMNS: &str =
    "id, owner_id, storage_key, filename, content_type, size_bytes, title, published, created_at";

/// Longest filename kept from an upload.
const MAX_FILENAME_LEN: usize = 255;

/// Entry point to per-user Config and Image records.
#[derive(Clone)]
pub struct ResourceStore {
    pool: SqlitePool,
    content: Arc<dyn ContentStore>,
    policy: MediaPolicy,
}

impl ResourceStore {
    pub fn new(pool: SqlitePool, content: Arc<dyn ContentStore>, policy: MediaPolicy) -> Self {
        Self {
            pool,
            content,
            policy,
        }
    }

    /// Scope all further access to `owner`'s records.
    pub fn owned_by(&self, owner: UserId) -> OwnedResources<'_> {
        OwnedResources { store: self, owner }
    }

    pub fn policy(&self) -> &MediaPolicy {
        &self.policy
    }

    /// Whether `slug` is free for `requester` to claim.
    ///
    /// Slugs are a global namespace, so this reads across owners; a slug the
    /// requester already holds counts as available to them.
    pub async fn check_slug_available(
        &self,
        slug: &str,
        requester: UserId,
    ) -> Result<bool, StoreError> {
        let slug = normalize_slug(Some(slug))?.ok_or_else(|| StoreError::InvalidSlug {
            reason: "slug must not be empty".to_string(),
        })?;

        let holder: Option<UserId> =
            sqlx::query_scalar("SELECT user_id FROM configs WHERE gallery_slug = ?")
                .bind(&slug)
                .fetch_optional(&self.pool)
                .await?;

        Ok(holder.map_or(true, |holder| holder == requester))
    }

    /// Read content for a key the caller was authorised to see (via a signed URL).
    pub async fn read_content(&self, key: &str) -> Result<Bytes, StoreError> {
        Ok(self.content.get(key).await?)
    }

    /// Best-effort removal of content whose rows are already gone.
    pub async fn discard_content(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.content.delete(key).await {
                warn!(key = %key, error = %e, "Failed to remove orphaned content");
            }
        }
    }
}

/// Config and Image operations bound to one owner.
pub struct OwnedResources<'a> {
    store: &'a ResourceStore,
    owner: UserId,
}

impl OwnedResources<'_> {
    pub fn owner(&self) -> UserId {
        self.owner
    }

    // =========================================================================
    // Config
    // =========================================================================

    /// The owner's config, if one was ever saved.
    pub async fn get_config(&self) -> Result<Option<UserConfig>, StoreError> {
        let config = sqlx::query_as::<_, UserConfig>(&format!(
            "SELECT {} FROM configs WHERE user_id = ?",
            CONFIG_COLUMNS
        ))
        .bind(self.owner)
        .fetch_optional(&self.store.pool)
        .await?;
        Ok(config)
    }

    /// Insert or replace the owner's config.
    ///
    /// The slug's uniqueness is enforced by the database in the same statement
    /// as the write: a slug held by another user fails with
    /// [`StoreError::SlugConflict`] and nothing is written.
    pub async fn save_config(&self, update: ConfigUpdate) -> Result<UserConfig, StoreError> {
        let slug = normalize_slug(update.gallery_slug.as_deref())?;
        if update.gallery_enabled && slug.is_none() {
            return Err(StoreError::InvalidSlug {
                reason: "a slug is required to publish the gallery".to_string(),
            });
        }

        // An absent token keeps the stored one; resolved inside the upsert so
        // the save stays a single write statement.
        let keep_token = update.github_token.is_none();
        let github_token = non_empty(update.github_token);

        let result = sqlx::query_as::<_, UserConfig>(&format!(
            "INSERT INTO configs ({cols}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (user_id) DO UPDATE SET
                 github_token = CASE WHEN ?10 THEN configs.github_token
                                     ELSE excluded.github_token END,
                 github_repo = excluded.github_repo,
                 github_branch = excluded.github_branch,
                 gallery_slug = excluded.gallery_slug,
                 gallery_enabled = excluded.gallery_enabled,
                 gallery_title = excluded.gallery_title,
                 gallery_description = excluded.gallery_description,
                 updated_at = excluded.updated_at
             RETURNING {cols}",
            cols = CONFIG_COLUMNS
        ))
        .bind(self.owner)
        .bind(github_token)
        .bind(non_empty(update.github_repo))
        .bind(non_empty(update.github_branch))
        .bind(&slug)
        .bind(update.gallery_enabled)
        .bind(non_empty(update.gallery_title))
        .bind(non_empty(update.gallery_description))
        .bind(Utc::now())
        .bind(keep_token)
        .fetch_one(&self.store.pool)
        .await;

        let config = match result {
            Ok(config) => config,
            Err(e) if is_unique_violation(&e) => {
                debug!(user_id = %self.owner, "Gallery slug already held by another user");
                return Err(StoreError::SlugConflict {
                    slug: slug.unwrap_or_default(),
                });
            }
            Err(e) if is_foreign_key_violation(&e) => return Err(StoreError::NotFound),
            Err(e) => return Err(e.into()),
        };

        info!(
            user_id = %self.owner,
            slug = config.gallery_slug.as_deref().unwrap_or(""),
            gallery_enabled = config.gallery_enabled,
            "Saved config"
        );
        Ok(config)
    }

    // =========================================================================
    // Images
    // =========================================================================

    /// Validate, store and record an upload for the owner.
    pub async fn upload_image(&self, upload: NewImage) -> Result<ImageRecord, StoreError> {
        let content_type = self
            .store
            .policy
            .validate(upload.declared_content_type.as_deref(), &upload.data)?;

        let storage_key = new_storage_key(content_type);
        let size_bytes = upload.data.len() as i64;
        let filename = sanitize_filename(&upload.filename, content_type);

        self.store
            .content
            .put(&storage_key, upload.data, content_type)
            .await?;

        let inserted = sqlx::query_as::<_, ImageRecord>(&format!(
            "INSERT INTO images
                 (owner_id, storage_key, filename, content_type, size_bytes, title, published, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {}",
            IMAGE_COLUMNS
        ))
        .bind(self.owner)
        .bind(&storage_key)
        .bind(&filename)
        .bind(content_type)
        .bind(size_bytes)
        .bind(non_empty(upload.title))
        .bind(upload.published)
        .bind(Utc::now())
        .fetch_one(&self.store.pool)
        .await;

        match inserted {
            Ok(image) => {
                info!(
                    user_id = %self.owner,
                    image_id = image.id,
                    content_type = content_type,
                    bytes = size_bytes,
                    "Uploaded image"
                );
                Ok(image)
            }
            Err(e) => {
                self.store.discard_content(&[storage_key]).await;
                if is_foreign_key_violation(&e) {
                    debug!(user_id = %self.owner, "Upload raced with account deletion");
                    return Err(StoreError::NotFound);
                }
                Err(e.into())
            }
        }
    }

    /// The owner's images, newest first.
    pub async fn list_images(&self) -> Result<Vec<ImageRecord>, StoreError> {
        let images = sqlx::query_as::<_, ImageRecord>(&format!(
            "SELECT {} FROM images WHERE owner_id = ? ORDER BY id DESC",
            IMAGE_COLUMNS
        ))
        .bind(self.owner)
        .fetch_all(&self.store.pool)
        .await?;
        Ok(images)
    }

    /// One of the owner's images.
    pub async fn get_image(&self, image_id: i64) -> Result<ImageRecord, StoreError> {
        sqlx::query_as::<_, ImageRecord>(&format!(
            "SELECT {} FROM images WHERE id = ? AND owner_id = ?",
            IMAGE_COLUMNS
        ))
        .bind(image_id)
        .bind(self.owner)
        .fetch_optional(&self.store.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    /// Change the published flag and/or title of one of the owner's images.
    pub async fn update_image(
        &self,
        image_id: i64,
        update: ImageUpdate,
    ) -> Result<ImageRecord, StoreError> {
        let title = update.title.map(|t| t.trim().to_string());

        let image = sqlx::query_as::<_, ImageRecord>(&format!(
            "UPDATE images SET
                 published = COALESCE(?1, published),
                 title = CASE WHEN ?2 IS NULL THEN title ELSE NULLIF(?2, '') END
             WHERE id = ?3 AND owner_id = ?4
             RETURNING {}",
            IMAGE_COLUMNS
        ))
        .bind(update.published)
        .bind(title)
        .bind(image_id)
        .bind(self.owner)
        .fetch_optional(&self.store.pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        debug!(
            user_id = %self.owner,
            image_id = image.id,
            published = image.published,
            "Updated image"
        );
        Ok(image)
    }

    /// Delete one of the owner's images and its content.
    ///
    /// The ownership check and the delete are a single statement, so a
    /// concurrent delete by the owner cannot slip between them.
    pub async fn delete_image(&self, image_id: i64) -> Result<(), StoreError> {
        let storage_key: Option<String> = sqlx::query_scalar(
            "DELETE FROM images WHERE id = ? AND owner_id = ? RETURNING storage_key",
        )
        .bind(image_id)
        .bind(self.owner)
        .fetch_optional(&self.store.pool)
        .await?;

        let storage_key = storage_key.ok_or(StoreError::NotFound)?;
        self.store.discard_content(&[storage_key]).await;

        info!(user_id = %self.owner, image_id = image_id, "Deleted image");
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Keep only the final path component of a client filename, bounded in length.
fn sanitize_filename(raw: &str, content_type: &str) -> String {
    let base = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_FILENAME_LEN)
        .collect::<String>();

    if base.is_empty() || base == "." || base == ".." {
        format!("upload.{}", extension_for(content_type).unwrap_or("bin"))
    } else {
        base
    }
}
