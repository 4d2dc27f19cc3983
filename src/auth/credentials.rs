//! User accounts and password verification.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::password::{hash_password, verify_password};
use super::UserId;
use crate::error::StoreError;
use crate::store::{is_unique_violation, User};

/// Minimum username length.
pub const MIN_USERNAME_LEN: usize = 3;

/// Maximum username length.
pub const MAX_USERNAME_LEN: usize = 64;

/// Minimum password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Maximum password length (bounds hashing cost per request).
pub const MAX_PASSWORD_LEN: usize = 256;

const USER_COLUMNS: &str = "id, username, password_hash, created_at";

/// Persists users and their password hashes.
#[derive(Clone)]
pub struct CredentialStore {
    pool: SqlitePool,
}

impl CredentialStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an account. Usernames are unique, case-insensitively.
    pub async fn register(&self, username: &str, password: &str) -> Result<User, StoreError> {
        let username = username.trim();
        validate_username(username)?;
        validate_password(password)?;

        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| StoreError::PasswordHash(e.to_string()))??;

        let result = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, password_hash, created_at) VALUES (?, ?, ?) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(username)
        .bind(&password_hash)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => {
                info!(user_id = %user.id, username = %user.username, "Registered user");
                Ok(user)
            }
            Err(e) if is_unique_violation(&e) => {
                Err(StoreError::UsernameTaken(username.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Check a username/password pair.
    ///
    /// Unknown usernames and wrong passwords fail identically.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = ?",
            USER_COLUMNS
        ))
        .bind(username.trim())
        .fetch_optional(&self.pool)
        .await?;

        let Some(user) = user else {
            debug!("Login attempt for unknown username");
            return Err(StoreError::InvalidCredentials);
        };

        let hash = user.password_hash.clone();
        let password = password.to_string();
        let valid = tokio::task::spawn_blocking(move || verify_password(&hash, &password))
            .await
            .map_err(|e| StoreError::PasswordHash(e.to_string()))?;

        if valid {
            Ok(user)
        } else {
            debug!(user_id = %user.id, "Login attempt with wrong password");
            Err(StoreError::InvalidCredentials)
        }
    }

    /// Look up a user by id.
    pub async fn find(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = ?",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Whether a user with this id still exists.
    pub async fn exists(&self, id: UserId) -> Result<bool, StoreError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// Delete an account together with its config and images.
    ///
    /// Returns the storage keys of the removed images so their content can be
    /// discarded once the rows are gone.
    pub async fn delete(&self, id: UserId) -> Result<Vec<String>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Write first so the transaction holds the write lock before any read
        let keys: Vec<String> =
            sqlx::query_scalar("DELETE FROM images WHERE owner_id = ? RETURNING storage_key")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;

        let deleted = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        tx.commit().await?;
        info!(user_id = %id, images = keys.len(), "Deleted user");
        Ok(keys)
    }
}

fn validate_username(username: &str) -> Result<(), StoreError> {
    let len = username.chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err(StoreError::InvalidInput(format!(
            "username must be between {} and {} characters",
            MIN_USERNAME_LEN, MAX_USERNAME_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '@'))
    {
        return Err(StoreError::InvalidInput(
            "username may only contain letters, digits and _ - . @".to_string(),
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), StoreError> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(StoreError::InvalidInput(format!(
            "password must be between {} and {} characters",
            MIN_PASSWORD_LEN, MAX_PASSWORD_LEN
        )));
    }
    Ok(())
}
