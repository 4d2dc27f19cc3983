//! Relational storage for users, configs and images.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      HTTP handlers                      │
//! └───────────────┬───────────────────────────┬─────────────┘
//!                 │ owned_by(user)            │ resolve(slug)
//!                 ▼                           ▼
//! ┌───────────────────────────────┐ ┌───────────────────────┐
//! │ ResourceStore / OwnedResources│ │    GalleryResolver    │
//! │  (every query bound to owner) │ │ (published data only) │
//! └───────────────┬───────────────┘ └───────────┬───────────┘
//!                 │                             │
//!                 ▼                             ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                SQLite (sqlx::SqlitePool)                │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The raw pool is never handed to request code; Config and Image rows are
//! only reachable through [`ResourceStore::owned_by`], which takes the caller's
//! [`UserId`](crate::auth::UserId).

mod gallery;
mod models;
mod resources;
mod schema;
mod slug;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::debug;

pub use gallery::GalleryResolver;
pub use models::{
    ConfigUpdate, GalleryImage, GalleryView, ImageRecord, ImageUpdate, NewImage, User, UserConfig,
};
pub use resources::{OwnedResources, ResourceStore};
pub use slug::{normalize_slug, validate_slug, MAX_SLUG_LEN, MIN_SLUG_LEN};

/// Default number of pooled SQLite connections.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 8;

/// How long a writer waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (creating if needed) the database at `database_url` and apply the schema.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

/// Open a private in-memory database.
///
/// An in-memory SQLite database lives and dies with its connection, so the
/// pool is pinned to a single connection that is never recycled.
pub async fn connect_in_memory() -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

/// Apply the schema. Safe to run repeatedly.
pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in schema::SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    debug!(statements = schema::SCHEMA.len(), "Schema applied");
    Ok(())
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}
