//! SQLite schema, applied idempotently at startup.
//!
//! Ownership and uniqueness invariants live here rather than in application code:
//! - `configs.gallery_slug` is `UNIQUE`, so two users can never hold one slug
//! - `configs` and `images` cascade on user deletion
//! - image creation order is the `AUTOINCREMENT` id

pub(crate) const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        username      TEXT    NOT NULL UNIQUE COLLATE NOCASE,
        password_hash TEXT    NOT NULL,
        created_at    TEXT    NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS configs (
        user_id             INTEGER PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
        github_token        TEXT,
        github_repo         TEXT,
        github_branch       TEXT,
        gallery_slug        TEXT    UNIQUE,
        gallery_enabled     INTEGER NOT NULL DEFAULT 0,
        gallery_title       TEXT,
        gallery_description TEXT,
        updated_at          TEXT    NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS images (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        storage_key  TEXT    NOT NULL UNIQUE,
        filename     TEXT    NOT NULL,
        content_type TEXT    NOT NULL,
        size_bytes   INTEGER NOT NULL,
        title        TEXT,
        published    INTEGER NOT NULL DEFAULT 0,
        created_at   TEXT    NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_images_owner ON images (owner_id, id)",
    "CREATE INDEX IF NOT EXISTS idx_images_published ON images (owner_id, published, id)",
];
