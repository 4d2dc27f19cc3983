//! # pic-host
//!
//! A small personal image-hosting backend. Users authenticate, keep a
//! per-user configuration (including a GitHub token used to browse their
//! repositories), upload images, and publish a subset of them as a public
//! gallery reachable by a human-readable slug.
//!
//! ## Features
//!
//! - **Session tokens**: stateless HMAC-SHA256 bearer tokens with expiry
//! - **Ownership scoping**: every config and image query is bound to its owner
//! - **Public galleries**: slug-addressed, read-only, published images only
//! - **Signed media URLs**: image bytes are served only through expiring URLs
//! - **Pluggable content storage**: local directory or S3-compatible bucket
//!
//! ## Architecture
//!
//! - [`auth`] - User ids, password hashing, credential store and session tokens
//! - [`store`] - SQLite schema, ownership-scoped resources and gallery resolution
//! - [`media`] - Content store trait, local and S3 backends, upload policy
//! - [`github`] - GitHub token verification with retry
//! - [`server`] - Axum routes, Auth Gate, handlers and graceful shutdown
//! - [`config`] - CLI and environment configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use pic_host::{
//!     create_router, AppState, GitHubClient, LocalContentStore, MediaPolicy, MediaUrlSigner,
//!     RouterConfig, TokenService,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = pic_host::store::connect("sqlite://pic-host.db", 8).await?;
//! let state = AppState::new(
//!     pool,
//!     Arc::new(LocalContentStore::new("./data/media")),
//!     MediaPolicy::default(),
//!     TokenService::new("a-long-random-secret", Duration::from_secs(24 * 3600)),
//!     MediaUrlSigner::new("a-long-random-secret", Duration::from_secs(3600)),
//!     Arc::new(GitHubClient::new("https://api.github.com")?),
//! );
//!
//! let router = create_router(state, RouterConfig::default());
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:9090").await?;
//! axum::serve(listener, router).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod github;
pub mod media;
pub mod server;
pub mod store;

// Re-export commonly used types
pub use auth::{CredentialStore, IssuedToken, TokenService, UserId};
pub use config::{Config, StorageBackend};
pub use error::{ContentError, ExternalError, MediaError, StoreError, TokenError};
pub use github::{GitHubClient, Repository, RepositoryVerifier};
pub use media::{ContentStore, LocalContentStore, MediaPolicy, S3ContentStore};
pub use server::{
    create_router, AppState, AuthUser, MediaUrlSigner, RouterConfig, ShutdownOutcome, API_ROUTES,
};
pub use store::{GalleryResolver, GalleryView, OwnedResources, ResourceStore};
