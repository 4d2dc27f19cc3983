//! HTTP server layer for pic-host.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           HTTP Layer                            │
//! │                                                                 │
//! │  ┌──────────┐  ┌──────────────┐  ┌────────────┐  ┌───────────┐  │
//! │  │  routes  │  │     auth     │  │ signed_url │  │ handlers  │  │
//! │  │ (table)  │  │ (Auth Gate)  │  │  (/media)  │  │ (JSON API)│  │
//! │  └──────────┘  └──────────────┘  └────────────┘  └───────────┘  │
//! │                                                                 │
//! │  shutdown: signal handling and bounded drain                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod handlers;
pub mod routes;
pub mod shutdown;
pub mod signed_url;

pub use auth::{require_auth, AuthError, AuthUser};
pub use handlers::{ApiError, AppState, ErrorResponse};
pub use routes::{create_router, Access, ApiRoute, Endpoint, RouterConfig, Verb, API_ROUTES};
pub use shutdown::{serve, shutdown_signal, ShutdownOutcome};
pub use signed_url::{media_signature_middleware, MediaUrlSigner, SignatureError};
