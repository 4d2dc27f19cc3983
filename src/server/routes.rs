//! Router configuration for pic-host.
//!
//! Every API endpoint is declared once in [`API_ROUTES`], with its access
//! level. The router is built from that table at startup: authenticated
//! routes are grouped behind the Auth Gate with `route_layer`, so a route
//! cannot be marked authenticated and still be reached without a token.
//!
//! # Route Structure
//!
//! ```text
//! /api/...         - JSON API (see API_ROUTES), JSON 404 for unknown paths
//! /media/{key}     - Image bytes (signed URL)
//! /*               - SPA static files, falling back to index.html
//! ```

use std::path::PathBuf;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, patch, post, MethodRouter},
    Router,
};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::auth::require_auth;
use super::handlers::{
    api_not_found_handler, check_slug_handler, delete_account_handler, delete_image_handler,
    gallery_handler, get_config_handler, github_repos_handler, health_handler,
    list_images_handler, login_handler, media_handler, me_handler, register_handler,
    save_config_handler, update_image_handler, upload_handler, verify_github_token_handler,
    AppState,
};
use super::signed_url::media_signature_middleware;
use crate::config::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::media::DEFAULT_MAX_UPLOAD_BYTES;

/// Room for multipart boundaries and text fields on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

// =============================================================================
// Route Table
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Patch,
    Delete,
}

/// Who may call a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    /// Behind the Auth Gate
    Authenticated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Health,
    Login,
    Register,
    Me,
    DeleteAccount,
    Gallery,
    GithubRepos,
    VerifyGithubToken,
    SaveConfig,
    GetConfig,
    CheckSlug,
    Upload,
    ListImages,
    UpdateImage,
    DeleteImage,
}

/// One row of the API route table. Paths are relative to `/api`.
#[derive(Debug, Clone, Copy)]
pub struct ApiRoute {
    pub verb: Verb,
    pub path: &'static str,
    pub access: Access,
    pub endpoint: Endpoint,
}

const fn route(verb: Verb, path: &'static str, access: Access, endpoint: Endpoint) -> ApiRoute {
    ApiRoute {
        verb,
        path,
        access,
        endpoint,
    }
}

/// The complete API surface.
pub const API_ROUTES: &[ApiRoute] = &[
    route(Verb::Get, "/health", Access::Public, Endpoint::Health),
    route(Verb::Post, "/auth/login", Access::Public, Endpoint::Login),
    route(Verb::Post, "/auth/register", Access::Public, Endpoint::Register),
    route(Verb::Get, "/auth/me", Access::Authenticated, Endpoint::Me),
    route(Verb::Delete, "/auth/account", Access::Authenticated, Endpoint::DeleteAccount),
    route(Verb::Get, "/gallery/{slug}", Access::Public, Endpoint::Gallery),
    route(Verb::Get, "/github/repos", Access::Authenticated, Endpoint::GithubRepos),
    route(Verb::Post, "/github/verify-token", Access::Authenticated, Endpoint::VerifyGithubToken),
    route(Verb::Post, "/config", Access::Authenticated, Endpoint::SaveConfig),
    route(Verb::Get, "/config", Access::Authenticated, Endpoint::GetConfig),
    route(Verb::Get, "/gallery/check-slug", Access::Authenticated, Endpoint::CheckSlug),
    route(Verb::Post, "/upload", Access::Authenticated, Endpoint::Upload),
    route(Verb::Get, "/images", Access::Authenticated, Endpoint::ListImages),
    route(Verb::Patch, "/images/{id}", Access::Authenticated, Endpoint::UpdateImage),
    route(Verb::Delete, "/images/{id}", Access::Authenticated, Endpoint::DeleteImage),
];

impl Verb {
    pub fn method(self) -> Method {
        match self {
            Verb::Get => Method::GET,
            Verb::Post => Method::POST,
            Verb::Patch => Method::PATCH,
            Verb::Delete => Method::DELETE,
        }
    }
}

impl ApiRoute {
    /// Full request path with `{param}` segments left in place.
    pub fn full_path(&self) -> String {
        format!("/api{}", self.path)
    }

    fn method_router(&self, upload_limit: usize) -> MethodRouter<AppState> {
        match self.endpoint {
            Endpoint::Health => get(health_handler),
            Endpoint::Login => post(login_handler),
            Endpoint::Register => post(register_handler),
            Endpoint::Me => get(me_handler),
            Endpoint::DeleteAccount => delete(delete_account_handler),
            Endpoint::Gallery => get(gallery_handler),
            Endpoint::GithubRepos => get(github_repos_handler),
            Endpoint::VerifyGithubToken => post(verify_github_token_handler),
            Endpoint::SaveConfig => post(save_config_handler),
            Endpoint::GetConfig => get(get_config_handler),
            Endpoint::CheckSlug => get(check_slug_handler),
            Endpoint::Upload => post(upload_handler).layer(DefaultBodyLimit::max(upload_limit)),
            Endpoint::ListImages => get(list_images_handler),
            Endpoint::UpdateImage => patch(update_image_handler),
            Endpoint::DeleteImage => delete(delete_image_handler),
        }
    }
}

impl Endpoint {
    /// The verb the endpoint's handler is mounted under.
    pub fn verb(self) -> Verb {
        match self {
            Endpoint::Health
            | Endpoint::Me
            | Endpoint::Gallery
            | Endpoint::GithubRepos
            | Endpoint::GetConfig
            | Endpoint::CheckSlug
            | Endpoint::ListImages => Verb::Get,
            Endpoint::Login
            | Endpoint::Register
            | Endpoint::VerifyGithubToken
            | Endpoint::SaveConfig
            | Endpoint::Upload => Verb::Post,
            Endpoint::UpdateImage => Verb::Patch,
            Endpoint::DeleteAccount | Endpoint::DeleteImage => Verb::Delete,
        }
    }
}

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,

    /// Directory holding the built SPA (None = API only)
    pub frontend_dir: Option<PathBuf>,

    /// Largest accepted image, in bytes
    pub max_upload_bytes: u64,

    /// Upper bound on handling one request, body included (408 when exceeded)
    pub request_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            cors_origins: None,
            enable_tracing: true,
            frontend_dir: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl RouterConfig {
    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    pub fn with_frontend_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.frontend_dir = Some(dir.into());
        self
    }

    pub fn with_max_upload_bytes(mut self, max: u64) -> Self {
        self.max_upload_bytes = max;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn upload_body_limit(&self) -> usize {
        usize::try_from(self.max_upload_bytes)
            .unwrap_or(usize::MAX)
            .saturating_add(MULTIPART_OVERHEAD)
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
pub fn create_router(state: AppState, config: RouterConfig) -> Router {
    let api = api_router(&state, config.upload_body_limit());

    let media = Router::new().route(
        "/media/{key}",
        get(media_handler).route_layer(middleware::from_fn_with_state(
            state.media.clone(),
            media_signature_middleware,
        )),
    );

    let router = Router::new()
        .nest("/api", api)
        .merge(media)
        .with_state(state);

    // Everything else is the SPA
    let router = match &config.frontend_dir {
        Some(dir) => {
            let index = ServeFile::new(dir.join("index.html"));
            router.fallback_service(ServeDir::new(dir).fallback(index))
        }
        None => router,
    };

    let router = router
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(build_cors_layer(&config));

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build `/api` from [`API_ROUTES`].
fn api_router(state: &AppState, upload_limit: usize) -> Router<AppState> {
    let mut public = Router::new();
    let mut protected = Router::new();

    for api_route in API_ROUTES {
        let method_router = api_route.method_router(upload_limit);
        match api_route.access {
            Access::Public => public = public.route(api_route.path, method_router),
            Access::Authenticated => protected = protected.route(api_route.path, method_router),
        }
    }

    let protected = protected.route_layer(middleware::from_fn_with_state(
        state.clone(),
        require_auth,
    ));

    public.merge(protected).fallback(api_not_found_handler)
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}
