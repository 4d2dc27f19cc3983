//! HTTP request handlers for the pic-host API.
//!
//! # Endpoints
//!
//! - `GET /api/health` - Health check
//! - `POST /api/auth/register`, `POST /api/auth/login` - Obtain a session token
//! - `GET /api/auth/me`, `DELETE /api/auth/account` - Current account
//! - `GET /api/github/repos`, `POST /api/github/verify-token` - GitHub call-through
//! - `GET|POST /api/config`, `GET /api/gallery/check-slug` - Per-user settings
//! - `POST /api/upload`, `GET /api/images`, `PATCH|DELETE /api/images/{id}` - Images
//! - `GET /api/gallery/{slug}` - Public gallery
//! - `GET /media/{key}` - Image bytes behind a signed URL

use std::sync::Arc;

use axum::{
    extract::{
        multipart::MultipartError,
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Multipart, Path, Query, State,
    },
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};

use super::auth::AuthUser;
use super::signed_url::MediaUrlSigner;
use crate::auth::{CredentialStore, TokenService};
use crate::error::{ContentError, ExternalError, MediaError, StoreError};
use crate::github::{Repository, RepositoryVerifier};
use crate::media::{content_type_for_key, ContentStore, MediaPolicy};
use crate::store::{
    normalize_slug, ConfigUpdate, GalleryImage, GalleryResolver, ImageRecord, ImageUpdate,
    NewImage, ResourceStore, User, UserConfig,
};

// =============================================================================
// Application State
// =============================================================================

/// Shared application state passed to all handlers via Axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    pub credentials: CredentialStore,
    pub resources: ResourceStore,
    pub gallery: GalleryResolver,
    pub tokens: Arc<TokenService>,
    pub media: MediaUrlSigner,
    pub verifier: Arc<dyn RepositoryVerifier>,
}

impl AppState {
    /// Wire the stores and services around one database pool.
    pub fn new(
        pool: SqlitePool,
        content: Arc<dyn ContentStore>,
        policy: MediaPolicy,
        tokens: TokenService,
        media: MediaUrlSigner,
        verifier: Arc<dyn RepositoryVerifier>,
    ) -> Self {
        Self {
            credentials: CredentialStore::new(pool.clone()),
            resources: ResourceStore::new(pool.clone(), content, policy),
            gallery: GalleryResolver::new(pool),
            tokens: Arc::new(tokens),
            media,
            verifier,
        }
    }
}

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyTokenRequest {
    pub token: String,
}

/// Body of `POST /api/config`.
///
/// `github_token`: absent keeps the stored token, `""` clears it.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigRequest {
    pub github_token: Option<String>,
    pub github_repo: Option<String>,
    pub github_branch: Option<String>,
    pub gallery_slug: Option<String>,
    pub gallery_enabled: bool,
    pub gallery_title: Option<String>,
    pub gallery_description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckSlugQuery {
    pub slug: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateImageRequest {
    pub published: Option<bool>,
    pub title: Option<String>,
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "slug_conflict")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.get(),
            username: user.username,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    /// Unix epoch seconds
    pub expires_at: u64,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct RepositoriesResponse {
    pub repositories: Vec<Repository>,
}

#[derive(Debug, Serialize)]
pub struct VerifyTokenResponse {
    pub valid: bool,
    pub repositories: Vec<Repository>,
}

/// A user's config as returned to its owner. The GitHub token is never echoed.
#[derive(Debug, Default, Serialize)]
pub struct ConfigResponse {
    pub has_github_token: bool,
    pub github_repo: Option<String>,
    pub github_branch: Option<String>,
    pub gallery_slug: Option<String>,
    pub gallery_enabled: bool,
    pub gallery_title: Option<String>,
    pub gallery_description: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<UserConfig> for ConfigResponse {
    fn from(config: UserConfig) -> Self {
        Self {
            has_github_token: config.github_token.is_some(),
            github_repo: config.github_repo,
            github_branch: config.github_branch,
            gallery_slug: config.gallery_slug,
            gallery_enabled: config.gallery_enabled,
            gallery_title: config.gallery_title,
            gallery_description: config.gallery_description,
            updated_at: Some(config.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SlugAvailabilityResponse {
    pub slug: String,
    pub available: bool,
}

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub id: i64,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub title: Option<String>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    /// Signed, expiring media URL
    pub url: String,
}

impl ImageResponse {
    fn new(image: ImageRecord, media: &MediaUrlSigner) -> Self {
        Self {
            url: media.url_for(&image.storage_key),
            id: image.id,
            filename: image.filename,
            content_type: image.content_type,
            size_bytes: image.size_bytes,
            title: image.title,
            published: image.published,
            created_at: image.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ImagesResponse {
    pub images: Vec<ImageResponse>,
}

#[derive(Debug, Serialize)]
pub struct GalleryImageResponse {
    #[serde(flatten)]
    pub image: GalleryImage,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct GalleryResponse {
    pub slug: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub images: Vec<GalleryImageResponse>,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Every failure a handler can return.
#[derive(Debug)]
pub enum ApiError {
    Store(StoreError),
    External(ExternalError),
    /// Malformed request body, path or query
    BadRequest(String),
    /// Multipart stream failure, carrying axum's chosen status
    Multipart { status: StatusCode, message: String },
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl From<ExternalError> for ApiError {
    fn from(err: ExternalError) -> Self {
        ApiError::External(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Multipart {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Store(err) => match err {
                StoreError::NotFound
                | StoreError::Content(ContentError::NotFound(_))
                | StoreError::Content(ContentError::InvalidKey(_)) => {
                    (StatusCode::NOT_FOUND, "not_found", "Resource not found".to_string())
                }
                StoreError::SlugConflict { .. } => {
                    (StatusCode::CONFLICT, "slug_conflict", err.to_string())
                }
                StoreError::InvalidSlug { .. } => {
                    (StatusCode::BAD_REQUEST, "invalid_slug", err.to_string())
                }
                StoreError::InvalidMedia(media) => {
                    let status = match media {
                        MediaError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                        MediaError::UnsupportedType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                        MediaError::Empty | MediaError::ContentMismatch { .. } => {
                            StatusCode::BAD_REQUEST
                        }
                    };
                    (status, "invalid_media", media.to_string())
                }
                StoreError::UsernameTaken(_) => {
                    (StatusCode::CONFLICT, "username_taken", err.to_string())
                }
                StoreError::InvalidCredentials => {
                    (StatusCode::UNAUTHORIZED, "invalid_credentials", err.to_string())
                }
                StoreError::InvalidInput(message) => {
                    (StatusCode::BAD_REQUEST, "invalid_request", message.clone())
                }
                StoreError::Content(_) | StoreError::Database(_) | StoreError::PasswordHash(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                ),
            },
            ApiError::External(err) => match err {
                ExternalError::InvalidToken => (
                    StatusCode::BAD_REQUEST,
                    "invalid_external_token",
                    err.to_string(),
                ),
                ExternalError::Unavailable(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "external_service_unavailable",
                    "GitHub is currently unavailable, try again later".to_string(),
                ),
            },
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, "invalid_request", message.clone())
            }
            ApiError::Multipart { status, message } if *status == StatusCode::PAYLOAD_TOO_LARGE => {
                (*status, "invalid_media", message.clone())
            }
            ApiError::Multipart { status, message } => {
                (*status, "invalid_request", message.clone())
            }
        }
    }
}

/// Convert handler errors to HTTP responses.
///
/// - 5xx errors are logged at ERROR level with the underlying detail, which
///   never reaches the client
/// - 404s are logged at DEBUG level (common and expected)
/// - other 4xx errors are logged at WARN level
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = self.parts();

        if status.is_server_error() {
            let detail = match &self {
                ApiError::Store(err) => err.to_string(),
                ApiError::External(err) => err.to_string(),
                _ => message.clone(),
            };
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                detail
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// Health
// =============================================================================

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Accounts
// =============================================================================

fn session_for(state: &AppState, user: User) -> SessionResponse {
    let issued = state.tokens.issue(user.id);
    SessionResponse {
        token: issued.token,
        expires_at: issued.expires_at,
        user: user.into(),
    }
}

pub async fn register_handler(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    let Json(request) = payload?;
    let user = state
        .credentials
        .register(&request.username, &request.password)
        .await?;
    Ok((StatusCode::CREATED, Json(session_for(&state, user))))
}

pub async fn login_handler(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> ApiResult<Json<SessionResponse>> {
    let Json(request) = payload?;
    let user = state
        .credentials
        .authenticate(&request.username, &request.password)
        .await?;
    info!(user_id = %user.id, "User logged in");
    Ok(Json(session_for(&state, user)))
}

pub async fn me_handler(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<UserResponse>> {
    let user = state
        .credentials
        .find(auth.user_id)
        .await?
        .ok_or(StoreError::NotFound)?;
    Ok(Json(user.into()))
}

pub async fn delete_account_handler(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<StatusCode> {
    let keys = state.credentials.delete(auth.user_id).await?;
    state.resources.discard_content(&keys).await;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// GitHub
// =============================================================================

pub async fn github_repos_handler(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<RepositoriesResponse>> {
    let token = state
        .resources
        .owned_by(auth.user_id)
        .get_config()
        .await?
        .and_then(|config| config.github_token)
        .ok_or_else(|| ApiError::BadRequest("No GitHub token configured".to_string()))?;

    let repositories = state.verifier.list_repositories(&token).await?;
    Ok(Json(RepositoriesResponse { repositories }))
}

pub async fn verify_github_token_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    payload: Result<Json<VerifyTokenRequest>, JsonRejection>,
) -> ApiResult<Json<VerifyTokenResponse>> {
    let Json(request) = payload?;
    let repositories = state.verifier.list_repositories(&request.token).await?;
    Ok(Json(VerifyTokenResponse {
        valid: true,
        repositories,
    }))
}

// =============================================================================
// Config
// =============================================================================

pub async fn get_config_handler(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ConfigResponse>> {
    let config = state.resources.owned_by(auth.user_id).get_config().await?;
    Ok(Json(config.map(ConfigResponse::from).unwrap_or_default()))
}

pub async fn save_config_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<ConfigRequest>, JsonRejection>,
) -> ApiResult<Json<ConfigResponse>> {
    let Json(request) = payload?;

    // A new token must work before it is stored
    if let Some(token) = request.github_token.as_deref().map(str::trim) {
        if !token.is_empty() {
            state.verifier.list_repositories(token).await?;
        }
    }

    let config = state
        .resources
        .owned_by(auth.user_id)
        .save_config(ConfigUpdate {
            github_token: request.github_token,
            github_repo: request.github_repo,
            github_branch: request.github_branch,
            gallery_slug: request.gallery_slug,
            gallery_enabled: request.gallery_enabled,
            gallery_title: request.gallery_title,
            gallery_description: request.gallery_description,
        })
        .await?;

    Ok(Json(config.into()))
}

pub async fn check_slug_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    query: Result<Query<CheckSlugQuery>, QueryRejection>,
) -> ApiResult<Json<SlugAvailabilityResponse>> {
    let Query(query) = query?;
    let slug = normalize_slug(Some(&query.slug))?.ok_or_else(|| StoreError::InvalidSlug {
        reason: "slug must not be empty".to_string(),
    })?;

    let available = state
        .resources
        .check_slug_available(&slug, auth.user_id)
        .await?;
    Ok(Json(SlugAvailabilityResponse { slug, available }))
}

// =============================================================================
// Images
// =============================================================================

fn parse_flag(value: &str) -> Result<bool, ApiError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" | "" => Ok(false),
        other => Err(ApiError::BadRequest(format!(
            "Invalid value for 'published': {}",
            other
        ))),
    }
}

/// `POST /api/upload`: multipart form with a `file` part and optional
/// `title` and `published` text parts.
pub async fn upload_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ImageResponse>)> {
    let mut file: Option<(String, Option<String>, Bytes)> = None;
    let mut title: Option<String> = None;
    let mut published = false;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await?;
                file = Some((filename, content_type, data));
            }
            Some("title") => title = Some(field.text().await?),
            Some("published") => published = parse_flag(&field.text().await?)?,
            _ => {}
        }
    }

    let (filename, declared_content_type, data) =
        file.ok_or_else(|| ApiError::BadRequest("Missing 'file' field".to_string()))?;

    let image = state
        .resources
        .owned_by(auth.user_id)
        .upload_image(NewImage {
            filename,
            declared_content_type,
            title,
            published,
            data,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ImageResponse::new(image, &state.media)),
    ))
}

pub async fn list_images_handler(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ImagesResponse>> {
    let images = state
        .resources
        .owned_by(auth.user_id)
        .list_images()
        .await?
        .into_iter()
        .map(|image| ImageResponse::new(image, &state.media))
        .collect();
    Ok(Json(ImagesResponse { images }))
}

pub async fn update_image_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateImageRequest>, JsonRejection>,
) -> ApiResult<Json<ImageResponse>> {
    let Path(image_id) = id?;
    let Json(request) = payload?;

    let image = state
        .resources
        .owned_by(auth.user_id)
        .update_image(
            image_id,
            ImageUpdate {
                published: request.published,
                title: request.title,
            },
        )
        .await?;
    Ok(Json(ImageResponse::new(image, &state.media)))
}

pub async fn delete_image_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(image_id) = id?;
    state
        .resources
        .owned_by(auth.user_id)
        .delete_image(image_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Public
// =============================================================================

pub async fn gallery_handler(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<GalleryResponse>> {
    let view = state.gallery.resolve(&slug).await?;

    let images = view
        .images
        .into_iter()
        .map(|image| GalleryImageResponse {
            url: state.media.url_for(&image.storage_key),
            image,
        })
        .collect();

    Ok(Json(GalleryResponse {
        slug: view.slug,
        title: view.title,
        description: view.description,
        images,
    }))
}

/// `GET /media/{key}`; only reachable through the signature middleware.
pub async fn media_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Response> {
    let data = state.resources.read_content(&key).await?;

    let cache_control = format!("private, max-age={}", state.media.ttl().as_secs());
    let mut response = data.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type_for_key(&key)),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    if let Ok(value) = HeaderValue::from_str(&cache_control) {
        headers.insert(header::CACHE_CONTROL, value);
    }
    Ok(response)
}

/// Fallback for unmatched `/api/*` paths.
pub async fn api_not_found_handler() -> Response {
    let status = StatusCode::NOT_FOUND;
    (
        status,
        Json(ErrorResponse::with_status(
            "not_found",
            "No such API endpoint",
            status,
        )),
    )
        .into_response()
}
