//! Test utilities for integration tests.
//!
//! In-memory doubles for the content store and the GitHub verifier, an app
//! builder wired around an in-memory SQLite database, and request helpers.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::Value;
use tower::ServiceExt;

use pic_host::error::{ContentError, ExternalError};
use pic_host::{
    create_router, AppState, ContentStore, MediaPolicy, MediaUrlSigner, Repository,
    RepositoryVerifier, RouterConfig, TokenService,
};

pub const TEST_SECRET: &str = "integration-test-secret-0123456789";
pub const TEST_PASSWORD: &str = "correct horse battery";
pub const VALID_GITHUB_TOKEN: &str = "ghp_valid_token";

const BOUNDARY: &str = "pic-host-test-boundary";

// =============================================================================
// In-memory Content Store
// =============================================================================

/// A content store holding objects in a map.
#[derive(Default)]
pub struct MemoryContentStore {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> Result<(), ContentError> {
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, ContentError> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| ContentError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), ContentError> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    fn identifier(&self) -> String {
        "memory://".to_string()
    }
}

// =============================================================================
// Mock Repository Verifier
// =============================================================================

/// Accepts [`VALID_GITHUB_TOKEN`] and rejects everything else, unless told
/// to behave as if GitHub were down.
#[derive(Default)]
pub struct MockVerifier {
    unavailable: bool,
    calls: AtomicUsize,
}

impl MockVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn sample_repository() -> Repository {
    Repository {
        id: 42,
        name: "pictures".to_string(),
        full_name: "octocat/pictures".to_string(),
        private: false,
        html_url: "https://github.com/octocat/pictures".to_string(),
        default_branch: Some("main".to_string()),
    }
}

#[async_trait]
impl RepositoryVerifier for MockVerifier {
    async fn list_repositories(&self, token: &str) -> Result<Vec<Repository>, ExternalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(ExternalError::Unavailable("mock outage".to_string()));
        }
        if token == VALID_GITHUB_TOKEN {
            Ok(vec![sample_repository()])
        } else {
            Err(ExternalError::InvalidToken)
        }
    }
}

// =============================================================================
// Test Application
// =============================================================================

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub content: Arc<MemoryContentStore>,
    pub verifier: Arc<MockVerifier>,
}

pub struct TestAppBuilder {
    verifier: MockVerifier,
    max_upload_bytes: u64,
    frontend_dir: Option<PathBuf>,
    request_timeout: Option<Duration>,
}

impl TestAppBuilder {
    pub fn verifier(mut self, verifier: MockVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn max_upload_bytes(mut self, max: u64) -> Self {
        self.max_upload_bytes = max;
        self
    }

    pub fn frontend_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.frontend_dir = Some(dir.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub async fn build(self) -> TestApp {
        let pool = pic_host::store::connect_in_memory().await.unwrap();
        let content = Arc::new(MemoryContentStore::new());
        let verifier = Arc::new(self.verifier);

        let state = AppState::new(
            pool,
            content.clone(),
            MediaPolicy::new(self.max_upload_bytes),
            TokenService::new(TEST_SECRET, Duration::from_secs(3600)),
            MediaUrlSigner::new(TEST_SECRET, Duration::from_secs(600)),
            verifier.clone(),
        );

        let mut config = RouterConfig::default()
            .with_tracing(false)
            .with_max_upload_bytes(self.max_upload_bytes);
        if let Some(dir) = self.frontend_dir {
            config = config.with_frontend_dir(dir);
        }
        if let Some(timeout) = self.request_timeout {
            config = config.with_request_timeout(timeout);
        }

        TestApp {
            router: create_router(state.clone(), config),
            state,
            content,
            verifier,
        }
    }
}

impl TestApp {
    pub fn builder() -> TestAppBuilder {
        TestAppBuilder {
            verifier: MockVerifier::new(),
            max_upload_bytes: 1024 * 1024,
            frontend_dir: None,
            request_timeout: None,
        }
    }

    pub async fn new() -> Self {
        Self::builder().build().await
    }

    /// Send a request and return the status and the body parsed as JSON
    /// (`Value::Null` for an empty body).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or_else(|_| {
                panic!("response is not JSON: {}", String::from_utf8_lossy(&body))
            })
        };
        (status, json)
    }

    /// Register `username` and return its session token.
    pub async fn register(&self, username: &str) -> String {
        let (status, body) = self
            .send(json_request(
                Method::POST,
                "/api/auth/register",
                None,
                serde_json::json!({ "username": username, "password": TEST_PASSWORD }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    /// Upload a PNG and return the created image JSON.
    pub async fn upload_png(&self, token: &str, title: &str, published: bool) -> Value {
        let published = if published { "true" } else { "false" };
        let body = MultipartBody::new()
            .file("file", "photo.png", "image/png", &png_bytes())
            .text("title", title)
            .text("published", published);
        let (status, json) = self.send(body.into_request("/api/upload", token)).await;
        assert_eq!(status, StatusCode::CREATED, "upload failed: {}", json);
        json
    }

    /// Publish a gallery under `slug`.
    pub async fn enable_gallery(&self, token: &str, slug: &str) {
        let (status, body) = self
            .send(json_request(
                Method::POST,
                "/api/config",
                Some(token),
                serde_json::json!({
                    "gallery_slug": slug,
                    "gallery_enabled": true,
                    "gallery_title": "Holiday",
                }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "config save failed: {}", body);
    }
}

// =============================================================================
// Request Builders
// =============================================================================

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    empty_request(Method::GET, uri, token)
}

pub fn empty_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Builds a `multipart/form-data` body.
#[derive(Default)]
pub struct MultipartBody {
    bytes: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, name, filename, content_type
            )
            .as_bytes(),
        );
        self.bytes.extend_from_slice(data);
        self.bytes.extend_from_slice(b"\r\n");
        self
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn into_request(mut self, uri: &str, token: &str) -> Request<Body> {
        self.bytes
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::from(self.bytes))
            .unwrap()
    }
}

// =============================================================================
// Image Fixtures
// =============================================================================

fn encode(format: ImageFormat) -> Vec<u8> {
    let image = RgbImage::from_fn(4, 4, |x, y| Rgb([(x * 60) as u8, (y * 60) as u8, 128]));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, format).unwrap();
    out.into_inner()
}

pub fn png_bytes() -> Vec<u8> {
    encode(ImageFormat::Png)
}

pub fn jpeg_bytes() -> Vec<u8> {
    encode(ImageFormat::Jpeg)
}
