//! Image lifecycle integration tests.
//!
//! Tests verify:
//! - Upload validation (type sniffing, size limits, missing fields)
//! - Listing, updating and deleting are scoped to the owner
//! - Signed media URLs serve the bytes and reject tampering

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;

use super::test_utils::{
    empty_request, get, jpeg_bytes, json_request, png_bytes, MultipartBody, TestApp,
};

// =============================================================================
// Upload
// =============================================================================

#[tokio::test]
async fn test_upload_png() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;

    let image = app.upload_png(&token, "Sunset", true).await;

    assert_eq!(image["content_type"], "image/png");
    assert_eq!(image["title"], "Sunset");
    assert_eq!(image["published"], true);
    assert_eq!(image["filename"], "photo.png");
    assert_eq!(image["size_bytes"], png_bytes().len() as u64);
    assert!(image["url"].as_str().unwrap().starts_with("/media/"));
    assert!(image.get("storage_key").is_none());
    assert!(image.get("owner_id").is_none());
    assert_eq!(app.content.len(), 1);
}

#[tokio::test]
async fn test_upload_sniffs_undeclared_type() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;

    let body =
        MultipartBody::new().file("file", "camera", "application/octet-stream", &jpeg_bytes());
    let (status, image) = app.send(body.into_request("/api/upload", &token)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(image["content_type"], "image/jpeg");
    assert_eq!(image["published"], false);
    assert!(image["title"].is_null());
}

#[tokio::test]
async fn test_upload_rejects_mismatched_type() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;

    let body = MultipartBody::new().file("file", "photo.jpg", "image/jpeg", &png_bytes());
    let (status, body) = app.send(body.into_request("/api/upload", &token)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_media");
    assert_eq!(app.content.len(), 0);
}

#[tokio::test]
async fn test_upload_rejects_non_image() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;

    let body = MultipartBody::new().file("file", "notes.txt", "text/plain", b"just some text");
    let (status, body) = app.send(body.into_request("/api/upload", &token)).await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["error"], "invalid_media");
}

#[tokio::test]
async fn test_upload_rejects_empty_file() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;

    let body = MultipartBody::new().file("file", "empty.png", "image/png", b"");
    let (status, body) = app.send(body.into_request("/api/upload", &token)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_media");
}

#[tokio::test]
async fn test_upload_over_policy_limit() {
    let app = TestApp::builder().max_upload_bytes(1024).build().await;
    let token = app.register("alice").await;

    let mut data = png_bytes();
    data.resize(4096, 0);
    let body = MultipartBody::new().file("file", "big.png", "image/png", &data);
    let (status, body) = app.send(body.into_request("/api/upload", &token)).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "invalid_media");
    assert_eq!(app.content.len(), 0);
}

#[tokio::test]
async fn test_upload_over_body_limit() {
    let app = TestApp::builder().max_upload_bytes(1024).build().await;
    let token = app.register("alice").await;

    let mut data = png_bytes();
    data.resize(256 * 1024, 0);
    let body = MultipartBody::new().file("file", "huge.png", "image/png", &data);
    let (status, body) = app.send(body.into_request("/api/upload", &token)).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "invalid_media");
    assert_eq!(app.content.len(), 0);
}

#[tokio::test]
async fn test_upload_requires_file_field() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;

    let body = MultipartBody::new().text("title", "no file here");
    let (status, body) = app.send(body.into_request("/api/upload", &token)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn test_upload_rejects_bad_published_flag() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;

    let body = MultipartBody::new()
        .file("file", "photo.png", "image/png", &png_bytes())
        .text("published", "maybe");
    let (status, _) = app.send(body.into_request("/api/upload", &token)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.content.len(), 0);
}

// =============================================================================
// List, Update, Delete
// =============================================================================

#[tokio::test]
async fn test_list_is_newest_first_and_owner_scoped() {
    let app = TestApp::new().await;
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;

    app.upload_png(&alice, "first", false).await;
    app.upload_png(&alice, "second", true).await;
    app.upload_png(&bob, "bobs", true).await;

    let (status, body) = app.send(get("/api/images", Some(&alice))).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<_> = body["images"]
        .as_array()
        .unwrap()
        .iter()
        .map(|image| image["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["second", "first"]);

    let (_, body) = app.send(get("/api/images", Some(&bob))).await;
    assert_eq!(body["images"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_update_image() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;
    let image = app.upload_png(&token, "draft", false).await;
    let uri = format!("/api/images/{}", image["id"]);

    let (status, updated) = app
        .send(json_request(
            Method::PATCH,
            &uri,
            Some(&token),
            json!({ "published": true }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["published"], true);
    assert_eq!(updated["title"], "draft");

    let (_, updated) = app
        .send(json_request(
            Method::PATCH,
            &uri,
            Some(&token),
            json!({ "title": "" }),
        ))
        .await;
    assert!(updated["title"].is_null());
    assert_eq!(updated["published"], true);
}

#[tokio::test]
async fn test_cross_user_access_is_not_found() {
    let app = TestApp::new().await;
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let image = app.upload_png(&alice, "mine", false).await;
    let uri = format!("/api/images/{}", image["id"]);

    let (status, body) = app
        .send(json_request(
            Method::PATCH,
            &uri,
            Some(&bob),
            json!({ "published": true }),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, _) = app
        .send(empty_request(Method::DELETE, &uri, Some(&bob)))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Indistinguishable from an id that never existed
    let (status, missing) = app
        .send(empty_request(Method::DELETE, "/api/images/9999", Some(&bob)))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, missing);

    let (_, list) = app.send(get("/api/images", Some(&alice))).await;
    assert_eq!(list["images"][0]["published"], false);
    assert_eq!(app.content.len(), 1);
}

#[tokio::test]
async fn test_delete_image_removes_content() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;
    let image = app.upload_png(&token, "gone soon", true).await;
    let uri = format!("/api/images/{}", image["id"]);

    let (status, body) = app
        .send(empty_request(Method::DELETE, &uri, Some(&token)))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());
    assert_eq!(app.content.len(), 0);

    let (status, _) = app
        .send(empty_request(Method::DELETE, &uri, Some(&token)))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_non_numeric_image_id() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;

    let (status, body) = app
        .send(empty_request(Method::DELETE, "/api/images/abc", Some(&token)))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

// =============================================================================
// Signed Media URLs
// =============================================================================

#[tokio::test]
async fn test_signed_url_serves_bytes() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;
    let image = app.upload_png(&token, "private", false).await;
    let url = image["url"].as_str().unwrap();

    // No bearer token needed; the signature is the credential
    let response = app.router.clone().oneshot(get(url, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "image/png");
    assert_eq!(headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
    assert_eq!(
        headers.get(header::CACHE_CONTROL).unwrap(),
        "private, max-age=600"
    );

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.as_ref(), png_bytes().as_slice());
}

#[tokio::test]
async fn test_media_without_signature() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;
    let image = app.upload_png(&token, "private", false).await;
    let url = image["url"].as_str().unwrap();
    let path = url.split('?').next().unwrap();

    let (status, body) = app.send(get(path, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "missing_signature");

    // A session token is not a substitute for a signature
    let (status, _) = app.send(get(path, Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_media_signature_bound_to_key() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;
    let first = app.upload_png(&token, "one", false).await;
    let second = app.upload_png(&token, "two", false).await;

    let first_url = first["url"].as_str().unwrap();
    let second_url = second["url"].as_str().unwrap();
    let (_, first_query) = first_url.split_once('?').unwrap();
    let (second_path, _) = second_url.split_once('?').unwrap();

    let swapped = format!("{}?{}", second_path, first_query);
    let (status, body) = app.send(get(&swapped, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_signature");
}

#[tokio::test]
async fn test_media_expired_signature() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;
    app.upload_png(&token, "old", false).await;

    let (_, list) = app.send(get("/api/images", Some(&token))).await;
    let url = list["images"][0]["url"].as_str().unwrap();
    let key = url
        .trim_start_matches("/media/")
        .split('?')
        .next()
        .unwrap();

    let expired = app.state.media.url_with_expiry(key, 1);
    let (status, body) = app.send(get(&expired, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "signature_expired");
}

#[tokio::test]
async fn test_media_for_deleted_image() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;
    let image = app.upload_png(&token, "short-lived", true).await;
    let url = image["url"].as_str().unwrap().to_string();

    app.send(empty_request(
        Method::DELETE,
        &format!("/api/images/{}", image["id"]),
        Some(&token),
    ))
    .await;

    let (status, body) = app.send(get(&url, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_upload_without_multipart_content_type() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/upload")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert!(response.status().is_client_error());
    assert_eq!(app.content.len(), 0);
}
