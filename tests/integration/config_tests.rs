//! Per-user config integration tests.
//!
//! Tests verify:
//! - Config defaults, save and reload
//! - The GitHub token is verified before it is stored and never echoed
//! - Gallery slug claims, conflicts and availability checks
//! - GitHub call-through endpoints

use axum::http::{Method, StatusCode};
use serde_json::json;

use super::test_utils::{get, json_request, MockVerifier, TestApp, VALID_GITHUB_TOKEN};

// =============================================================================
// Save and Load
// =============================================================================

#[tokio::test]
async fn test_config_defaults_before_first_save() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;

    let (status, body) = app.send(get("/api/config", Some(&token))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["has_github_token"], false);
    assert_eq!(body["gallery_enabled"], false);
    assert!(body["gallery_slug"].is_null());
}

#[tokio::test]
async fn test_save_and_reload_config() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;

    let (status, saved) = app
        .send(json_request(
            Method::POST,
            "/api/config",
            Some(&token),
            json!({
                "github_token": VALID_GITHUB_TOKEN,
                "github_repo": "octocat/pictures",
                "github_branch": "main",
                "gallery_slug": "  Holiday-2024 ",
                "gallery_enabled": true,
                "gallery_title": "Holiday",
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["gallery_slug"], "holiday-2024");
    assert_eq!(saved["has_github_token"], true);
    assert!(saved.get("github_token").is_none());

    let (status, loaded) = app.send(get("/api/config", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loaded, saved);
    assert!(!loaded.to_string().contains(VALID_GITHUB_TOKEN));
}

#[tokio::test]
async fn test_omitted_token_is_kept_and_empty_token_clears() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;

    app.send(json_request(
        Method::POST,
        "/api/config",
        Some(&token),
        json!({ "github_token": VALID_GITHUB_TOKEN }),
    ))
    .await;

    let (_, kept) = app
        .send(json_request(
            Method::POST,
            "/api/config",
            Some(&token),
            json!({ "github_repo": "octocat/other" }),
        ))
        .await;
    assert_eq!(kept["has_github_token"], true);
    assert_eq!(kept["github_repo"], "octocat/other");

    let (_, cleared) = app
        .send(json_request(
            Method::POST,
            "/api/config",
            Some(&token),
            json!({ "github_token": "" }),
        ))
        .await;
    assert_eq!(cleared["has_github_token"], false);
}

#[tokio::test]
async fn test_invalid_github_token_is_not_saved() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/config",
            Some(&token),
            json!({ "github_token": "ghp_revoked", "github_repo": "octocat/pictures" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_external_token");

    let (_, config) = app.send(get("/api/config", Some(&token))).await;
    assert_eq!(config["has_github_token"], false);
    assert!(config["github_repo"].is_null());
}

#[tokio::test]
async fn test_github_outage_fails_config_save() {
    let app = TestApp::builder()
        .verifier(MockVerifier::unavailable())
        .build()
        .await;
    let token = app.register("alice").await;

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/config",
            Some(&token),
            json!({ "github_token": VALID_GITHUB_TOKEN }),
        ))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "external_service_unavailable");
    assert!(!body["message"].as_str().unwrap().contains("mock outage"));
}

#[tokio::test]
async fn test_config_without_token_skips_verification() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;

    let (status, _) = app
        .send(json_request(
            Method::POST,
            "/api/config",
            Some(&token),
            json!({ "gallery_title": "Untitled" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.verifier.calls(), 0);
}

#[tokio::test]
async fn test_configs_are_private() {
    let app = TestApp::new().await;
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;

    app.enable_gallery(&alice, "alice-pics").await;

    let (_, bobs) = app.send(get("/api/config", Some(&bob))).await;
    assert!(bobs["gallery_slug"].is_null());
    assert_eq!(bobs["gallery_enabled"], false);
}

// =============================================================================
// Slugs
// =============================================================================

#[tokio::test]
async fn test_slug_conflict() {
    let app = TestApp::new().await;
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    app.enable_gallery(&alice, "holiday").await;

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/config",
            Some(&bob),
            json!({ "gallery_slug": "HOLIDAY", "gallery_enabled": true }),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "slug_conflict");

    // Alice still owns it
    let (status, gallery) = app.send(get("/api/gallery/holiday", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(gallery["title"], "Holiday");
}

#[tokio::test]
async fn test_enabling_gallery_requires_slug() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/config",
            Some(&token),
            json!({ "gallery_enabled": true }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_slug");
}

#[tokio::test]
async fn test_invalid_slug_rejected() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;

    for slug in ["a", "has space", "-edge", "check-slug", "../etc"] {
        let (status, body) = app
            .send(json_request(
                Method::POST,
                "/api/config",
                Some(&token),
                json!({ "gallery_slug": slug }),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "slug {:?}", slug);
        assert_eq!(body["error"], "invalid_slug");
    }
}

#[tokio::test]
async fn test_check_slug() {
    let app = TestApp::new().await;
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    app.enable_gallery(&alice, "holiday").await;

    let (status, body) = app
        .send(get("/api/gallery/check-slug?slug=Holiday", Some(&bob)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["slug"], "holiday");
    assert_eq!(body["available"], false);

    let (_, body) = app
        .send(get("/api/gallery/check-slug?slug=holiday", Some(&alice)))
        .await;
    assert_eq!(body["available"], true);

    let (_, body) = app
        .send(get("/api/gallery/check-slug?slug=winter", Some(&bob)))
        .await;
    assert_eq!(body["available"], true);

    let (status, body) = app
        .send(get("/api/gallery/check-slug?slug=no_way", Some(&bob)))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_slug");

    let (status, body) = app.send(get("/api/gallery/check-slug", Some(&bob))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

// =============================================================================
// GitHub Call-through
// =============================================================================

#[tokio::test]
async fn test_verify_token_endpoint() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/github/verify-token",
            Some(&token),
            json!({ "token": VALID_GITHUB_TOKEN }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["repositories"][0]["full_name"], "octocat/pictures");

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/github/verify-token",
            Some(&token),
            json!({ "token": "ghp_nope" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_external_token");
}

#[tokio::test]
async fn test_repos_use_stored_token() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;

    let (status, body) = app.send(get("/api/github/repos", Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");

    app.send(json_request(
        Method::POST,
        "/api/config",
        Some(&token),
        json!({ "github_token": VALID_GITHUB_TOKEN }),
    ))
    .await;

    let (status, body) = app.send(get("/api/github/repos", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["repositories"].as_array().unwrap().len(), 1);
}
