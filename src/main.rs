//! pic-host - personal image hosting with public galleries.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pic_host::{
    auth::TokenService,
    config::{Config, StorageBackend},
    github::GitHubClient,
    media::{create_s3_client, ContentStore, LocalContentStore, MediaPolicy, S3ContentStore},
    server::{
        create_router, serve, shutdown_signal, AppState, MediaUrlSigner, RouterConfig,
        ShutdownOutcome,
    },
    store,
};

/// Upper bound on waiting for the database pool to close.
const POOL_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    // Initialize logging
    init_logging(config.verbose);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("pic-host v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Database: {}", config.database_url);
    info!("  Session TTL: {}h", config.token_ttl_hours);
    info!("  Max upload: {} bytes", config.max_upload_bytes);
    info!("  GitHub API: {}", config.github_api_url);
    match &config.frontend_dir {
        Some(dir) => info!("  Frontend: {}", dir.display()),
        None => warn!("  Frontend: none (API only)"),
    }

    // Open the database
    let pool = match store::connect(&config.database_url, config.db_max_connections).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to open database {}: {}", config.database_url, e);
            return ExitCode::FAILURE;
        }
    };

    // Content storage
    let content = build_content_store(&config).await;
    info!("  Content store: {}", content.identifier());

    let verifier = match GitHubClient::new(&config.github_api_url) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to build GitHub client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let secret = config.auth_secret_or_empty();
    let state = AppState::new(
        pool.clone(),
        content,
        MediaPolicy::new(config.max_upload_bytes),
        TokenService::new(secret, config.token_ttl()),
        MediaUrlSigner::new(secret, config.media_url_ttl()),
        verifier,
    );

    let router = create_router(state, build_router_config(&config));

    // Bind and serve
    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/api/health", addr);
    info!("    curl -X POST http://{}/api/auth/register \\", addr);
    info!("         -H 'Content-Type: application/json' \\");
    info!("         -d '{{\"username\":\"me\",\"password\":\"<password>\"}}'");
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let exit = match serve(listener, router, shutdown_signal(), config.shutdown_grace()).await {
        Ok(ShutdownOutcome::Drained) => ExitCode::SUCCESS,
        Ok(ShutdownOutcome::Forced) => {
            warn!("Shutdown forced with requests still in flight");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Server error: {}", e);
            ExitCode::FAILURE
        }
    };

    if tokio::time::timeout(POOL_CLOSE_TIMEOUT, pool.close()).await.is_err() {
        warn!("Timed out closing database pool");
    }
    info!("Shutdown complete");

    exit
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "pic_host=debug,tower_http=debug"
    } else {
        "pic_host=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Pick the content backend named by the configuration.
async fn build_content_store(config: &Config) -> Arc<dyn ContentStore> {
    match config.storage {
        StorageBackend::Local => Arc::new(LocalContentStore::new(&config.storage_dir)),
        StorageBackend::S3 => {
            let client = create_s3_client(config.s3_endpoint.as_deref(), &config.s3_region).await;
            let bucket = config.s3_bucket.clone().unwrap_or_default();
            Arc::new(S3ContentStore::new(client, bucket, config.s3_prefix.clone()))
        }
    }
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::default()
        .with_max_upload_bytes(config.max_upload_bytes)
        .with_request_timeout(config.request_timeout())
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }
    if let Some(ref dir) = config.frontend_dir {
        router_config = router_config.with_frontend_dir(dir);
    }

    router_config
}
