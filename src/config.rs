//! Configuration management for pic-host.
//!
//! Every option can be given on the command line or through an environment
//! variable with the `PIC_` prefix:
//!
//! - `PIC_HOST` - Server bind address (default: 0.0.0.0)
//! - `PIC_PORT` - Server port (default: 9090)
//! - `PIC_DATABASE_URL` - SQLite database URL (default: sqlite://pic-host.db)
//! - `PIC_AUTH_SECRET` - HMAC secret for session tokens and media URLs (required)
//! - `PIC_TOKEN_TTL_HOURS` - Session token lifetime (default: 24)
//! - `PIC_STORAGE` - Content backend, `local` or `s3` (default: local)
//! - `PIC_STORAGE_DIR` - Directory for the local backend (default: ./data/media)
//! - `PIC_S3_BUCKET`, `PIC_S3_PREFIX`, `PIC_S3_ENDPOINT`, `PIC_S3_REGION` - S3 backend
//! - `PIC_MAX_UPLOAD_BYTES` - Largest accepted image (default: 10 MiB)
//! - `PIC_MEDIA_URL_TTL` - Lifetime of signed media URLs in seconds (default: 3600)
//! - `PIC_GITHUB_API_URL` - GitHub REST API base (default: https://api.github.com)
//! - `PIC_FRONTEND_DIR` - Built SPA to serve for non-API paths
//! - `PIC_SHUTDOWN_TIMEOUT` - Drain period on shutdown in seconds (default: 30)
//! - `PIC_CORS_ORIGINS` - Allowed CORS origins, comma-separated (default: any)

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::github::DEFAULT_GITHUB_API_URL;
use crate::media::DEFAULT_MAX_UPLOAD_BYTES;
use crate::store::DEFAULT_MAX_CONNECTIONS;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 9090;

/// Default database location.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://pic-host.db";

/// Default session lifetime in hours.
pub const DEFAULT_TOKEN_TTL_HOURS: u64 = 24;

/// Default local content directory.
pub const DEFAULT_STORAGE_DIR: &str = "./data/media";

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default signed media URL lifetime in seconds.
pub const DEFAULT_MEDIA_URL_TTL_SECS: u64 = 3600;

/// Default drain period on shutdown in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default upper bound on a single request, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Shortest accepted signing secret, in bytes.
pub const MIN_AUTH_SECRET_LEN: usize = 16;

/// Where image bytes are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackend {
    /// Files in a local directory
    Local,
    /// Objects in an S3 or S3-compatible bucket
    S3,
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// pic-host - personal image hosting with public galleries.
#[derive(Parser, Debug, Clone)]
#[command(name = "pic-host")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "PIC_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PIC_PORT")]
    pub port: u16,

    /// Seconds to let in-flight requests finish after a shutdown signal.
    #[arg(long, default_value_t = DEFAULT_SHUTDOWN_TIMEOUT_SECS, env = "PIC_SHUTDOWN_TIMEOUT")]
    pub shutdown_timeout: u64,

    /// Seconds a single request may take, including reading its body.
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS, env = "PIC_REQUEST_TIMEOUT")]
    pub request_timeout: u64,

    /// Directory containing the built frontend. Unknown non-API paths serve its index.html.
    #[arg(long, env = "PIC_FRONTEND_DIR")]
    pub frontend_dir: Option<PathBuf>,

    // =========================================================================
    // Database Configuration
    // =========================================================================
    /// SQLite database URL. The file is created if missing.
    #[arg(long, default_value = DEFAULT_DATABASE_URL, env = "PIC_DATABASE_URL")]
    pub database_url: String,

    /// Maximum pooled database connections.
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS, env = "PIC_DB_MAX_CONNECTIONS")]
    pub db_max_connections: u32,

    // =========================================================================
    // Authentication Configuration
    // =========================================================================
    /// Secret key for signing session tokens and media URLs.
    #[arg(long, env = "PIC_AUTH_SECRET", hide_env_values = true)]
    pub auth_secret: Option<String>,

    /// Session token lifetime in hours.
    #[arg(long, default_value_t = DEFAULT_TOKEN_TTL_HOURS, env = "PIC_TOKEN_TTL_HOURS")]
    pub token_ttl_hours: u64,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    /// Content storage backend.
    #[arg(long, value_enum, default_value_t = StorageBackend::Local, env = "PIC_STORAGE")]
    pub storage: StorageBackend,

    /// Directory for the local storage backend.
    #[arg(long, default_value = DEFAULT_STORAGE_DIR, env = "PIC_STORAGE_DIR")]
    pub storage_dir: PathBuf,

    /// S3 bucket for the s3 storage backend.
    #[arg(long, env = "PIC_S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Key prefix inside the S3 bucket (e.g. "images/").
    #[arg(long, default_value = "", env = "PIC_S3_PREFIX")]
    pub s3_prefix: String,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "PIC_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "PIC_S3_REGION")]
    pub s3_region: String,

    // =========================================================================
    // Media Configuration
    // =========================================================================
    /// Largest accepted upload in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES, env = "PIC_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: u64,

    /// Lifetime of signed media URLs in seconds.
    #[arg(long, default_value_t = DEFAULT_MEDIA_URL_TTL_SECS, env = "PIC_MEDIA_URL_TTL")]
    pub media_url_ttl: u64,

    // =========================================================================
    // GitHub Configuration
    // =========================================================================
    /// GitHub REST API base URL.
    #[arg(long, default_value = DEFAULT_GITHUB_API_URL, env = "PIC_GITHUB_API_URL")]
    pub github_api_url: String,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "PIC_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        match self.auth_secret.as_deref() {
            None | Some("") => {
                return Err(
                    "No auth secret provided. Set --auth-secret or PIC_AUTH_SECRET".to_string(),
                )
            }
            Some(secret) if secret.len() < MIN_AUTH_SECRET_LEN => {
                return Err(format!(
                    "auth secret must be at least {} bytes",
                    MIN_AUTH_SECRET_LEN
                ))
            }
            Some(_) => {}
        }

        if self.storage == StorageBackend::S3
            && self.s3_bucket.as_deref().map_or(true, str::is_empty)
        {
            return Err(
                "S3 storage selected but no bucket provided. Set --s3-bucket or PIC_S3_BUCKET"
                    .to_string(),
            );
        }

        if self.token_ttl_hours == 0 {
            return Err("token_ttl_hours must be greater than 0".to_string());
        }
        if self.request_timeout == 0 {
            return Err("request_timeout must be greater than 0".to_string());
        }
        if self.media_url_ttl == 0 {
            return Err("media_url_ttl must be greater than 0".to_string());
        }
        if self.max_upload_bytes == 0 {
            return Err("max_upload_bytes must be greater than 0".to_string());
        }
        if self.db_max_connections == 0 {
            return Err("db_max_connections must be greater than 0".to_string());
        }
        if url::Url::parse(&self.github_api_url).is_err() {
            return Err(format!("Invalid GitHub API URL: {}", self.github_api_url));
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The auth secret, or empty if unset (call validate() first).
    pub fn auth_secret_or_empty(&self) -> &str {
        self.auth_secret.as_deref().unwrap_or("")
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_hours.saturating_mul(3600))
    }

    pub fn media_url_ttl(&self) -> Duration {
        Duration::from_secs(self.media_url_ttl)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

// =============================================================================
// Tests
// =============================================================================
