//! S3-backed content store.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::debug;

use super::{is_valid_storage_key, ContentStore};
use crate::error::ContentError;

/// Stores each object under `{prefix}{key}` in one bucket.
#[derive(Clone)]
pub struct S3ContentStore {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3ContentStore {
    /// Create a store for `bucket`. `prefix` is prepended verbatim to every key
    /// (e.g. `"images/"`).
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_key(&self, key: &str) -> Result<String, ContentError> {
        if !is_valid_storage_key(key) {
            return Err(ContentError::InvalidKey(key.to_string()));
        }
        Ok(format!("{}{}", self.prefix, key))
    }
}

#[async_trait]
impl ContentStore for S3ContentStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), ContentError> {
        let object_key = self.object_key(key)?;
        let len = data.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| ContentError::S3(e.to_string()))?;

        debug!(bucket = %self.bucket, key = %object_key, bytes = len, "Stored content");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, ContentError> {
        let object_key = self.object_key(key)?;

        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| {
                let is_not_found = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);
                let status_is_404 = e
                    .raw_response()
                    .map(|r| r.status().as_u16() == 404)
                    .unwrap_or(false);

                if is_not_found || status_is_404 {
                    ContentError::NotFound(format!("s3://{}/{}", self.bucket, object_key))
                } else {
                    ContentError::S3(e.to_string())
                }
            })?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| ContentError::S3(e.to_string()))?
            .into_bytes();

        Ok(data)
    }

    async fn delete(&self, key: &str) -> Result<(), ContentError> {
        let object_key = self.object_key(key)?;

        // S3 reports success for missing keys
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| ContentError::S3(e.to_string()))?;

        Ok(())
    }

    fn identifier(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.prefix)
    }
}

/// Create an S3 client with optional custom endpoint and region.
///
/// Use a custom endpoint for S3-compatible services like MinIO:
/// ```ignore
/// let client = create_s3_client(Some("http://localhost:9000"), "us-east-1").await;
/// ```
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;

    // S3-compatible services generally need path-style addressing
    let s3_config = if endpoint_url.is_some() {
        aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build()
    } else {
        aws_sdk_s3::config::Builder::from(&sdk_config).build()
    };

    Client::from_conf(s3_config)
}
