//! S3 storage backend implementation
//!
//! Provides `S3Storage` which implements the core `StorageRead` and
//! `StorageWrite` traits for reading raw JSON sources from and writing
//! Parquet tables to Amazon S3.
//!
//! ## Timeout Configuration
//!
//! The `timeout_ms` setting controls the total operation timeout, which
//! includes SDK retry time.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_smithy_types::retry::RetryConfig;
use aws_smithy_types::timeout::TimeoutConfig;
use bytes::Bytes;

use tonelake_core::config::AwsConfig;
use tonelake_core::error::Error as CoreError;
use tonelake_core::{StorageRead, StorageWrite};

use crate::error::{AwsStorageError, Result};

/// S3 storage configuration
#[derive(Debug, Clone, Default)]
pub struct S3Config {
    /// S3 bucket name
    pub bucket: String,
    /// Optional key prefix
    pub prefix: Option<String>,
    /// Optional endpoint override (e.g. LocalStack/MinIO)
    pub endpoint: Option<String>,
    /// Operation timeout in milliseconds (optional)
    pub timeout_ms: Option<u64>,
    /// Max retries after the initial attempt
    pub max_retries: Option<u32>,
}

/// S3-based storage backend
///
/// Clones are cheap: the underlying AWS SDK `Client` uses `Arc` internally.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    prefix: Option<String>,
}

impl Debug for S3Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Storage")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl S3Storage {
    /// Create a new S3 storage backend from an AWS SDK config.
    pub fn new(sdk_config: &aws_config::SdkConfig, config: S3Config) -> Result<Self> {
        if sdk_config.region().is_none() && config.endpoint.is_none() {
            return Err(AwsStorageError::MissingRegion);
        }

        // Inherit from SdkConfig (HTTP client, credentials, region) then
        // apply our overrides
        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(sdk_config);

        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint)
                .force_path_style(true);
        }

        if let Some(max_retries) = config.max_retries {
            // AWS SDK "max attempts" = initial attempt + retries
            let max_attempts = max_retries.saturating_add(1).max(1);
            s3_config_builder =
                s3_config_builder.retry_config(RetryConfig::standard().with_max_attempts(max_attempts));
        }

        if let Some(timeout_ms) = config.timeout_ms {
            let timeout_config = TimeoutConfig::builder()
                .operation_timeout(Duration::from_millis(timeout_ms))
                .build();
            s3_config_builder = s3_config_builder.timeout_config(timeout_config);
        }

        let client = Client::from_conf(s3_config_builder.build());

        Ok(Self {
            client,
            bucket: config.bucket,
            prefix: config.prefix,
        })
    }

    /// Create S3 storage for an `s3://bucket/prefix` root using the explicit
    /// credentials from the pipeline configuration. Falls back to the default
    /// SDK credential chain when the config carries no keys.
    pub async fn for_root(root: &str, aws: Option<&AwsConfig>) -> Result<Self> {
        let (bucket, prefix) = Self::parse_s3_uri(root)?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(aws) = aws {
            if let (Some(access_key), Some(secret_key)) =
                (&aws.access_key_id, &aws.secret_access_key)
            {
                let creds = aws_credential_types::Credentials::new(
                    access_key,
                    secret_key,
                    None,
                    None,
                    "lake-config",
                );
                loader = loader.credentials_provider(creds);
            }
            if let Some(region) = &aws.region {
                loader = loader.region(aws_config::Region::new(region.clone()));
            }
        }

        let sdk_config = loader.load().await;

        Self::new(
            &sdk_config,
            S3Config {
                bucket: bucket.to_string(),
                prefix: if prefix.is_empty() {
                    None
                } else {
                    Some(prefix.trim_end_matches('/').to_string())
                },
                endpoint: aws.and_then(|a| a.endpoint.clone()),
                ..Default::default()
            },
        )
    }

    /// Parse an S3 URI into (bucket, key prefix).
    ///
    /// Supports `s3://bucket`, `s3://bucket/prefix`, and the Hadoop-style
    /// `s3a://` scheme.
    pub fn parse_s3_uri(uri: &str) -> Result<(&str, &str)> {
        let path = uri
            .strip_prefix("s3://")
            .or_else(|| uri.strip_prefix("s3a://"))
            .ok_or_else(|| {
                AwsStorageError::invalid_uri(format!("must start with s3://: {}", uri))
            })?;

        let (bucket, key) = match path.split_once('/') {
            Some((bucket, key)) => (bucket, key),
            None => (path, ""),
        };

        if bucket.is_empty() {
            return Err(AwsStorageError::invalid_uri("empty bucket name"));
        }

        Ok((bucket, key))
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Get the key prefix
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Scope a storage key under the configured prefix.
    fn to_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, key),
            None => key.to_string(),
        }
    }

    /// Strip the configured prefix from an S3 object key.
    fn to_storage_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => key
                .strip_prefix(prefix.as_str())
                .map(|k| k.trim_start_matches('/'))
                .unwrap_or(key)
                .to_string(),
            None => key.to_string(),
        }
    }
}

#[async_trait]
impl StorageRead for S3Storage {
    async fn read_bytes(&self, key: &str) -> std::result::Result<Bytes, CoreError> {
        let object_key = self.to_key(key);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    CoreError::not_found(key)
                } else {
                    CoreError::storage(format!("S3 GetObject failed: {}", service_err))
                }
            })?;

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| CoreError::storage(format!("Failed to read S3 body: {}", e)))?;

        Ok(body.into_bytes())
    }

    async fn exists(&self, key: &str) -> std::result::Result<bool, CoreError> {
        let object_key = self.to_key(key);

        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(CoreError::storage(format!(
                        "S3 HeadObject failed: {}",
                        service_err
                    )))
                }
            }
        }
    }

    async fn list_prefix(&self, prefix: &str) -> std::result::Result<Vec<String>, CoreError> {
        let object_prefix = self.to_key(prefix);
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&object_prefix);

            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(|e| {
                CoreError::storage(format!("S3 ListObjectsV2 failed: {}", e.into_service_error()))
            })?;

            for object in response.contents() {
                if let Some(key) = object.key() {
                    keys.push(self.to_storage_key(key));
                }
            }

            match response.next_continuation_token() {
                Some(token) => continuation_token = Some(token.to_string()),
                None => break,
            }
        }

        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl StorageWrite for S3Storage {
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> std::result::Result<(), CoreError> {
        let object_key = self.to_key(key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .body(ByteStream::from(bytes.to_vec()))
            .send()
            .await
            .map_err(|e| {
                CoreError::storage(format!("S3 PutObject failed: {}", e.into_service_error()))
            })?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> std::result::Result<(), CoreError> {
        let object_key = self.to_key(key);

        // DeleteObject is idempotent: deleting a missing key succeeds
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| {
                CoreError::storage(format!("S3 DeleteObject failed: {}", e.into_service_error()))
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3_uri() {
        let (bucket, prefix) = S3Storage::parse_s3_uri("s3://my-bucket/path/to/data/").unwrap();
        assert_eq!(bucket, "my-bucket");
        assert_eq!(prefix, "path/to/data/");

        let (bucket, prefix) = S3Storage::parse_s3_uri("s3://my-bucket").unwrap();
        assert_eq!(bucket, "my-bucket");
        assert_eq!(prefix, "");

        // Hadoop-style scheme
        let (bucket, _) = S3Storage::parse_s3_uri("s3a://bucket/key").unwrap();
        assert_eq!(bucket, "bucket");

        assert!(S3Storage::parse_s3_uri("http://bucket/key").is_err());
        assert!(S3Storage::parse_s3_uri("s3:///key").is_err());
    }
}
