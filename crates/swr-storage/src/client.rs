//! S3-compatible blob client.
//!
//! Credentials are process-wide environment configuration, selected per job
//! by upload region and resolved once into an explicit client that is
//! passed down the call chain. No configuration at all means upload is
//! disabled and jobs succeed without a video result.

use std::path::Path;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Region used when the request does not name one.
pub const DEFAULT_UPLOAD_REGION: &str = "us";

/// Configuration for one region's blob backend.
#[derive(Debug, Clone)]
pub struct BlobConfig {
    /// S3 API endpoint URL
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket: String,
    /// Region label the credentials were resolved for
    pub region: String,
    /// Base URL for retrievable artifact links; path-style endpoint URLs
    /// are used when absent
    pub public_base_url: Option<String>,
}

impl BlobConfig {
    /// Resolve the credential set for a region from environment variables.
    ///
    /// Region-suffixed variables (`BLOB_EU_ENDPOINT_URL`, ...) take
    /// precedence over the unsuffixed set (`BLOB_ENDPOINT_URL`, ...).
    /// Returns `None` when no backend is configured for the region.
    pub fn resolve(region: Option<&str>) -> Option<Self> {
        let region = region.unwrap_or(DEFAULT_UPLOAD_REGION);
        let suffix: String = region
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        let var = |name: &str| {
            std::env::var(format!("BLOB_{suffix}_{name}"))
                .or_else(|_| std::env::var(format!("BLOB_{name}")))
                .ok()
        };

        Some(Self {
            endpoint_url: var("ENDPOINT_URL")?,
            access_key_id: var("ACCESS_KEY_ID")?,
            secret_access_key: var("SECRET_ACCESS_KEY")?,
            bucket: var("BUCKET")?,
            region: region.to_string(),
            public_base_url: var("PUBLIC_BASE_URL"),
        })
    }
}

/// Write-only blob storage client for one job.
#[derive(Clone)]
pub struct BlobClient {
    client: Client,
    bucket: String,
    endpoint_url: String,
    public_base_url: Option<String>,
}

impl BlobClient {
    /// Create a client from a resolved configuration.
    pub async fn new(config: BlobConfig) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "blob",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket,
            endpoint_url: config.endpoint_url.trim_end_matches('/').to_string(),
            public_base_url: config
                .public_base_url
                .map(|u| u.trim_end_matches('/').to_string()),
        })
    }

    /// Upload a file under the given key.
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        let path = path.as_ref();
        debug!("Uploading {} to {}", path.display(), key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!("Uploaded {} to {}", path.display(), key);
        Ok(())
    }

    /// Retrievable URL for an uploaded artifact.
    pub fn object_url(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{base}/{key}"),
            None => format!("{}/{}/{}", self.endpoint_url, self.bucket, key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_region_vars(suffix: &str) {
        std::env::set_var(format!("BLOB_{suffix}_ENDPOINT_URL"), "https://blob.example");
        std::env::set_var(format!("BLOB_{suffix}_ACCESS_KEY_ID"), "key");
        std::env::set_var(format!("BLOB_{suffix}_SECRET_ACCESS_KEY"), "secret");
        std::env::set_var(format!("BLOB_{suffix}_BUCKET"), "output");
    }

    #[test]
    fn test_resolve_region_suffixed() {
        set_region_vars("EU_TEST");
        let config = BlobConfig::resolve(Some("eu-test")).unwrap();
        assert_eq!(config.endpoint_url, "https://blob.example");
        assert_eq!(config.bucket, "output");
        assert_eq!(config.region, "eu-test");
    }

    #[test]
    fn test_resolve_defaults_to_fixed_region() {
        set_region_vars("US");
        let config = BlobConfig::resolve(None).unwrap();
        assert_eq!(config.region, DEFAULT_UPLOAD_REGION);
    }

    #[test]
    fn test_unconfigured_region_disables_upload() {
        assert!(BlobConfig::resolve(Some("nowhere")).is_none());
    }

    #[tokio::test]
    async fn test_object_url_path_style() {
        let client = BlobClient::new(BlobConfig {
            endpoint_url: "https://blob.example/".into(),
            access_key_id: "key".into(),
            secret_access_key: "secret".into(),
            bucket: "output".into(),
            region: "us".into(),
            public_base_url: None,
        })
        .await
        .unwrap();
        assert_eq!(
            client.object_url("abc.mp4"),
            "https://blob.example/output/abc.mp4"
        );
    }

    #[tokio::test]
    async fn test_object_url_public_base() {
        let client = BlobClient::new(BlobConfig {
            endpoint_url: "https://blob.example".into(),
            access_key_id: "key".into(),
            secret_access_key: "secret".into(),
            bucket: "output".into(),
            region: "us".into(),
            public_base_url: Some("https://cdn.example/".into()),
        })
        .await
        .unwrap();
        assert_eq!(client.object_url("abc.mp4"), "https://cdn.example/abc.mp4");
    }
}
