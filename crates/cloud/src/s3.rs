//! S3-compatible [`ObjectStorage`] (AWS S3, MinIO, OSS/COS S3 gateways).
//!
//! Provider URLs are downloaded with reqwest and uploaded with a single
//! `PutObject`; outputs are bounded video/image files, so no multipart.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use mediagen_core::storage::{ObjectHead, ObjectStorage, StorageError, StoredObject};

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// S3 settings.
///
/// | Env var                     | Required | Default                                  |
/// |-----------------------------|----------|------------------------------------------|
/// | `S3_BUCKET`                 | yes      | --                                       |
/// | `S3_REGION`                 | no       | `us-east-1`                              |
/// | `S3_ENDPOINT`               | no       | AWS endpoint for the region              |
/// | `S3_ACCESS_KEY_ID`          | no       | default AWS credential chain             |
/// | `S3_SECRET_ACCESS_KEY`      | no       | default AWS credential chain             |
/// | `S3_PUBLIC_BASE_URL`        | no       | derived from endpoint / bucket / region  |
/// | `S3_FORCE_PATH_STYLE`       | no       | `false`                                  |
/// | `S3_DOWNLOAD_TIMEOUT_SECS`  | no       | `300`                                    |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub public_base_url: Option<String>,
    pub force_path_style: bool,
    pub download_timeout_secs: u64,
}

impl S3Config {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: DEFAULT_REGION.into(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            public_base_url: None,
            force_path_style: false,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
        }
    }

    /// Load from the environment; `None` when `S3_BUCKET` is unset.
    pub fn from_env() -> Option<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Some(Self {
            bucket: var("S3_BUCKET")?,
            region: var("S3_REGION").unwrap_or_else(|| DEFAULT_REGION.into()),
            endpoint: var("S3_ENDPOINT"),
            access_key_id: var("S3_ACCESS_KEY_ID"),
            secret_access_key: var("S3_SECRET_ACCESS_KEY"),
            public_base_url: var("S3_PUBLIC_BASE_URL"),
            force_path_style: var("S3_FORCE_PATH_STYLE").is_some_and(|v| v == "true" || v == "1"),
            download_timeout_secs: var("S3_DOWNLOAD_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
        })
    }

    /// Base URL objects are publicly served from, without trailing slash.
    pub fn resolved_public_base(&self) -> String {
        if let Some(base) = &self.public_base_url {
            return base.trim_end_matches('/').to_string();
        }
        match &self.endpoint {
            Some(endpoint) if self.force_path_style => {
                format!("{}/{}", endpoint.trim_end_matches('/'), self.bucket)
            }
            Some(endpoint) => match endpoint.split_once("://") {
                Some((scheme, host)) => format!(
                    "{scheme}://{}.{}",
                    self.bucket,
                    host.trim_end_matches('/')
                ),
                None => format!("{}/{}", endpoint.trim_end_matches('/'), self.bucket),
            },
            None => format!("https://{}.s3.{}.amazonaws.com", self.bucket, self.region),
        }
    }
}

pub struct S3ObjectStorage {
    client: aws_sdk_s3::Client,
    http: reqwest::Client,
    bucket: String,
    public_base: String,
}

impl S3ObjectStorage {
    /// Build the S3 client from `config` and the ambient AWS settings.
    pub async fn from_config(config: &S3Config) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        if let (Some(key), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(
                key.clone(),
                secret.clone(),
                None,
                None,
                "mediagen-env",
            ));
        }
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint.clone());
        }
        let shared = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.force_path_style)
            .build();

        tracing::info!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = ?config.endpoint,
            "S3 object storage configured",
        );
        Self::new(
            aws_sdk_s3::Client::from_conf(s3_config),
            download_client(config.download_timeout_secs),
            config,
        )
    }

    pub fn new(client: aws_sdk_s3::Client, http: reqwest::Client, config: &S3Config) -> Self {
        Self {
            client,
            http,
            bucket: config.bucket.clone(),
            public_base: config.resolved_public_base(),
        }
    }

    async fn download(&self, url: &str) -> Result<(Vec<u8>, Option<String>), StorageError> {
        let download_error = |message: String| StorageError::Download {
            url: url.to_string(),
            message,
        };

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| download_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(download_error(format!("HTTP {}", response.status())));
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| download_error(e.to_string()))?;
        Ok((bytes.to_vec(), content_type))
    }
}

fn download_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_default()
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    async fn put_object_from_url(
        &self,
        source_url: &str,
        key: &str,
    ) -> Result<StoredObject, StorageError> {
        let (body, content_type) = self.download(source_url).await?;
        let size = body.len();

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body));
        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }
        request
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("PutObject {key} failed: {e}")))?;

        tracing::debug!(bucket = %self.bucket, key, size, "Object uploaded");
        Ok(StoredObject {
            key: key.to_string(),
            url: self.public_url(key),
        })
    }

    async fn head_object(&self, key: &str) -> Result<Option<ObjectHead>, StorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => Ok(Some(ObjectHead {
                key: key.to_string(),
                size_bytes: output.content_length(),
            })),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(None),
            Err(e) => Err(StorageError::Backend(format!("HeadObject {key} failed: {e}"))),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, key.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use httpmock::prelude::*;

    use super::*;

    fn offline_storage(config: &S3Config) -> S3ObjectStorage {
        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(Credentials::new("k", "s", None, None, "test"))
            .build();
        S3ObjectStorage::new(
            aws_sdk_s3::Client::from_conf(s3_config),
            download_client(5),
            config,
        )
    }

    #[test]
    fn public_base_defaults_to_virtual_host() {
        let config = S3Config {
            region: "eu-west-1".into(),
            ..S3Config::new("media")
        };
        assert_eq!(
            config.resolved_public_base(),
            "https://media.s3.eu-west-1.amazonaws.com"
        );
    }

    #[test]
    fn public_base_follows_custom_endpoint() {
        let path_style = S3Config {
            endpoint: Some("http://minio:9000/".into()),
            force_path_style: true,
            ..S3Config::new("media")
        };
        assert_eq!(path_style.resolved_public_base(), "http://minio:9000/media");

        let virtual_host = S3Config {
            endpoint: Some("https://oss-cn-hangzhou.aliyuncs.com".into()),
            ..S3Config::new("media")
        };
        assert_eq!(
            virtual_host.resolved_public_base(),
            "https://media.oss-cn-hangzhou.aliyuncs.com"
        );
    }

    #[test]
    fn explicit_public_base_wins() {
        let config = S3Config {
            public_base_url: Some("https://cdn.example.com/".into()),
            ..S3Config::new("media")
        };
        let storage = offline_storage(&config);
        assert_eq!(
            storage.public_url("ai/video/m/u/t-0.mp4"),
            "https://cdn.example.com/ai/video/m/u/t-0.mp4"
        );
    }

    #[tokio::test]
    async fn failed_source_download_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/gone.mp4");
                then.status(404);
            })
            .await;

        let storage = offline_storage(&S3Config::new("media"));
        let result = storage
            .put_object_from_url(&server.url("/gone.mp4"), "ai/video/m/u/t-0.mp4")
            .await;
        assert_matches!(result, Err(StorageError::Download { .. }));
    }
}
