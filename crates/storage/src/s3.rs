use crate::backend::{content_type_for, StorageBackend};
use crate::error::{Result, StorageError};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use regindex_types::StoragePath;

/// Connection settings for an S3-compatible endpoint.
#[derive(Debug, Clone, Default)]
pub struct S3Settings {
    pub bucket: String,
    /// Endpoint override for S3-compatible stores (MinIO, R2). Empty uses the
    /// default AWS endpoint for the region.
    pub endpoint: String,
    pub region: String,
    /// Path-style addressing (`endpoint/bucket/key`) instead of
    /// virtual-host style.
    pub path_style: bool,
}

/// Object store backed by an S3-compatible bucket.
pub struct S3Backend {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Backend {
    pub async fn connect(settings: S3Settings) -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if !settings.region.is_empty() {
            loader = loader.region(aws_config::Region::new(settings.region.clone()));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if !settings.endpoint.is_empty() {
            builder = builder.endpoint_url(settings.endpoint.clone());
        }
        builder = builder.force_path_style(settings.path_style);

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            bucket: settings.bucket,
        })
    }

    pub fn from_client(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    fn s3_err(path: &StoragePath, err: impl std::fmt::Display) -> StorageError {
        StorageError::S3Error {
            path: path.to_string(),
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    async fn read(&self, path: &StoragePath) -> Result<Vec<u8>> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path.as_str())
            .send()
            .await
            .map_err(|e| {
                let service = e.into_service_error();
                if service.is_no_such_key() {
                    StorageError::NotFound(path.clone())
                } else {
                    Self::s3_err(path, service)
                }
            })?;

        let bytes = object
            .body
            .collect()
            .await
            .map_err(|e| Self::s3_err(path, e))?;
        Ok(bytes.into_bytes().to_vec())
    }

    async fn write(&self, path: &StoragePath, bytes: &[u8]) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path.as_str())
            .content_type(content_type_for(path))
            .body(ByteStream::from(bytes.to_vec()))
            .send()
            .await
            .map_err(|e| Self::s3_err(path, e.into_service_error()))?;
        Ok(())
    }

    async fn remove_all(&self, prefix: &StoragePath) -> Result<()> {
        let list_prefix = format!("{prefix}/");
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&list_prefix);
            if let Some(token) = &continuation {
                request = request.continuation_token(token);
            }
            let page = request
                .send()
                .await
                .map_err(|e| Self::s3_err(prefix, e.into_service_error()))?;

            let keys: Vec<ObjectIdentifier> = page
                .contents()
                .iter()
                .filter_map(|object| object.key())
                .map(|key| {
                    ObjectIdentifier::builder()
                        .key(key)
                        .build()
                        .map_err(|e| Self::s3_err(prefix, e))
                })
                .collect::<Result<_>>()?;

            if !keys.is_empty() {
                let delete = Delete::builder()
                    .set_objects(Some(keys))
                    .build()
                    .map_err(|e| Self::s3_err(prefix, e))?;
                self.client
                    .delete_objects()
                    .bucket(&self.bucket)
                    .delete(delete)
                    .send()
                    .await
                    .map_err(|e| Self::s3_err(prefix, e.into_service_error()))?;
            }

            match page.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }
        Ok(())
    }
}
