use super::{BlobStore, ObjectEntry, StoreError};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::{ObjectStore, PutPayload};
use std::time::Duration;
use tracing::debug;

/// Connection settings for an S3-compatible store
#[derive(Debug, Clone)]
pub struct S3Settings {
    /// Host (`minio.example.com`) or full URL (`http://localhost:9000`)
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    /// Use plain HTTP when `endpoint` carries no scheme
    pub insecure: bool,
    /// Lifetime of presigned document URLs
    pub url_ttl: Duration,
}

impl S3Settings {
    fn endpoint_url(&self) -> String {
        if self.endpoint.contains("://") {
            self.endpoint.trim_end_matches('/').to_string()
        } else if self.insecure {
            format!("http://{}", self.endpoint)
        } else {
            format!("https://{}", self.endpoint)
        }
    }
}

/// [`BlobStore`] over an S3-compatible service (AWS, MinIO, R2, ...)
#[derive(Debug)]
pub struct S3BlobStore {
    inner: AmazonS3,
    bucket: String,
    url_ttl: Duration,
}

impl S3BlobStore {
    pub fn connect(settings: &S3Settings) -> Result<Self, StoreError> {
        if settings.bucket.is_empty() {
            return Err(StoreError::Config("bucket name is empty".to_string()));
        }

        let endpoint = settings.endpoint_url();
        let inner = AmazonS3Builder::new()
            .with_endpoint(&endpoint)
            .with_bucket_name(&settings.bucket)
            .with_region(&settings.region)
            .with_access_key_id(&settings.access_key)
            .with_secret_access_key(&settings.secret_key)
            .with_allow_http(endpoint.starts_with("http://"))
            .with_virtual_hosted_style_request(false)
            .build()?;

        debug!(%endpoint, bucket = %settings.bucket, "connected object store");

        Ok(Self {
            inner,
            bucket: settings.bucket.clone(),
            url_ttl: settings.url_ttl,
        })
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn list(&self) -> BoxStream<'_, Result<ObjectEntry, StoreError>> {
        self.inner
            .list(None)
            .map(|item| {
                item.map(|meta| ObjectEntry {
                    key: meta.location.to_string(),
                    last_modified: meta.last_modified,
                    size: meta.size as u64,
                })
                .map_err(StoreError::from)
            })
            .boxed()
    }

    async fn put(&self, key: &str, bytes: Bytes) -> Result<(), StoreError> {
        self.inner
            .put(&ObjectPath::from(key), PutPayload::from(bytes))
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self.inner.delete(&ObjectPath::from(key)).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(err) => Err(StoreError::Delete {
                key: key.to_string(),
                message: err.to_string(),
            }),
        }
    }

    async fn document_url(&self, key: &str) -> Result<String, StoreError> {
        let url = self
            .inner
            .signed_url(Method::GET, &ObjectPath::from(key), self.url_ttl)
            .await?;
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(endpoint: &str, insecure: bool) -> S3Settings {
        S3Settings {
            endpoint: endpoint.to_string(),
            bucket: "uploads".to_string(),
            region: "us-east-1".to_string(),
            access_key: "access".to_string(),
            secret_key: "secret".to_string(),
            insecure,
            url_ttl: Duration::from_secs(3600),
        }
    }

    #[test]
    fn test_endpoint_url_defaults_to_https() {
        assert_eq!(
            settings("minio.example.com", false).endpoint_url(),
            "https://minio.example.com"
        );
    }

    #[test]
    fn test_endpoint_url_insecure() {
        assert_eq!(settings("localhost:9000", true).endpoint_url(), "http://localhost:9000");
    }

    #[test]
    fn test_endpoint_url_keeps_explicit_scheme() {
        assert_eq!(
            settings("http://127.0.0.1:9000/", false).endpoint_url(),
            "http://127.0.0.1:9000"
        );
    }

    #[test]
    fn test_connect_rejects_empty_bucket() {
        let mut settings = settings("minio.example.com", false);
        settings.bucket.clear();
        assert!(matches!(
            S3BlobStore::connect(&settings),
            Err(StoreError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_presigned_url_is_offline() {
        let store = S3BlobStore::connect(&settings("minio.example.com", false)).unwrap();
        let url = store.document_url("abc-scan.pdf").await.unwrap();
        assert!(url.starts_with("https://minio.example.com/uploads/abc-scan.pdf?"));
        assert!(url.contains("X-Amz-Signature="));
    }
}
