//! Object storage access for source images and thumbnails

use crate::error::{Result, ThumbnailError};
use crate::gcp_auth::AccessTokenSource;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, Url};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read a whole object
    async fn get_object(&self, bucket: &str, name: &str) -> Result<Bytes>;

    /// Write an object, replacing any existing one with the same name
    async fn put_object(&self, bucket: &str, name: &str, data: Bytes, content_type: &str)
        -> Result<()>;
}

/// Cloud Storage JSON API client
pub struct GcsObjectStore {
    client: Client,
    base_url: Url,
    auth: AccessTokenSource,
}

impl GcsObjectStore {
    pub fn new(client: Client, base_url: &str, auth: AccessTokenSource) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ThumbnailError::Config(format!("invalid storage URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ThumbnailError::Config(format!(
                "storage URL cannot be a base: {base_url}"
            )));
        }

        Ok(Self {
            client,
            base_url,
            auth,
        })
    }

    fn url_with_segments(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base was rejected in new(), so path_segments_mut succeeds
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn download_url(&self, bucket: &str, name: &str) -> Url {
        self.url_with_segments(&["storage", "v1", "b", bucket, "o", name])
    }

    fn upload_url(&self, bucket: &str) -> Url {
        self.url_with_segments(&["upload", "storage", "v1", "b", bucket, "o"])
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn get_object(&self, bucket: &str, name: &str) -> Result<Bytes> {
        let url = self.download_url(bucket, name);
        debug!("Downloading gs://{}/{}", bucket, name);

        let request = self
            .auth
            .authorize(self.client.get(url).query(&[("alt", "media")]))
            .await?;
        let response = request
            .send()
            .await
            .map_err(|e| ThumbnailError::StorageRead(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ThumbnailError::ObjectNotFound {
                bucket: bucket.to_string(),
                name: name.to_string(),
            }),
            status if !status.is_success() => Err(ThumbnailError::StorageRead(format!(
                "HTTP error: {status}"
            ))),
            _ => response
                .bytes()
                .await
                .map_err(|e| ThumbnailError::StorageRead(e.to_string())),
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        name: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<()> {
        let url = self.upload_url(bucket);
        debug!("Uploading {} bytes to gs://{}/{}", data.len(), bucket, name);

        let request = self
            .auth
            .authorize(
                self.client
                    .post(url)
                    .query(&[("uploadType", "media"), ("name", name)])
                    .header(reqwest::header::CONTENT_TYPE, content_type)
                    .body(data),
            )
            .await?;
        let response = request
            .send()
            .await
            .map_err(|e| ThumbnailError::StorageWrite(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ThumbnailError::StorageWrite(format!(
                "HTTP error: {status}: {text}"
            )));
        }

        Ok(())
    }
}

/// A stored object held by [`MemoryObjectStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
}

/// In-process object store keyed by `(bucket, name)`
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<(String, String), StoredObject>>,
    writes: RwLock<Vec<(String, String)>>,
    fail_writes: bool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose writes always fail
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub async fn insert(&self, bucket: &str, name: &str, data: impl Into<Bytes>) {
        self.objects.write().await.insert(
            (bucket.to_string(), name.to_string()),
            StoredObject {
                data: data.into(),
                content_type: "application/octet-stream".to_string(),
            },
        );
    }

    pub async fn object(&self, bucket: &str, name: &str) -> Option<StoredObject> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), name.to_string()))
            .cloned()
    }

    /// Every successful `put_object`, in order
    pub async fn writes(&self) -> Vec<(String, String)> {
        self.writes.read().await.clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get_object(&self, bucket: &str, name: &str) -> Result<Bytes> {
        self.object(bucket, name)
            .await
            .map(|stored| stored.data)
            .ok_or_else(|| ThumbnailError::ObjectNotFound {
                bucket: bucket.to_string(),
                name: name.to_string(),
            })
    }

    async fn put_object(
        &self,
        bucket: &str,
        name: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<()> {
        if self.fail_writes {
            return Err(ThumbnailError::StorageWrite(format!(
                "write to {bucket}/{name} refused"
            )));
        }

        let key = (bucket.to_string(), name.to_string());
        self.objects.write().await.insert(
            key.clone(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        self.writes.write().await.push(key);
        Ok(())
    }
}
