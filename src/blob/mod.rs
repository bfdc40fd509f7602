//! Remote blob store boundary.
//!
//! Photos live in a Firebase-style object store under a fixed folder. The
//! `BlobStore` trait is the seam the dedup layer works against; the HTTP
//! implementation targets the store's v0 REST surface.

pub mod error;

pub use error::StorageError;

use async_trait::async_trait;

/// Folder under which all catalog photos live in the bucket.
const IMAGES_FOLDER: &str = "car_images";

/// Public endpoint of the store.
const STORE_ENDPOINT: &str = "https://firebasestorage.googleapis.com/";

/// Short-form scheme for store references.
const STORE_SCHEME: &str = "gs://";

/// Whether a reference points into the remote store. Matches the public
/// endpoint prefix, the short-form scheme, or the store's host substring
/// (covering region-qualified hosts).
pub fn is_store_url(url: &str) -> bool {
    url.starts_with(STORE_ENDPOINT) || url.starts_with(STORE_SCHEME) || url.contains("firebasestorage")
}

/// Remote object store for photo payloads.
///
/// Object-safe so it can be shared as `Arc<dyn BlobStore>` across concurrent
/// mutations and swapped for a double under test.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload `bytes` under `name`, returning the durable public URL.
    async fn put(&self, bytes: &[u8], name: &str) -> Result<String, StorageError>;

    /// Delete the blob behind a previously returned URL.
    async fn delete(&self, url: &str) -> Result<(), StorageError>;

    /// Whether a reference already points into this store.
    fn is_store_url(&self, url: &str) -> bool;
}

/// HTTP implementation against the store's v0 REST API.
pub struct FirebaseStore {
    http: reqwest::Client,
    bucket: String,
}

impl FirebaseStore {
    pub fn new(http: reqwest::Client, bucket: impl Into<String>) -> Self {
        Self {
            http,
            bucket: bucket.into(),
        }
    }

    /// Endpoint for uploading an object. The folder separator is
    /// percent-encoded: object names are a single path segment in v0.
    fn upload_url(&self, name: &str) -> String {
        format!(
            "{STORE_ENDPOINT}v0/b/{}/o?name={IMAGES_FOLDER}%2F{name}",
            self.bucket
        )
    }

    /// Durable download URL for an uploaded object.
    fn download_url(&self, name: &str, token: &str) -> String {
        format!(
            "{STORE_ENDPOINT}v0/b/{}/o/{IMAGES_FOLDER}%2F{name}?alt=media&token={token}",
            self.bucket
        )
    }
}

#[async_trait]
impl BlobStore for FirebaseStore {
    async fn put(&self, bytes: &[u8], name: &str) -> Result<String, StorageError> {
        let response = self
            .http
            .post(self.upload_url(name))
            .header("content-type", "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::HttpStatus {
                status: status.as_u16(),
                object: name.to_string(),
            });
        }

        let body: serde_json::Value = response.json().await?;
        let token = body
            .get("downloadTokens")
            .and_then(|v| v.as_str())
            .and_then(|t| t.split(',').next())
            .ok_or_else(|| StorageError::InvalidResponse("missing download token".to_string()))?;

        Ok(self.download_url(name, token))
    }

    async fn delete(&self, url: &str) -> Result<(), StorageError> {
        // The durable URL doubles as the object endpoint; dropping the query
        // string yields the resource to DELETE.
        let endpoint = url.split('?').next().unwrap_or(url);
        let response = self.http.delete(endpoint).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::HttpStatus {
                status: status.as_u16(),
                object: url.to_string(),
            });
        }
        Ok(())
    }

    fn is_store_url(&self, url: &str) -> bool {
        is_store_url(url)
    }
}
