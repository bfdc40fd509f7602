//! Content-addressed photo upload resolution.
//!
//! Given a locally selected image, decides whether it needs uploading at all:
//! references already inside the store pass through untouched, and payloads
//! whose content hash is in the persistent cache reuse the URL of the
//! previous upload. Only genuinely new content is transferred, after which
//! the superseded remote blob (if any) is deleted best-effort.

pub mod error;

pub use error::UploadError;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use base64::Engine;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::blob::BlobStore;
use crate::cache::UploadCache;

/// Dedup layer in front of the blob store.
pub struct AssetCache {
    store: Arc<dyn BlobStore>,
    cache: Arc<dyn UploadCache>,
    /// Per-hash advisory locks, present only when identical-content uploads
    /// are serialized. Entries are never reaped; the set of distinct hashes
    /// seen by one process stays small.
    hash_locks: Option<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl AssetCache {
    pub fn new(store: Arc<dyn BlobStore>, cache: Arc<dyn UploadCache>) -> Self {
        Self {
            store,
            cache,
            hash_locks: None,
        }
    }

    /// Serialize concurrent resolves of byte-identical content.
    ///
    /// Off by default: without it, two concurrent resolves of the same new
    /// content can both miss the cache and both upload, leaving two remote
    /// blobs for identical bytes. With it, the second caller blocks on a
    /// per-hash lock and then observes the first caller's cache write.
    pub fn serialize_identical_uploads(mut self) -> Self {
        self.hash_locks = Some(Mutex::new(HashMap::new()));
        self
    }

    /// Resolve a candidate photo reference to a durable store URL, uploading
    /// at most once per distinct content.
    ///
    /// `previous_remote` is the record's photo URL before this mutation; when
    /// a new upload supersedes it, the old blob is deleted best-effort. A
    /// failed cleanup or cache write never fails the resolve; only a failed
    /// transfer of the new payload does.
    pub async fn resolve(
        &self,
        candidate: &str,
        previous_remote: &str,
    ) -> Result<String, UploadError> {
        // Only fully-qualified https references pass straight through;
        // gs:// short forms are recognized for validity checks but are not
        // directly usable as a record's photo URL.
        if candidate.starts_with("https://") && self.store.is_store_url(candidate) {
            return Ok(candidate.to_string());
        }

        let source = Path::new(candidate);
        let (hash, bytes) = hash_payload(source).await;

        let hash_guard = match &self.hash_locks {
            Some(locks) => Some(self.hash_lock(locks, &hash).lock_owned().await),
            None => None,
        };

        if let Some(url) = self.cached_url(&hash).await {
            tracing::debug!(hash = %hash, url = %url, "Reusing previously uploaded photo");
            return Ok(url);
        }

        let url = self.upload_new(source, bytes).await?;

        // A lost cache write only costs a future re-upload of the same bytes.
        if let Err(e) = self.cache.put(&hash, &url).await {
            tracing::warn!(hash = %hash, error = %e, "Failed to persist upload cache entry");
        }
        drop(hash_guard);

        if !previous_remote.is_empty() && self.store.is_store_url(previous_remote) {
            if let Err(e) = self.store.delete(previous_remote).await {
                tracing::warn!(url = %previous_remote, error = %e, "Failed to delete superseded photo");
            }
        }

        Ok(url)
    }

    /// Cached URL for a hash, if present and still store-shaped. Lookup
    /// failures count as misses.
    async fn cached_url(&self, hash: &str) -> Option<String> {
        match self.cache.get(hash).await {
            Ok(Some(url)) if self.store.is_store_url(&url) => Some(url),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(hash = %hash, error = %e, "Upload cache lookup failed");
                None
            }
        }
    }

    /// Transfer the payload under a fresh opaque name. Collisions on the
    /// generated name are treated as negligible; there is no collision retry.
    async fn upload_new(
        &self,
        source: &Path,
        bytes: Option<Vec<u8>>,
    ) -> Result<String, UploadError> {
        let bytes = match bytes {
            Some(bytes) => bytes,
            None => tokio::fs::read(source)
                .await
                .map_err(|e| UploadError::UnreadableSource {
                    path: source.display().to_string(),
                    source: e,
                })?,
        };

        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("jpg");
        let name = format!("{}.{extension}", Uuid::new_v4());

        let url = self.store.put(&bytes, &name).await?;
        tracing::info!(object = %name, bytes = bytes.len(), "Uploaded new photo");
        Ok(url)
    }

    fn hash_lock(
        &self,
        locks: &Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
        hash: &str,
    ) -> Arc<tokio::sync::Mutex<()>> {
        let mut table = locks.lock().expect("hash lock table poisoned");
        table.entry(hash.to_string()).or_default().clone()
    }
}

/// Content hash of the payload, plus the bytes when they were readable.
///
/// Hashing never fails: when the bytes cannot be read the key falls back to
/// source path + reported size, which keeps dedup working at reduced
/// precision (same file moved elsewhere re-uploads).
async fn hash_payload(source: &Path) -> (String, Option<Vec<u8>>) {
    match tokio::fs::read(source).await {
        Ok(bytes) => {
            let digest = Sha256::digest(&bytes);
            let hash = base64::engine::general_purpose::STANDARD.encode(digest);
            (hash, Some(bytes))
        }
        Err(e) => {
            tracing::debug!(
                path = %source.display(),
                error = %e,
                "Payload unreadable, falling back to path+size hash"
            );
            let size = tokio::fs::metadata(source)
                .await
                .map(|m| m.len())
                .unwrap_or(0);
            (format!("{}_{size}", source.display()), None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::StorageError;
    use crate::cache::{CacheError, CacheStatus};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Blob store double counting transfers and deletions.
    #[derive(Default)]
    struct MockStore {
        uploads: AtomicU32,
        deletes: AtomicU32,
        fail_put: bool,
        fail_delete: bool,
        upload_delay: Option<Duration>,
    }

    #[async_trait]
    impl BlobStore for MockStore {
        async fn put(&self, _bytes: &[u8], name: &str) -> Result<String, StorageError> {
            if let Some(delay) = self.upload_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_put {
                return Err(StorageError::HttpStatus {
                    status: 503,
                    object: name.to_string(),
                });
            }
            self.uploads.fetch_add(1, Ordering::SeqCst);
            Ok(format!("https://mock.firebasestorage.test/{name}"))
        }

        async fn delete(&self, url: &str) -> Result<(), StorageError> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            if self.fail_delete {
                return Err(StorageError::HttpStatus {
                    status: 500,
                    object: url.to_string(),
                });
            }
            Ok(())
        }

        fn is_store_url(&self, url: &str) -> bool {
            url.contains("firebasestorage")
        }
    }

    /// In-memory cache double counting lookups, optionally failing writes.
    #[derive(Default)]
    struct MockCache {
        entries: Mutex<HashMap<String, String>>,
        gets: AtomicU32,
        fail_put: bool,
    }

    #[async_trait]
    impl UploadCache for MockCache {
        async fn get(&self, hash: &str) -> Result<Option<String>, CacheError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            Ok(self.entries.lock().unwrap().get(hash).cloned())
        }

        async fn put(&self, hash: &str, url: &str) -> Result<(), CacheError> {
            if self.fail_put {
                return Err(CacheError::Query("disk full".to_string()));
            }
            self.entries
                .lock()
                .unwrap()
                .insert(hash.to_string(), url.to_string());
            Ok(())
        }

        async fn clear(&self) -> Result<u64, CacheError> {
            let mut entries = self.entries.lock().unwrap();
            let n = entries.len() as u64;
            entries.clear();
            Ok(n)
        }

        async fn status(&self) -> Result<CacheStatus, CacheError> {
            Ok(CacheStatus {
                entries: self.entries.lock().unwrap().len() as u64,
                newest_upload: None,
            })
        }
    }

    fn test_file(name: &str, contents: &[u8]) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("carkeep_upload_tests");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn asset_cache(store: MockStore, cache: MockCache) -> (AssetCache, Arc<MockStore>, Arc<MockCache>) {
        let store = Arc::new(store);
        let cache = Arc::new(cache);
        (
            AssetCache::new(store.clone(), cache.clone()),
            store,
            cache,
        )
    }

    #[tokio::test]
    async fn test_identical_content_uploads_once() {
        let (assets, store, _) = asset_cache(MockStore::default(), MockCache::default());

        let first = test_file("dedup_a.jpg", b"same bytes");
        let second = test_file("dedup_b.jpg", b"same bytes");

        let url1 = assets
            .resolve(first.to_str().unwrap(), "")
            .await
            .unwrap();
        let url2 = assets
            .resolve(second.to_str().unwrap(), "")
            .await
            .unwrap();

        assert_eq!(url1, url2);
        assert_eq!(store.uploads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_store_url_passes_through_untouched() {
        let (assets, store, cache) = asset_cache(MockStore::default(), MockCache::default());

        let candidate = "https://mock.firebasestorage.test/existing.jpg";
        let url = assets.resolve(candidate, "").await.unwrap();

        assert_eq!(url, candidate);
        assert_eq!(store.uploads.load(Ordering::SeqCst), 0);
        assert_eq!(cache.gets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_gs_scheme_is_not_a_passthrough() {
        // Short-form references are recognized for validity checks but are
        // not usable as a record URL, so they go down the upload path (and
        // fail here because there is no such local file).
        let (assets, _, _) = asset_cache(MockStore::default(), MockCache::default());
        let result = assets.resolve("gs://bucket/car_images/a.jpg", "").await;
        assert!(matches!(result, Err(UploadError::UnreadableSource { .. })));
    }

    #[tokio::test]
    async fn test_superseded_blob_deleted_after_upload() {
        let (assets, store, _) = asset_cache(MockStore::default(), MockCache::default());

        let path = test_file("supersede.jpg", b"new photo");
        let previous = "https://mock.firebasestorage.test/old.jpg";
        let url = assets
            .resolve(path.to_str().unwrap(), previous)
            .await
            .unwrap();

        assert_ne!(url, previous);
        assert_eq!(store.deletes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_cleanup_does_not_fail_resolve() {
        let store = MockStore {
            fail_delete: true,
            ..Default::default()
        };
        let (assets, store, _) = asset_cache(store, MockCache::default());

        let path = test_file("cleanup_fail.jpg", b"payload");
        let url = assets
            .resolve(
                path.to_str().unwrap(),
                "https://mock.firebasestorage.test/old.jpg",
            )
            .await
            .unwrap();

        assert!(url.contains("firebasestorage"));
        assert_eq!(store.deletes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_foreign_previous_ref_is_not_deleted() {
        let (assets, store, _) = asset_cache(MockStore::default(), MockCache::default());

        let path = test_file("foreign_prev.jpg", b"payload 2");
        assets
            .resolve(path.to_str().unwrap(), "https://example.com/elsewhere.jpg")
            .await
            .unwrap();

        assert_eq!(store.deletes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_upload_and_cleanup() {
        let (assets, store, _) = asset_cache(MockStore::default(), MockCache::default());

        let path = test_file("hit.jpg", b"cached content");
        let first = assets.resolve(path.to_str().unwrap(), "").await.unwrap();
        let second = assets
            .resolve(
                path.to_str().unwrap(),
                "https://mock.firebasestorage.test/prev.jpg",
            )
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(store.uploads.load(Ordering::SeqCst), 1);
        // Cache hit returns early: the previous blob stays current.
        assert_eq!(store.deletes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stale_cached_url_reuploads() {
        let (assets, store, cache) = asset_cache(MockStore::default(), MockCache::default());

        let path = test_file("stale.jpg", b"stale entry");
        let (hash, _) = hash_payload(&path).await;
        cache.put(&hash, "https://example.com/not-ours.jpg").await.unwrap();

        let url = assets.resolve(path.to_str().unwrap(), "").await.unwrap();
        assert!(url.contains("firebasestorage"));
        assert_eq!(store.uploads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transfer_failure_surfaces_and_leaves_cache_untouched() {
        let store = MockStore {
            fail_put: true,
            ..Default::default()
        };
        let (assets, _, cache) = asset_cache(store, MockCache::default());

        let path = test_file("put_fail.jpg", b"doomed");
        let result = assets.resolve(path.to_str().unwrap(), "").await;

        assert!(matches!(result, Err(UploadError::Transfer(_))));
        assert_eq!(cache.status().await.unwrap().entries, 0);
    }

    #[tokio::test]
    async fn test_cache_write_failure_degrades_to_reupload() {
        let cache = MockCache {
            fail_put: true,
            ..Default::default()
        };
        let (assets, store, _) = asset_cache(MockStore::default(), cache);

        let path = test_file("cache_fail.jpg", b"unpersisted");
        let url1 = assets.resolve(path.to_str().unwrap(), "").await.unwrap();
        let url2 = assets.resolve(path.to_str().unwrap(), "").await.unwrap();

        // Both calls succeed; losing the cache entry only costs a re-upload.
        assert!(url1.contains("firebasestorage"));
        assert!(url2.contains("firebasestorage"));
        assert_eq!(store.uploads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_source_fails_as_unreadable() {
        let (assets, _, _) = asset_cache(MockStore::default(), MockCache::default());
        let result = assets.resolve("/nonexistent/photo.jpg", "").await;
        assert!(matches!(result, Err(UploadError::UnreadableSource { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_same_content_uploads_twice_without_lock() {
        let store = MockStore {
            upload_delay: Some(Duration::from_millis(50)),
            ..Default::default()
        };
        let (assets, store, _) = asset_cache(store, MockCache::default());
        let assets = Arc::new(assets);

        let path = test_file("race_unlocked.jpg", b"raced bytes");
        let p1 = path.to_str().unwrap().to_string();
        let p2 = p1.clone();

        let a1 = assets.clone();
        let a2 = assets.clone();
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { a1.resolve(&p1, "").await }),
            tokio::spawn(async move { a2.resolve(&p2, "").await }),
        );
        r1.unwrap().unwrap();
        r2.unwrap().unwrap();

        // Both miss the cache before either writes it.
        assert_eq!(store.uploads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_same_content_uploads_once_with_lock() {
        let store = MockStore {
            upload_delay: Some(Duration::from_millis(50)),
            ..Default::default()
        };
        let store = Arc::new(store);
        let cache = Arc::new(MockCache::default());
        let assets = Arc::new(
            AssetCache::new(store.clone(), cache.clone()).serialize_identical_uploads(),
        );

        let path = test_file("race_locked.jpg", b"raced bytes locked");
        let p1 = path.to_str().unwrap().to_string();
        let p2 = p1.clone();

        let a1 = assets.clone();
        let a2 = assets.clone();
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { a1.resolve(&p1, "").await }),
            tokio::spawn(async move { a2.resolve(&p2, "").await }),
        );
        let url1 = r1.unwrap().unwrap();
        let url2 = r2.unwrap().unwrap();

        // The second caller blocks on the per-hash lock and then sees the
        // first caller's cache write.
        assert_eq!(url1, url2);
        assert_eq!(store.uploads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreadable_payload_falls_back_to_path_key() {
        let (hash, bytes) = hash_payload(Path::new("/nonexistent/fallback.jpg")).await;
        assert!(bytes.is_none());
        assert_eq!(hash, "/nonexistent/fallback.jpg_0");
    }

    #[tokio::test]
    async fn test_hash_is_content_derived_not_path_derived() {
        let a = test_file("hash_a.jpg", b"identical");
        let b = test_file("hash_b.jpg", b"identical");
        let c = test_file("hash_c.jpg", b"different");

        let (ha, _) = hash_payload(&a).await;
        let (hb, _) = hash_payload(&b).await;
        let (hc, _) = hash_payload(&c).await;

        assert_eq!(ha, hb);
        assert_ne!(ha, hc);
    }
}
