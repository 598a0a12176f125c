//! In-memory implementation of [`ObjectBucket`].
//!
//! Objects live in a `tokio::sync::RwLock<HashMap<..>>`. Used as a
//! no-network backend and as the test double for the storage adapters
//! and loaders; [`MemoryBucket::set_last_modified`] lets callers
//! construct objects of arbitrary age so the expiration policy is
//! testable.

use bytes::Bytes;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;

use super::{
    detect_content_type, BucketProvider, ObjectBucket, PutOptions, SignedUrlMethod, StoredObject,
};
use crate::client::BucketIdentity;
use crate::errors::StorageError;
use crate::keys;

/// In-memory bucket.
pub struct MemoryBucket {
    name: String,
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryBucket {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Name of the bucket, used in generated signed URLs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// Overwrite the stored timestamp for `key`, when present.
    pub async fn set_last_modified(&self, key: &str, when: Option<SystemTime>) {
        if let Some(object) = self.objects.write().await.get_mut(key) {
            object.last_modified = when;
        }
    }
}

impl ObjectBucket for MemoryBucket {
    fn exists(&self, key: &str) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let key = match keys::clean_key(&key) {
                Ok(key) => key,
                Err(_) => return false,
            };
            self.objects.read().await.contains_key(&key)
        })
    }

    fn get(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<StoredObject, StorageError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let key = keys::clean_key(&key)?;
            self.objects
                .read()
                .await
                .get(&key)
                .cloned()
                .ok_or(StorageError::NotFound { key })
        })
    }

    fn get_signed_url(
        &self,
        key: &str,
        method: SignedUrlMethod,
        expiry_seconds: u64,
    ) -> Pin<Box<dyn Future<Output = Result<String, StorageError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let key = keys::clean_key(&key)?;
            Ok(format!(
                "memory://{}/{}?method={:?}&expires={}",
                self.name, key, method, expiry_seconds
            ))
        })
    }

    fn put(
        &self,
        key: &str,
        data: Bytes,
        options: PutOptions,
    ) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let key = keys::clean_key(&key)?;
            let content_length = data.len() as u64;
            let object = StoredObject {
                content_type: Some(detect_content_type(&data).to_string()),
                metadata: options.metadata.unwrap_or_default(),
                last_modified: Some(SystemTime::now()),
                content_length,
                key: key.clone(),
                data,
            };
            self.objects.write().await.insert(key, object);
            Ok(())
        })
    }

    fn delete(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let key = keys::clean_key(&key)?;
            self.objects.write().await.remove(&key);
            Ok(())
        })
    }
}

/// Provider handing out named in-memory buckets; a bucket is created on
/// first use and shared thereafter.
#[derive(Default)]
pub struct MemoryBucketProvider {
    buckets: RwLock<HashMap<String, Arc<MemoryBucket>>>,
}

impl MemoryBucketProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared bucket named `name`, created if absent.
    pub async fn bucket_named(&self, name: &str) -> Arc<MemoryBucket> {
        let mut buckets = self.buckets.write().await;
        buckets
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryBucket::new(name)))
            .clone()
    }
}

impl BucketProvider for MemoryBucketProvider {
    fn bucket(
        &self,
        identity: BucketIdentity,
    ) -> Pin<Box<dyn Future<Output = Result<Arc<dyn ObjectBucket>, StorageError>> + Send + '_>>
    {
        Box::pin(async move {
            let bucket = self.bucket_named(&identity.bucket).await;
            Ok(bucket as Arc<dyn ObjectBucket>)
        })
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_round_trip_preserves_bytes() {
        let bucket = MemoryBucket::new("test");
        let payload = Bytes::from_static(&[0x00, 0xFF, 0xD8, 0x7F, 0x80]);

        bucket
            .put("a/b.bin", payload.clone(), PutOptions::default())
            .await
            .unwrap();

        let object = bucket.get("a/b.bin").await.unwrap();
        assert_eq!(object.data, payload);
        assert_eq!(object.content_length, payload.len() as u64);
        assert!(object.last_modified.is_some());
    }

    #[tokio::test]
    async fn round_trip_handles_empty_payload() {
        let bucket = MemoryBucket::new("test");
        bucket
            .put("empty", Bytes::new(), PutOptions::default())
            .await
            .unwrap();

        let object = bucket.get("empty").await.unwrap();
        assert!(object.data.is_empty());
        assert_eq!(object.content_length, 0);
    }

    #[tokio::test]
    async fn keys_are_cleaned_before_storage() {
        let bucket = MemoryBucket::new("test");
        bucket
            .put("//a//b.jpg", Bytes::from_static(b"x"), PutOptions::default())
            .await
            .unwrap();

        assert!(bucket.exists("a/b.jpg").await);
        assert!(bucket.exists("/a/b.jpg").await);
    }

    #[tokio::test]
    async fn get_missing_key_is_not_found() {
        let bucket = MemoryBucket::new("test");
        let err = bucket.get("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let bucket = MemoryBucket::new("test");
        bucket
            .put("k", Bytes::from_static(b"v"), PutOptions::default())
            .await
            .unwrap();

        assert_eq!(bucket.len().await, 1);

        bucket.delete("k").await.unwrap();
        assert!(!bucket.exists("k").await);
        assert!(bucket.is_empty().await);
        // Deleting again (or a never-existing key) raises nothing.
        bucket.delete("k").await.unwrap();
        bucket.delete("never-there").await.unwrap();
    }

    #[tokio::test]
    async fn exists_swallows_invalid_keys() {
        let bucket = MemoryBucket::new("test");
        assert!(!bucket.exists("/").await);
    }

    #[tokio::test]
    async fn signed_url_names_bucket_and_key() {
        let bucket = MemoryBucket::new("images-test");
        assert_eq!(bucket.name(), "images-test");
        let url = bucket
            .get_signed_url("/a/b.jpg", SignedUrlMethod::Get, 900)
            .await
            .unwrap();
        assert!(url.starts_with("memory://images-test/a/b.jpg"));
        assert!(url.contains("expires=900"));
    }

    #[tokio::test]
    async fn put_attaches_metadata_and_sniffs_content_type() {
        let bucket = MemoryBucket::new("test");
        let mut metadata = HashMap::new();
        metadata.insert("origin".to_string(), "unit-test".to_string());

        bucket
            .put(
                "img.jpg",
                Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xE0]),
                PutOptions {
                    metadata: Some(metadata),
                    ..PutOptions::default()
                },
            )
            .await
            .unwrap();

        let object = bucket.get("img.jpg").await.unwrap();
        assert_eq!(object.content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(object.metadata.get("origin").unwrap(), "unit-test");
    }

    #[tokio::test]
    async fn provider_reuses_named_buckets() {
        let provider = MemoryBucketProvider::new();
        let first = provider.bucket_named("a").await;
        first
            .put("k", Bytes::from_static(b"v"), PutOptions::default())
            .await
            .unwrap();

        let second = provider.bucket_named("a").await;
        assert!(second.exists("k").await);
        assert!(!provider.bucket_named("b").await.exists("k").await);
    }
}
