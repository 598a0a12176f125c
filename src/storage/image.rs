//! Source-image storage: primary bytes plus crypto-key and detector
//! sidecar objects.
//!
//! Writes are best-effort: an upstream failure is logged and reported
//! as absent rather than failing the request. The one exception is
//! enabling per-image crypto keys without configuring a signing key,
//! which is a startup-time misconfiguration and fails fatally.

use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::base::StorageBase;
use crate::bucket::ObjectBucket;
use crate::config::S3Config;
use crate::context::RequestContext;
use crate::errors::StorageError;
use crate::keys;

pub struct ImageStorage {
    base: StorageBase,
    security_key: Option<String>,
    stores_crypto_key: bool,
}

impl ImageStorage {
    pub fn new(config: &S3Config, bucket: Arc<dyn ObjectBucket>) -> Self {
        Self {
            base: StorageBase::new(config.storage_settings(), bucket),
            security_key: config.security_key.clone(),
            stores_crypto_key: config.stores_crypto_key_for_each_image,
        }
    }

    /// Store image bytes at `path`. Returns the logical path on
    /// success, absent on upstream failure.
    pub async fn put(&self, ctx: &RequestContext, path: &str, data: Bytes) -> Option<String> {
        let key = self.base.normalize(ctx, path);
        match self.base.put_object(&key, data, None).await {
            Ok(()) => Some(path.to_string()),
            Err(err) => {
                error!(%key, error = %err, "unable to store object");
                None
            }
        }
    }

    /// Store the server signing key in a sidecar next to the image.
    ///
    /// No-op unless per-image crypto keys are enabled. Enabling them
    /// without a configured signing key is a fatal
    /// [`StorageError::Configuration`], not a silent skip.
    pub async fn put_crypto(
        &self,
        ctx: &RequestContext,
        path: &str,
    ) -> Result<Option<String>, StorageError> {
        if !self.stores_crypto_key {
            return Ok(None);
        }

        let Some(security_key) = self.security_key.as_deref() else {
            return Err(StorageError::Configuration(
                "stores_crypto_key_for_each_image requires a security_key".to_string(),
            ));
        };

        let key = self.base.normalize(ctx, path);
        let crypto_key = keys::sidecar_path(&key, keys::CRYPTO_SUFFIX);
        let payload = Bytes::copy_from_slice(security_key.as_bytes());

        match self.base.put_object(&crypto_key, payload, None).await {
            Ok(()) => {
                debug!(%crypto_key, "stored crypto key");
                Ok(Some(key))
            }
            Err(err) => {
                error!(%crypto_key, error = %err, "unable to store crypto key");
                Ok(None)
            }
        }
    }

    /// Serialize detector metadata to the `.detectors.txt` sidecar.
    pub async fn put_detector_data(
        &self,
        ctx: &RequestContext,
        path: &str,
        data: &serde_json::Value,
    ) -> Option<String> {
        let key = self.base.normalize(ctx, path);
        let detector_key = keys::sidecar_path(&key, keys::DETECTOR_SUFFIX);

        let payload = match serde_json::to_vec(data) {
            Ok(payload) => payload,
            Err(err) => {
                error!(%detector_key, error = %err, "unable to serialize detector data");
                return None;
            }
        };

        match self
            .base
            .put_object(&detector_key, Bytes::from(payload), None)
            .await
        {
            Ok(()) => Some(key),
            Err(err) => {
                error!(%detector_key, error = %err, "unable to store detector data");
                None
            }
        }
    }

    /// Fetch image bytes; absent when missing, errored or expired.
    pub async fn get(&self, ctx: &RequestContext, path: &str) -> Option<Bytes> {
        let key = self.base.normalize(ctx, path);
        self.base.get_fresh(&key).await.map(|object| object.data)
    }

    /// Fetch the crypto sidecar for `path`.
    pub async fn get_crypto(&self, ctx: &RequestContext, path: &str) -> Option<String> {
        let key = self.base.normalize(ctx, path);
        let crypto_key = keys::sidecar_path(&key, keys::CRYPTO_SUFFIX);

        let object = match self.base.bucket.get(&crypto_key).await {
            Ok(object) => object,
            Err(err) if err.is_not_found() => {
                warn!(%crypto_key, "crypto key not found");
                return None;
            }
            Err(err) => {
                warn!(%crypto_key, error = %err, "failed to fetch crypto key");
                return None;
            }
        };

        match String::from_utf8(object.data.to_vec()) {
            Ok(security_key) => Some(security_key),
            Err(_) => {
                warn!(%crypto_key, "crypto sidecar is not valid UTF-8");
                None
            }
        }
    }

    /// Fetch and deserialize detector metadata; absent when missing,
    /// errored or expired.
    pub async fn get_detector_data(
        &self,
        ctx: &RequestContext,
        path: &str,
    ) -> Option<serde_json::Value> {
        let key = self.base.normalize(ctx, path);
        let detector_key = keys::sidecar_path(&key, keys::DETECTOR_SUFFIX);

        let object = self.base.get_fresh(&detector_key).await?;
        match serde_json::from_slice(&object.data) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(%detector_key, error = %err, "detector sidecar is not valid JSON");
                None
            }
        }
    }

    pub async fn exists(&self, ctx: &RequestContext, path: &str) -> bool {
        let key = self.base.normalize(ctx, path);
        self.base.bucket.exists(&key).await
    }

    pub async fn remove(&self, ctx: &RequestContext, path: &str) -> Result<(), StorageError> {
        let key = self.base.normalize(ctx, path);
        self.base.bucket.delete(&key).await
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::memory::MemoryBucket;
    use serde_json::json;
    use std::time::{Duration, SystemTime};

    const IMAGE_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x01, 0x02, 0x03];

    fn storage_with(config: S3Config) -> (ImageStorage, Arc<MemoryBucket>) {
        let bucket = Arc::new(MemoryBucket::new("source-images"));
        (ImageStorage::new(&config, bucket.clone()), bucket)
    }

    fn config_with_root(root_path: &str) -> S3Config {
        let mut config = S3Config::default();
        config.storage.bucket = "source-images".to_string();
        config.storage.root_path = root_path.to_string();
        config
    }

    #[tokio::test]
    async fn put_get_round_trip_under_root_path() {
        let (storage, bucket) = storage_with(config_with_root("root"));
        let ctx = RequestContext::default();

        let stored = storage
            .put(&ctx, "images/1.jpg", Bytes::from_static(IMAGE_BYTES))
            .await;
        assert_eq!(stored.as_deref(), Some("images/1.jpg"));
        assert!(bucket.exists("root/images/1.jpg").await);

        let fetched = storage.get(&ctx, "images/1.jpg").await.unwrap();
        assert_eq!(&fetched[..], IMAGE_BYTES);
    }

    #[tokio::test]
    async fn get_missing_path_is_absent() {
        let (storage, _bucket) = storage_with(config_with_root(""));
        assert!(storage
            .get(&RequestContext::default(), "nope.jpg")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn expired_object_reads_as_absent() {
        let mut config = config_with_root("");
        config.storage.expiration_seconds = 60;
        let (storage, bucket) = storage_with(config);
        let ctx = RequestContext::default();

        storage
            .put(&ctx, "old.jpg", Bytes::from_static(IMAGE_BYTES))
            .await
            .unwrap();
        bucket
            .set_last_modified("old.jpg", Some(SystemTime::now() - Duration::from_secs(61)))
            .await;
        assert!(storage.get(&ctx, "old.jpg").await.is_none());

        bucket
            .set_last_modified("old.jpg", Some(SystemTime::now() - Duration::from_secs(59)))
            .await;
        assert!(storage.get(&ctx, "old.jpg").await.is_some());
    }

    #[tokio::test]
    async fn zero_ttl_reads_arbitrarily_old_objects() {
        let mut config = config_with_root("");
        config.storage.expiration_seconds = 0;
        let (storage, bucket) = storage_with(config);
        let ctx = RequestContext::default();

        storage
            .put(&ctx, "ancient.jpg", Bytes::from_static(IMAGE_BYTES))
            .await
            .unwrap();
        bucket
            .set_last_modified(
                "ancient.jpg",
                Some(SystemTime::now() - Duration::from_secs(1_000_000)),
            )
            .await;
        assert!(storage.get(&ctx, "ancient.jpg").await.is_some());
    }

    #[tokio::test]
    async fn crypto_disabled_never_writes_the_sidecar() {
        let (storage, bucket) = storage_with(config_with_root(""));
        let ctx = RequestContext::default();

        let stored = storage.put_crypto(&ctx, "images/1.jpg").await.unwrap();
        assert!(stored.is_none());
        assert!(!bucket.exists("images/1.txt").await);
        assert!(storage.get_crypto(&ctx, "images/1.jpg").await.is_none());
    }

    #[tokio::test]
    async fn crypto_enabled_without_key_is_a_configuration_error() {
        let mut config = config_with_root("");
        config.stores_crypto_key_for_each_image = true;
        let (storage, _bucket) = storage_with(config);

        let err = storage
            .put_crypto(&RequestContext::default(), "images/1.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Configuration(_)));
    }

    #[tokio::test]
    async fn crypto_round_trip() {
        let mut config = config_with_root("root");
        config.stores_crypto_key_for_each_image = true;
        config.security_key = Some("MY-SECURITY-KEY".to_string());
        let (storage, bucket) = storage_with(config);
        let ctx = RequestContext::default();

        let stored = storage.put_crypto(&ctx, "images/1.jpg").await.unwrap();
        assert_eq!(stored.as_deref(), Some("root/images/1.jpg"));
        assert!(bucket.exists("root/images/1.txt").await);

        let fetched = storage.get_crypto(&ctx, "images/1.jpg").await.unwrap();
        assert_eq!(fetched, "MY-SECURITY-KEY");
    }

    #[tokio::test]
    async fn detector_data_round_trip() {
        let (storage, bucket) = storage_with(config_with_root("root"));
        let ctx = RequestContext::default();
        let data = json!({
            "focal_points": [{"x": 10, "y": 20, "width": 4, "height": 4}],
            "detector": "face",
        });

        let stored = storage
            .put_detector_data(&ctx, "images/1.jpg", &data)
            .await;
        assert_eq!(stored.as_deref(), Some("root/images/1.jpg"));
        assert!(bucket.exists("root/images/1.detectors.txt").await);

        let fetched = storage
            .get_detector_data(&ctx, "images/1.jpg")
            .await
            .unwrap();
        assert_eq!(fetched, data);
    }

    #[tokio::test]
    async fn missing_detector_data_is_absent() {
        let (storage, _bucket) = storage_with(config_with_root(""));
        assert!(storage
            .get_detector_data(&RequestContext::default(), "images/1.jpg")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn exists_and_remove_are_normalized_delegations() {
        let (storage, _bucket) = storage_with(config_with_root("root"));
        let ctx = RequestContext::default();

        storage
            .put(&ctx, "images/1.jpg", Bytes::from_static(IMAGE_BYTES))
            .await
            .unwrap();
        assert!(storage.exists(&ctx, "images/1.jpg").await);

        storage.remove(&ctx, "images/1.jpg").await.unwrap();
        assert!(!storage.exists(&ctx, "images/1.jpg").await);
        // Removing again is fine.
        storage.remove(&ctx, "images/1.jpg").await.unwrap();
    }

    #[tokio::test]
    async fn randomized_keys_stay_deterministic_through_the_adapter() {
        let mut config = config_with_root("root");
        config.randomize_keys = true;
        let (storage, _bucket) = storage_with(config);
        let ctx = RequestContext::default();

        storage
            .put(&ctx, "images/1.jpg", Bytes::from_static(IMAGE_BYTES))
            .await
            .unwrap();
        // The randomized physical key is re-derived on read, not indexed.
        assert!(storage.get(&ctx, "images/1.jpg").await.is_some());
        assert!(storage.exists(&ctx, "images/1.jpg").await);
    }

    #[tokio::test]
    async fn auto_webp_varies_the_key_with_the_request() {
        let mut config = config_with_root("");
        config.auto_webp = true;
        let (storage, bucket) = storage_with(config);

        let webp_ctx = RequestContext {
            accepts_webp: true,
            ..RequestContext::default()
        };
        storage
            .put(&webp_ctx, "images/1.jpg", Bytes::from_static(IMAGE_BYTES))
            .await
            .unwrap();
        assert!(bucket.exists("images/1.jpg/webp").await);

        // A non-webp request addresses a different object.
        assert!(storage
            .get(&RequestContext::default(), "images/1.jpg")
            .await
            .is_none());
    }
}
