//! Behavior shared by the image and result storage adapters: key
//! normalization under the adapter's configuration, the read-side
//! expiration policy, and writes with the configured redundancy and
//! encryption flags.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, warn};

use crate::bucket::{ObjectBucket, PutOptions, StoredObject};
use crate::config::AdapterSettings;
use crate::context::RequestContext;
use crate::errors::StorageError;
use crate::keys;

pub(crate) struct StorageBase {
    pub settings: AdapterSettings,
    pub bucket: Arc<dyn ObjectBucket>,
}

impl StorageBase {
    pub fn new(settings: AdapterSettings, bucket: Arc<dyn ObjectBucket>) -> Self {
        Self { settings, bucket }
    }

    /// Physical key for a logical path under this adapter's settings.
    pub fn normalize(&self, ctx: &RequestContext, path: &str) -> String {
        keys::normalize_path(
            path,
            &self.settings.root_path,
            self.settings.auto_webp && ctx.accepts_webp,
            self.settings.randomize_keys,
            &self.settings.root_image_name,
        )
    }

    /// Read-side staleness check.
    ///
    /// An object without a timestamp is always treated as expired; a
    /// TTL of zero never expires. Timestamps in the future count as
    /// fresh.
    pub fn is_expired(&self, object: &StoredObject) -> bool {
        let Some(last_modified) = object.last_modified else {
            return true;
        };

        let ttl = self.settings.expiration_seconds;
        if ttl == 0 {
            return false;
        }

        match SystemTime::now().duration_since(last_modified) {
            Ok(age) => age.as_secs() > ttl,
            Err(_) => false,
        }
    }

    /// Write with the adapter's configured redundancy/encryption flags.
    pub async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        metadata: Option<HashMap<String, String>>,
    ) -> Result<(), StorageError> {
        self.bucket
            .put(
                key,
                data,
                PutOptions {
                    metadata,
                    reduced_redundancy: self.settings.reduced_redundancy,
                    encrypt: self.settings.server_side_encryption,
                },
            )
            .await
    }

    /// Fetch `key`, treating not-found, upstream failure and expiration
    /// uniformly as absent.
    pub async fn get_fresh(&self, key: &str) -> Option<StoredObject> {
        match self.bucket.get(key).await {
            Ok(object) => {
                if self.is_expired(&object) {
                    debug!(%key, "stored object expired");
                    None
                } else {
                    Some(object)
                }
            }
            Err(err) if err.is_not_found() => None,
            Err(err) => {
                warn!(%key, error = %err, "failed to fetch stored object");
                None
            }
        }
    }
}

// -- Tests -------------------------------------------------------------------
