//! Result storage: derived images cached under the request's canonical
//! URL.
//!
//! Failing to cache a result must never fail the request that produced
//! it, so writes log and report absent on upstream failure.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::error;

use super::base::StorageBase;
use crate::bucket::ObjectBucket;
use crate::config::S3Config;
use crate::context::RequestContext;

/// Headers and user metadata returned alongside a cached result.
#[derive(Debug, Clone)]
pub struct ResultMetadata {
    pub last_modified: Option<SystemTime>,
    pub content_length: u64,
    pub content_type: Option<String>,
    /// User metadata stored with the object (request headers, when
    /// enabled).
    pub extra: HashMap<String, String>,
}

/// A cached derived image.
#[derive(Debug, Clone)]
pub struct ResultObject {
    pub buffer: Bytes,
    pub metadata: ResultMetadata,
}

pub struct ResultStorage {
    base: StorageBase,
}

impl ResultStorage {
    pub fn new(config: &S3Config, bucket: Arc<dyn ObjectBucket>) -> Self {
        Self {
            base: StorageBase::new(config.result_storage_settings(), bucket),
        }
    }

    /// Cache a derived image under the request URL. Returns the
    /// physical key on success, absent on upstream failure.
    pub async fn put(&self, ctx: &RequestContext, data: Bytes) -> Option<String> {
        let key = self.base.normalize(ctx, &ctx.url);

        let metadata = if self.base.settings.store_metadata {
            Some(ctx.headers.clone())
        } else {
            None
        };

        match self.base.put_object(&key, data, metadata).await {
            Ok(()) => Some(key),
            Err(err) => {
                error!(%key, error = %err, "unable to store result image");
                None
            }
        }
    }

    /// Fetch a cached result; `path` defaults to the request URL.
    /// Absent when missing, errored or expired.
    pub async fn get(&self, ctx: &RequestContext, path: Option<&str>) -> Option<ResultObject> {
        let path = path.unwrap_or(&ctx.url);
        let key = self.base.normalize(ctx, path);

        let object = self.base.get_fresh(&key).await?;
        Some(ResultObject {
            metadata: ResultMetadata {
                last_modified: object.last_modified,
                content_length: object.content_length,
                content_type: object.content_type,
                extra: object.metadata,
            },
            buffer: object.data,
        })
    }
}

// -- Tests -------------------------------------------------------------------
