//! Presigning loader: generates a time-limited signed URL for the
//! object and delegates the actual transfer to the host's HTTP loader.
//!
//! Useful when the image server should not proxy object bytes through
//! its own credentials path, or when the HTTP layer adds caching.

use std::sync::Arc;
use tracing::warn;

use super::{bucket_and_key, use_http_loader, validate_bucket, HttpLoader, LoaderResult};
use crate::bucket::{BucketProvider, SignedUrlMethod};
use crate::client::BucketIdentity;
use crate::config::S3Config;
use crate::context::RequestContext;

pub struct PresigningLoader {
    config: Arc<S3Config>,
    provider: Arc<dyn BucketProvider>,
    http_loader: Arc<dyn HttpLoader>,
}

impl PresigningLoader {
    /// The HTTP loader is mandatory here: it performs every transfer.
    pub fn new(
        config: Arc<S3Config>,
        provider: Arc<dyn BucketProvider>,
        http_loader: Arc<dyn HttpLoader>,
    ) -> Self {
        Self {
            config,
            provider,
            http_loader,
        }
    }

    /// Resolve `locator` via a presigned URL.
    ///
    /// Same derivation and allow-list validation as the direct loader;
    /// a rejected bucket returns immediately without generating a URL.
    pub async fn load(&self, ctx: &RequestContext, locator: &str) -> LoaderResult {
        if use_http_loader(&self.config.loader, locator) {
            return self.http_loader.load(ctx, locator).await;
        }

        let (bucket_name, key) = bucket_and_key(&self.config.loader, locator);

        if !validate_bucket(&self.config.loader, &bucket_name) {
            warn!(bucket = %bucket_name, "bucket not in allow-list");
            return LoaderResult::not_found();
        }

        let identity = BucketIdentity::from_config(&self.config, &bucket_name);
        let bucket = match self.provider.bucket(identity).await {
            Ok(bucket) => bucket,
            Err(err) => {
                warn!(bucket = %bucket_name, error = %err, "unable to open bucket");
                return LoaderResult::upstream();
            }
        };

        let expiry = self.config.loader.presign_expiry_seconds;
        let url = match bucket
            .get_signed_url(&key, SignedUrlMethod::Get, expiry)
            .await
        {
            Ok(url) => url,
            Err(err) if err.is_not_found() => return LoaderResult::not_found(),
            Err(err) => {
                warn!(%key, error = %err, "unable to generate signed url");
                return LoaderResult::upstream();
            }
        };

        self.http_loader.load(ctx, &url).await
    }
}

// -- Tests -------------------------------------------------------------------
