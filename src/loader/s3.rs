//! Direct S3 loader: fetches object bytes through the bucket façade.

use std::sync::Arc;
use tracing::warn;

use super::{bucket_and_key, use_http_loader, validate_bucket, HttpLoader, LoaderResult};
use crate::bucket::BucketProvider;
use crate::client::BucketIdentity;
use crate::config::S3Config;
use crate::context::RequestContext;

pub struct S3Loader {
    config: Arc<S3Config>,
    provider: Arc<dyn BucketProvider>,
    http_loader: Option<Arc<dyn HttpLoader>>,
}

impl S3Loader {
    pub fn new(
        config: Arc<S3Config>,
        provider: Arc<dyn BucketProvider>,
        http_loader: Option<Arc<dyn HttpLoader>>,
    ) -> Self {
        Self {
            config,
            provider,
            http_loader,
        }
    }

    /// Resolve `locator` to image bytes.
    ///
    /// Absolute HTTP(S) locators go to the external HTTP loader when
    /// the fallback is enabled. Otherwise the locator is split into
    /// (bucket, key), the bucket is validated against the allow-list
    /// (rejection short-circuits without any remote call), and the
    /// object is fetched with the configured retry budget.
    pub async fn load(&self, ctx: &RequestContext, locator: &str) -> LoaderResult {
        if use_http_loader(&self.config.loader, locator) {
            if let Some(ref http) = self.http_loader {
                return http.load(ctx, locator).await;
            }
            warn!(%locator, "http fallback enabled but no http loader configured");
            return LoaderResult::upstream();
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

        match bucket.get(&key).await {
            Ok(object) => LoaderResult::success(object.data, object.last_modified),
            Err(err) if err.is_not_found() => LoaderResult::not_found(),
            Err(err) => {
                warn!(%key, error = %err, "error retrieving object");
                LoaderResult::upstream()
            }
        }
    }
}

// -- Tests -------------------------------------------------------------------
