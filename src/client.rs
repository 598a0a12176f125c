//! Remote client lifecycle: a bounded, identity-keyed cache of S3
//! clients.
//!
//! Every component that talks to the remote store goes through
//! [`ClientPool`]; it is the only place network connections are opened.
//! Clients are created lazily, reused by identity equality, and dropped
//! together on [`ClientPool::close_all`]. Credentials resolve via the
//! standard AWS chain (env vars, `~/.aws/credentials`, IAM role) unless
//! explicit keys are configured.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use crate::bucket::s3::S3Bucket;
use crate::bucket::{BucketProvider, ObjectBucket};
use crate::config::S3Config;
use crate::errors::StorageError;

/// Everything that distinguishes one logical remote handle from
/// another. Two identical identities always resolve to the same cached
/// client, bounding connection growth under load.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketIdentity {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub max_retries: Option<u32>,
}

impl BucketIdentity {
    /// Identity for `bucket` under the crate-wide client configuration.
    pub fn from_config(config: &S3Config, bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            region: config.region.clone(),
            endpoint: config.endpoint_url.clone(),
            max_retries: config.max_retries,
        }
    }
}

/// Options applied at client construction time, shared by every
/// identity in one pool.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Force path-style URL addressing (MinIO, LocalStack).
    pub force_path_style: bool,
    /// Explicit static credentials; unset falls back to the chain.
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl ClientOptions {
    pub fn from_config(config: &S3Config) -> Self {
        Self {
            force_path_style: config.force_path_style,
            access_key_id: config.access_key_id.clone(),
            secret_access_key: config.secret_access_key.clone(),
        }
    }
}

/// Identity-keyed cache of SDK clients.
///
/// Each identity gets its own construction cell, so concurrent first
/// use of one identity builds exactly one client without stalling
/// acquires for unrelated identities. The map lock is only held to
/// look up or insert a cell, never across construction.
pub struct ClientPool {
    clients: Mutex<HashMap<BucketIdentity, Arc<OnceCell<aws_sdk_s3::Client>>>>,
    options: ClientOptions,
}

impl ClientPool {
    pub fn new(options: ClientOptions) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            options,
        }
    }

    /// Return the client for `identity`, constructing it on first use.
    ///
    /// A failed construction leaves the cell empty, so the next
    /// acquire for that identity retries.
    pub async fn acquire(
        &self,
        identity: &BucketIdentity,
    ) -> Result<aws_sdk_s3::Client, StorageError> {
        let cell = {
            let mut clients = self.clients.lock().await;
            clients.entry(identity.clone()).or_default().clone()
        };

        let client = cell
            .get_or_try_init(|| self.build_client(identity))
            .await?;
        Ok(client.clone())
    }

    async fn build_client(
        &self,
        identity: &BucketIdentity,
    ) -> Result<aws_sdk_s3::Client, StorageError> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(identity.region.clone()));

        if let Some(ref endpoint) = identity.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        if let Some(max_retries) = identity.max_retries {
            if max_retries == 0 {
                return Err(StorageError::Configuration(
                    "max_retries must be at least 1".to_string(),
                ));
            }
            loader = loader.retry_config(
                aws_config::retry::RetryConfig::standard().with_max_attempts(max_retries),
            );
        }

        if let (Some(ref ak), Some(ref sk)) =
            (&self.options.access_key_id, &self.options.secret_access_key)
        {
            let creds =
                aws_sdk_s3::config::Credentials::new(ak, sk, None, None, "thumbstore-config");
            loader = loader.credentials_provider(creds);
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(self.options.force_path_style)
            .build();

        info!(
            bucket = %identity.bucket,
            region = %identity.region,
            endpoint = identity.endpoint.as_deref().unwrap_or("default"),
            "constructed S3 client"
        );

        Ok(aws_sdk_s3::Client::from_conf(s3_config))
    }

    /// Drop the cached client for one identity, if present.
    pub async fn release(&self, identity: &BucketIdentity) {
        if self.clients.lock().await.remove(identity).is_some() {
            debug!(bucket = %identity.bucket, "released client");
        }
    }

    /// Drop every cached client and clear the identity cache.
    ///
    /// In-flight operations keep their own clones of the client, so
    /// teardown while requests drain is best-effort rather than abrupt.
    pub async fn close_all(&self) {
        let mut clients = self.clients.lock().await;
        let count = clients.values().filter(|cell| cell.initialized()).count();
        clients.clear();
        debug!(count, "client pool cleared");
    }

    /// Number of live cached clients. Cells whose construction failed
    /// do not count.
    pub async fn len(&self) -> usize {
        self.clients
            .lock()
            .await
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// [`BucketProvider`] backed by a shared [`ClientPool`].
pub struct S3BucketProvider {
    pool: Arc<ClientPool>,
}

impl S3BucketProvider {
    pub fn new(pool: Arc<ClientPool>) -> Self {
        Self { pool }
    }
}

impl BucketProvider for S3BucketProvider {
    fn bucket(
        &self,
        identity: BucketIdentity,
    ) -> Pin<Box<dyn Future<Output = Result<Arc<dyn ObjectBucket>, StorageError>> + Send + '_>>
    {
        Box::pin(async move {
            let client = self.pool.acquire(&identity).await?;
            Ok(Arc::new(S3Bucket::new(identity.bucket, client)) as Arc<dyn ObjectBucket>)
        })
    }
}

// -- Tests -------------------------------------------------------------------
