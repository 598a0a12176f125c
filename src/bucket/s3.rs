//! aws-sdk-s3 implementation of [`ObjectBucket`].
//!
//! Error mapping: a 404-equivalent service error becomes
//! [`StorageError::NotFound`]; everything else (network, throttling,
//! permissions) becomes [`StorageError::Upstream`]. Retries happen at
//! the client level only, configured when the client is constructed.

use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::{ServerSideEncryption, StorageClass};
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

use super::{detect_content_type, ObjectBucket, PutOptions, SignedUrlMethod, StoredObject};
use crate::errors::StorageError;
use crate::keys;

/// One remote S3 bucket, addressed through a shared SDK client.
pub struct S3Bucket {
    bucket: String,
    client: aws_sdk_s3::Client,
}

impl S3Bucket {
    pub fn new(bucket: impl Into<String>, client: aws_sdk_s3::Client) -> Self {
        Self {
            bucket: bucket.into(),
            client,
        }
    }

    fn to_system_time(dt: &aws_sdk_s3::primitives::DateTime) -> Option<SystemTime> {
        let secs = dt.secs();
        if secs < 0 {
            return None;
        }
        Some(UNIX_EPOCH + Duration::new(secs as u64, dt.subsec_nanos()))
    }
}

impl ObjectBucket for S3Bucket {
    fn exists(&self, key: &str) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let key = match keys::clean_key(&key) {
                Ok(key) => key,
                Err(_) => return false,
            };

            debug!(bucket = %self.bucket, %key, "head_object");

            self.client
                .head_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
                .is_ok()
        })
    }

    fn get(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<StoredObject, StorageError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let key = keys::clean_key(&key)?;

            debug!(bucket = %self.bucket, %key, "get_object");

            let resp = match self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(err) => {
                    let service_err = err.into_service_error();
                    return Err(if service_err.is_no_such_key() {
                        StorageError::NotFound { key }
                    } else {
                        StorageError::upstream("get_object", service_err)
                    });
                }
            };

            let content_type = resp.content_type().map(str::to_owned);
            let metadata = resp.metadata().cloned().unwrap_or_default();
            let last_modified = resp.last_modified().and_then(Self::to_system_time);

            // Materialize the full body; callers must never hold an open
            // stream past the request lifecycle.
            let data = resp
                .body
                .collect()
                .await
                .map_err(|err| StorageError::upstream("get_object body", err))?
                .into_bytes();

            let content_length = data.len() as u64;

            Ok(StoredObject {
                key,
                data,
                content_type,
                metadata,
                last_modified,
                content_length,
            })
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

            let presigning = PresigningConfig::expires_in(Duration::from_secs(expiry_seconds))
                .map_err(|err| {
                    StorageError::Configuration(format!("invalid presign expiry: {err}"))
                })?;

            debug!(bucket = %self.bucket, %key, ?method, expiry_seconds, "presign");

            let url = match method {
                SignedUrlMethod::Get => self
                    .client
                    .get_object()
                    .bucket(&self.bucket)
                    .key(&key)
                    .presigned(presigning)
                    .await
                    .map_err(|err| {
                        StorageError::upstream("presign get_object", err.into_service_error())
                    })?
                    .uri()
                    .to_string(),
                SignedUrlMethod::Put => self
                    .client
                    .put_object()
                    .bucket(&self.bucket)
                    .key(&key)
                    .presigned(presigning)
                    .await
                    .map_err(|err| {
                        StorageError::upstream("presign put_object", err.into_service_error())
                    })?
                    .uri()
                    .to_string(),
            };

            Ok(url)
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

            let content_type = detect_content_type(&data);
            let storage_class = if options.reduced_redundancy {
                StorageClass::ReducedRedundancy
            } else {
                StorageClass::Standard
            };

            debug!(
                bucket = %self.bucket,
                %key,
                size = data.len(),
                content_type,
                "put_object"
            );

            let mut req = self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .body(aws_sdk_s3::primitives::ByteStream::from(data))
                .content_type(content_type)
                .storage_class(storage_class);

            if options.encrypt {
                req = req.server_side_encryption(ServerSideEncryption::Aes256);
            }
            if let Some(metadata) = options.metadata {
                req = req.set_metadata(Some(metadata));
            }

            req.send()
                .await
                .map_err(|err| StorageError::upstream("put_object", err.into_service_error()))?;

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

            debug!(bucket = %self.bucket, %key, "delete_object");

            // S3 delete_object is idempotent; a missing key is not an error.
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
                .map_err(|err| StorageError::upstream("delete_object", err.into_service_error()))?;

            Ok(())
        })
    }
}

// -- Tests -------------------------------------------------------------------
