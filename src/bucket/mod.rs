//! The per-bucket façade over the remote object store.
//!
//! [`ObjectBucket`] abstracts one bucket behind exists/get/put/delete
//! plus presigning. The trait works in terms of fully materialized byte
//! payloads so callers never hold an open stream past the request
//! lifecycle. Implementations: the aws-sdk-s3 client ([`s3::S3Bucket`])
//! and an in-memory store ([`memory::MemoryBucket`]).

pub mod memory;
pub mod s3;

use bytes::Bytes;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::SystemTime;

use crate::client::BucketIdentity;
use crate::errors::StorageError;

/// One fully materialized remote object.
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// Cleaned key the object was fetched from.
    pub key: String,
    /// Raw bytes of the object.
    pub data: Bytes,
    /// Content type reported by the store.
    pub content_type: Option<String>,
    /// User metadata stored with the object.
    pub metadata: HashMap<String, String>,
    /// Absent when the store did not report a timestamp; read paths
    /// treat that as expired.
    pub last_modified: Option<SystemTime>,
    /// Payload size in bytes.
    pub content_length: u64,
}

/// Write-side options forwarded to the store.
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// User metadata to attach.
    pub metadata: Option<HashMap<String, String>>,
    /// Use the reduced-redundancy storage tier.
    pub reduced_redundancy: bool,
    /// Request server-side encryption.
    pub encrypt: bool,
}

/// HTTP method a presigned URL grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedUrlMethod {
    Get,
    Put,
}

/// Async per-bucket storage contract.
///
/// Every key argument is cleaned ([`crate::keys::clean_key`]) before any
/// remote call.
pub trait ObjectBucket: Send + Sync + 'static {
    /// Metadata-only existence probe. Never errors: any remote failure,
    /// including not-found, reads as `false`.
    fn exists(&self, key: &str) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;

    /// Fetch body and headers, fully materialized before return.
    fn get(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<StoredObject, StorageError>> + Send + '_>>;

    /// Produce a time-limited pre-authenticated URL without performing
    /// the transfer; the caller fetches it separately.
    fn get_signed_url(
        &self,
        key: &str,
        method: SignedUrlMethod,
        expiry_seconds: u64,
    ) -> Pin<Box<dyn Future<Output = Result<String, StorageError>> + Send + '_>>;

    /// Write `data` at `key` with the given options. The content type is
    /// derived from the byte content.
    fn put(
        &self,
        key: &str,
        data: Bytes,
        options: PutOptions,
    ) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send + '_>>;

    /// Delete the object at `key`. Deleting a missing key is not an error.
    fn delete(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send + '_>>;
}

/// Factory seam for the loaders: resolve a bucket identity to a live
/// bucket handle.
pub trait BucketProvider: Send + Sync + 'static {
    fn bucket(
        &self,
        identity: BucketIdentity,
    ) -> Pin<Box<dyn Future<Output = Result<Arc<dyn ObjectBucket>, StorageError>> + Send + '_>>;
}

/// Sniff a content type from magic bytes.
///
/// Recognizes the image formats the host pipeline produces; anything
/// else is an opaque octet stream.
pub fn detect_content_type(data: &[u8]) -> &'static str {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        "image/png"
    } else if data.starts_with(b"GIF8") {
        "image/gif"
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "application/octet-stream"
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_jpeg() {
        assert_eq!(detect_content_type(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
    }

    #[test]
    fn detects_png() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00];
        assert_eq!(detect_content_type(&png), "image/png");
    }

    #[test]
    fn detects_gif() {
        assert_eq!(detect_content_type(b"GIF89a..."), "image/gif");
    }

    #[test]
    fn detects_webp() {
        let mut webp = Vec::from(&b"RIFF"[..]);
        webp.extend_from_slice(&[0x10, 0x00, 0x00, 0x00]);
        webp.extend_from_slice(b"WEBPVP8 ");
        assert_eq!(detect_content_type(&webp), "image/webp");
    }

    #[test]
    fn unknown_bytes_fall_back_to_octet_stream() {
        assert_eq!(detect_content_type(b"hello"), "application/octet-stream");
        assert_eq!(detect_content_type(b""), "application/octet-stream");
    }
}
