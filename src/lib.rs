//! S3-backed storage and loader backends for an image-processing
//! server.
//!
//! Drop-in replacements for filesystem-backed loader, storage and
//! result-storage components: incoming locators resolve to
//! (bucket, key) pairs, keys are normalized and optionally
//! content-digest randomized, and all remote access funnels through a
//! bounded, identity-keyed pool of S3 clients. Auxiliary per-image data
//! (signing keys, detector metadata) lives in sidecar objects colocated
//! with the primary key by suffix convention.
//!
//! The host wires the pieces together roughly like this:
//!
//! ```no_run
//! use std::sync::Arc;
//! use thumbstore::{ClientOptions, ClientPool, S3BucketProvider, S3Loader};
//!
//! # async fn wire() -> anyhow::Result<()> {
//! let config = Arc::new(thumbstore::load_config("thumbstore.yaml")?);
//! let pool = Arc::new(ClientPool::new(ClientOptions::from_config(&config)));
//! let loader = S3Loader::new(config, Arc::new(S3BucketProvider::new(pool)), None);
//! # Ok(())
//! # }
//! ```

pub mod bucket;
pub mod client;
pub mod config;
pub mod context;
pub mod errors;
pub mod keys;
pub mod loader;
pub mod storage;

pub use bucket::{BucketProvider, ObjectBucket, PutOptions, SignedUrlMethod, StoredObject};
pub use client::{BucketIdentity, ClientOptions, ClientPool, S3BucketProvider};
pub use config::{load_config, AdapterConfig, AdapterSettings, LoaderConfig, S3Config};
pub use context::RequestContext;
pub use errors::StorageError;
pub use loader::{
    presigning::PresigningLoader, s3::S3Loader, HttpLoader, LoaderErrorKind, LoaderMetadata,
    LoaderResult,
};
pub use storage::image::ImageStorage;
pub use storage::result::{ResultMetadata, ResultObject, ResultStorage};
