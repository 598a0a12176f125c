//! Configuration for the S3 storage and loader backends.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`S3Config`] struct. Every field has a default, so a minimal file (or
//! an empty mapping) yields a working configuration. Per-adapter
//! settings are resolved once at adapter construction, not re-derived
//! per call.

use serde::Deserialize;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    /// AWS region for all clients.
    #[serde(default = "default_region")]
    pub region: String,

    /// Custom S3-compatible endpoint (MinIO, LocalStack).
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Client-level retry budget (max attempts). Applied at client
    /// construction; unset uses the SDK default.
    #[serde(default)]
    pub max_retries: Option<u32>,

    /// Force path-style URL addressing.
    #[serde(default)]
    pub force_path_style: bool,

    /// Explicit AWS access key (falls back to the standard credential chain).
    #[serde(default)]
    pub access_key_id: Option<String>,

    /// Explicit AWS secret key (falls back to the standard credential chain).
    #[serde(default)]
    pub secret_access_key: Option<String>,

    /// Prepend a content-digest segment to every normalized key.
    #[serde(default)]
    pub randomize_keys: bool,

    /// Write with the reduced-redundancy storage class.
    #[serde(default)]
    pub reduced_redundancy: bool,

    /// Request AES-256 server-side encryption on write.
    #[serde(default)]
    pub server_side_encryption: bool,

    /// Store request headers as object metadata on result writes.
    #[serde(default)]
    pub store_metadata: bool,

    /// Append a `webp` key segment when the request accepts WebP.
    #[serde(default)]
    pub auto_webp: bool,

    /// Filename appended when a normalized key ends in `/`.
    #[serde(default = "default_root_image_name")]
    pub root_image_name: String,

    /// Server-wide signing key, stored per image when
    /// `stores_crypto_key_for_each_image` is set.
    #[serde(default)]
    pub security_key: Option<String>,

    /// Store the signing key in a sidecar object next to each image.
    #[serde(default)]
    pub stores_crypto_key_for_each_image: bool,

    /// Loader settings.
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Source-image storage settings.
    #[serde(default)]
    pub storage: AdapterConfig,

    /// Result (derived image) storage settings.
    #[serde(default)]
    pub result_storage: AdapterConfig,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint_url: None,
            max_retries: None,
            force_path_style: false,
            access_key_id: None,
            secret_access_key: None,
            randomize_keys: false,
            reduced_redundancy: false,
            server_side_encryption: false,
            store_metadata: false,
            auto_webp: false,
            root_image_name: default_root_image_name(),
            security_key: None,
            stores_crypto_key_for_each_image: false,
            loader: LoaderConfig::default(),
            storage: AdapterConfig::default(),
            result_storage: AdapterConfig::default(),
        }
    }
}

/// Loader configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoaderConfig {
    /// Fixed bucket for the loader. When unset, the first locator
    /// segment names the bucket.
    #[serde(default)]
    pub bucket: Option<String>,

    /// Prefix prepended to derived keys.
    #[serde(default)]
    pub root_path: String,

    /// Buckets the loader may read. Absent allows every bucket.
    #[serde(default)]
    pub allowed_buckets: Option<Vec<String>>,

    /// Delegate absolute HTTP(S) locators to the external HTTP loader.
    #[serde(default)]
    pub enable_http_loader: bool,

    /// Validity window of presigned URLs, in seconds.
    #[serde(default = "default_presign_expiry")]
    pub presign_expiry_seconds: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            root_path: String::new(),
            allowed_buckets: None,
            enable_http_loader: false,
            presign_expiry_seconds: default_presign_expiry(),
        }
    }
}

/// Per-use-case storage settings (source images vs. results).
#[derive(Debug, Clone, Deserialize)]
pub struct AdapterConfig {
    /// Bucket this adapter writes to.
    #[serde(default)]
    pub bucket: String,

    /// Prefix prepended as the first key segment.
    #[serde(default)]
    pub root_path: String,

    /// Read-side TTL in seconds; 0 means never expire.
    #[serde(default = "default_expiration")]
    pub expiration_seconds: u64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            root_path: String::new(),
            expiration_seconds: default_expiration(),
        }
    }
}

/// Per-adapter settings resolved once at adapter construction.
#[derive(Debug, Clone)]
pub struct AdapterSettings {
    pub bucket: String,
    pub root_path: String,
    pub expiration_seconds: u64,
    pub randomize_keys: bool,
    pub reduced_redundancy: bool,
    pub server_side_encryption: bool,
    pub store_metadata: bool,
    pub auto_webp: bool,
    pub root_image_name: String,
}

impl S3Config {
    /// Resolved settings for the source-image storage adapter.
    pub fn storage_settings(&self) -> AdapterSettings {
        self.settings_for(&self.storage)
    }

    /// Resolved settings for the result-storage adapter.
    pub fn result_storage_settings(&self) -> AdapterSettings {
        self.settings_for(&self.result_storage)
    }

    fn settings_for(&self, adapter: &AdapterConfig) -> AdapterSettings {
        AdapterSettings {
            bucket: adapter.bucket.clone(),
            root_path: adapter.root_path.clone(),
            expiration_seconds: adapter.expiration_seconds,
            randomize_keys: self.randomize_keys,
            reduced_redundancy: self.reduced_redundancy,
            server_side_encryption: self.server_side_encryption,
            store_metadata: self.store_metadata,
            auto_webp: self.auto_webp,
            root_image_name: self.root_image_name.clone(),
        }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_region() -> String {
    "eu-west-1".to_string()
}

fn default_root_image_name() -> String {
    "root_image".to_string()
}

fn default_presign_expiry() -> u64 {
    3600
}

fn default_expiration() -> u64 {
    3600
}

// -- Loader ------------------------------------------------------------------

/// Load and parse configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<S3Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let config: S3Config = serde_yaml::from_str(&contents)?;
    Ok(config)
}

// -- Tests -------------------------------------------------------------------
