//! Read-only entry points: resolve an incoming locator to image bytes.
//!
//! Two variants share locator parsing and allow-list validation:
//! [`s3::S3Loader`] fetches directly through the bucket façade, while
//! [`presigning::PresigningLoader`] generates a time-limited signed URL
//! and hands the actual transfer to the host's HTTP loader.

pub mod presigning;
pub mod s3;

use bytes::Bytes;
use percent_encoding::percent_decode_str;
use std::future::Future;
use std::pin::Pin;
use std::time::SystemTime;

use crate::config::LoaderConfig;
use crate::context::RequestContext;

/// Failure classification the host maps to a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderErrorKind {
    /// Missing object; serve a not-found response.
    NotFound,
    /// Any other remote failure; serve a server-error response.
    Upstream,
}

/// Metadata carried alongside a successful load.
#[derive(Debug, Clone)]
pub struct LoaderMetadata {
    pub size: u64,
    pub updated_at: Option<SystemTime>,
}

/// Outcome contract returned to the host.
#[derive(Debug, Clone)]
pub struct LoaderResult {
    pub successful: bool,
    pub buffer: Option<Bytes>,
    pub error: Option<LoaderErrorKind>,
    pub metadata: Option<LoaderMetadata>,
}

impl LoaderResult {
    pub fn success(buffer: Bytes, updated_at: Option<SystemTime>) -> Self {
        let metadata = LoaderMetadata {
            size: buffer.len() as u64,
            updated_at,
        };
        Self {
            successful: true,
            buffer: Some(buffer),
            error: None,
            metadata: Some(metadata),
        }
    }

    pub fn not_found() -> Self {
        Self {
            successful: false,
            buffer: None,
            error: Some(LoaderErrorKind::NotFound),
            metadata: None,
        }
    }

    pub fn upstream() -> Self {
        Self {
            successful: false,
            buffer: None,
            error: Some(LoaderErrorKind::Upstream),
            metadata: None,
        }
    }
}

/// The host's generic URL fetcher.
///
/// Performs the actual HTTP transfer for absolute locators and for
/// presigned URLs; expected to return the same result shape as the
/// native loaders.
pub trait HttpLoader: Send + Sync + 'static {
    fn load(
        &self,
        ctx: &RequestContext,
        url: &str,
    ) -> Pin<Box<dyn Future<Output = LoaderResult> + Send + '_>>;
}

/// Whether this locator should go to the external HTTP loader.
pub(crate) fn use_http_loader(config: &LoaderConfig, locator: &str) -> bool {
    config.enable_http_loader && locator.starts_with("http")
}

/// Split a locator into (bucket, key).
///
/// With a fixed loader bucket the whole locator is the key; otherwise
/// the first path segment of the percent-decoded locator names the
/// bucket and the remainder is the key. The configured loader root path
/// is prepended to the key either way.
pub(crate) fn bucket_and_key(config: &LoaderConfig, locator: &str) -> (String, String) {
    let decoded = percent_decode_str(locator).decode_utf8_lossy().into_owned();

    let (bucket, path) = match config.bucket {
        Some(ref bucket) => (bucket.clone(), decoded),
        None => {
            let trimmed = decoded.trim_start_matches('/');
            match trimmed.split_once('/') {
                Some((bucket, rest)) => (bucket.to_string(), rest.to_string()),
                None => (trimmed.to_string(), String::new()),
            }
        }
    };

    let key = if config.root_path.is_empty() {
        path
    } else {
        format!("{}/{}", config.root_path, path)
    };

    (bucket, key)
}

/// Allow-list check; an absent list allows every bucket.
pub(crate) fn validate_bucket(config: &LoaderConfig, bucket: &str) -> bool {
    match config.allowed_buckets {
        Some(ref allowed) => allowed.iter().any(|allowed| allowed == bucket),
        None => true,
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn loader_config() -> LoaderConfig {
        LoaderConfig::default()
    }

    #[test]
    fn http_fallback_requires_flag_and_scheme() {
        let mut config = loader_config();
        assert!(!use_http_loader(&config, "http://example.com/a.jpg"));

        config.enable_http_loader = true;
        assert!(use_http_loader(&config, "http://example.com/a.jpg"));
        assert!(use_http_loader(&config, "https://example.com/a.jpg"));
        assert!(!use_http_loader(&config, "images/a.jpg"));
    }

    #[test]
    fn fixed_bucket_keeps_whole_locator_as_key() {
        let mut config = loader_config();
        config.bucket = Some("images-test".to_string());

        let (bucket, key) = bucket_and_key(&config, "images/1.jpg");
        assert_eq!(bucket, "images-test");
        assert_eq!(key, "images/1.jpg");
    }

    #[test]
    fn fixed_bucket_prepends_root_path() {
        let mut config = loader_config();
        config.bucket = Some("images-test".to_string());
        config.root_path = "root".to_string();

        let (_, key) = bucket_and_key(&config, "images/1.jpg");
        assert_eq!(key, "root/images/1.jpg");
    }

    #[test]
    fn first_segment_names_the_bucket() {
        let config = loader_config();
        let (bucket, key) = bucket_and_key(&config, "/some-bucket/path/to/image.png");
        assert_eq!(bucket, "some-bucket");
        assert_eq!(key, "path/to/image.png");
    }

    #[test]
    fn locator_is_percent_decoded_before_splitting() {
        let config = loader_config();
        let (bucket, key) = bucket_and_key(&config, "my%20bucket/some%20image.jpg");
        assert_eq!(bucket, "my bucket");
        assert_eq!(key, "some image.jpg");
    }

    #[test]
    fn bucket_only_locator_yields_empty_key() {
        let config = loader_config();
        let (bucket, key) = bucket_and_key(&config, "/just-a-bucket");
        assert_eq!(bucket, "just-a-bucket");
        assert_eq!(key, "");
    }

    #[test]
    fn absent_allow_list_allows_everything() {
        let config = loader_config();
        assert!(validate_bucket(&config, "anything"));
    }

    #[test]
    fn allow_list_is_exact_match() {
        let mut config = loader_config();
        config.allowed_buckets = Some(vec!["a".to_string(), "b".to_string()]);
        assert!(validate_bucket(&config, "a"));
        assert!(validate_bucket(&config, "b"));
        assert!(!validate_bucket(&config, "c"));
        assert!(!validate_bucket(&config, "a-suffix"));
    }
}
