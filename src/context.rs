//! Per-request state supplied by the host.

use std::collections::HashMap;

/// The slice of the host's request state this backend reads.
///
/// Constructed by the host for every incoming request and passed to the
/// loader and storage adapters by reference.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Canonical request URL; the result-storage key when no explicit
    /// path is given.
    pub url: String,

    /// Whether the requesting client accepts WebP responses.
    pub accepts_webp: bool,

    /// Incoming request headers, stored as object metadata on result
    /// writes when enabled by configuration.
    pub headers: HashMap<String, String>,
}

impl RequestContext {
    /// Context for `url` with no headers and no WebP acceptance.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}
