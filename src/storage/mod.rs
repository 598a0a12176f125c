//! Host-facing storage adapters.
//!
//! [`image::ImageStorage`] persists source images plus their crypto and
//! detector sidecars; [`result::ResultStorage`] caches derived images
//! keyed by the request's canonical URL. Both share one normalization,
//! expiration and write-policy core, configured
//! independently so the two use cases can point at different buckets
//! and prefixes.

mod base;
pub mod image;
pub mod result;
