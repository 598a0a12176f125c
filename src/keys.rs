//! Key shaping: cleaning, path normalization, content-digest
//! randomization and sidecar-path derivation.
//!
//! Pure functions, no I/O. Normalization must be deterministic: random
//! keys are looked up again on reads from the same inputs, there is no
//! index mapping logical paths to physical keys.

use sha1::{Digest, Sha1};

use crate::errors::StorageError;

/// Suffix of the sidecar object holding the per-image signing key.
pub const CRYPTO_SUFFIX: &str = ".txt";

/// Suffix of the sidecar object holding detector metadata.
pub const DETECTOR_SUFFIX: &str = ".detectors.txt";

/// Collapse repeated `/` runs and strip a single leading `/`.
///
/// Applied to every key before any remote call. A key that cleans down
/// to nothing is rejected.
pub fn clean_key(raw: &str) -> Result<String, StorageError> {
    let mut key = String::with_capacity(raw.len());
    let mut prev_slash = false;
    for ch in raw.chars() {
        if ch == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        key.push(ch);
    }

    let key = match key.strip_prefix('/') {
        Some(stripped) => stripped.to_string(),
        None => key,
    };

    if key.is_empty() {
        return Err(StorageError::InvalidKey(raw.to_string()));
    }
    Ok(key)
}

/// Derive the physical key for a logical path.
///
/// Segment assembly: strip the leading `/`, prepend `root_path` when
/// non-empty, append a literal `webp` segment when `auto_webp` is set,
/// and when `randomize` is set prepend the SHA-1 hex digest of the
/// dot-joined segments collected so far. A result ending in `/` gets
/// `root_image_name` appended so directories still address an object.
pub fn normalize_path(
    path: &str,
    root_path: &str,
    auto_webp: bool,
    randomize: bool,
    root_image_name: &str,
) -> String {
    let path = path.trim_start_matches('/');

    let mut segments: Vec<String> = vec![path.to_string()];
    if !root_path.is_empty() {
        segments.insert(0, root_path.to_string());
    }
    if auto_webp {
        segments.push("webp".to_string());
    }
    if randomize {
        segments.insert(0, digest_segment(&segments));
    }

    let mut normalized = segments.join("/");
    while normalized.starts_with('/') {
        normalized.remove(0);
    }
    if normalized.ends_with('/') {
        normalized.push_str(root_image_name);
    }

    normalized
}

/// Replace the extension of the key's final segment with `suffix`.
///
/// A segment without an extension keeps its full stem, so
/// `a/b` with `.txt` becomes `a/b.txt`.
pub fn sidecar_path(key: &str, suffix: &str) -> String {
    let (dir, file) = match key.rfind('/') {
        Some(idx) => (&key[..=idx], &key[idx + 1..]),
        None => ("", key),
    };

    // Leading-dot filenames have no extension.
    let stem = match file.rfind('.') {
        Some(idx) if idx > 0 => &file[..idx],
        _ => file,
    };

    format!("{dir}{stem}{suffix}")
}

/// SHA-1 hex digest over the dot-joined segment list.
fn digest_segment(segments: &[String]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(segments.join(".").as_bytes());
    hex::encode(hasher.finalize())
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_key_collapses_slash_runs() {
        assert_eq!(clean_key("a//b///c").unwrap(), "a/b/c");
    }

    #[test]
    fn clean_key_strips_leading_slash() {
        assert_eq!(clean_key("/a/b").unwrap(), "a/b");
        assert_eq!(clean_key("///a/b").unwrap(), "a/b");
    }

    #[test]
    fn clean_key_invariants_hold_for_assorted_paths() {
        for raw in [
            "/images/1.jpg",
            "images//1.jpg",
            "//a//b//c//",
            "a",
            "/deep/nested//path/file.png",
        ] {
            let key = clean_key(raw).unwrap();
            assert!(!key.contains("//"), "double slash left in {key:?}");
            assert!(!key.starts_with('/'), "leading slash left in {key:?}");
        }
    }

    #[test]
    fn clean_key_rejects_empty_results() {
        assert!(matches!(clean_key(""), Err(StorageError::InvalidKey(_))));
        assert!(matches!(clean_key("/"), Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn normalize_plain_path() {
        assert_eq!(
            normalize_path("/images/1.jpg", "", false, false, "root_image"),
            "images/1.jpg"
        );
    }

    #[test]
    fn normalize_prepends_root_path() {
        assert_eq!(
            normalize_path("images/1.jpg", "root", false, false, "root_image"),
            "root/images/1.jpg"
        );
    }

    #[test]
    fn normalize_appends_webp_segment() {
        assert_eq!(
            normalize_path("images/1.jpg", "root", true, false, "root_image"),
            "root/images/1.jpg/webp"
        );
    }

    #[test]
    fn normalize_trailing_slash_gets_root_image_name() {
        assert_eq!(
            normalize_path("images/", "", false, false, "root_image"),
            "images/root_image"
        );
    }

    #[test]
    fn normalize_randomized_prepends_sha1_digest() {
        let key = normalize_path("images/1.jpg", "root", false, true, "root_image");

        let mut hasher = Sha1::new();
        hasher.update("root.images/1.jpg".as_bytes());
        let expected = hex::encode(hasher.finalize());

        assert_eq!(key, format!("{expected}/root/images/1.jpg"));
    }

    #[test]
    fn normalize_is_deterministic() {
        let first = normalize_path("some/path.png", "prefix", true, true, "root_image");
        let second = normalize_path("some/path.png", "prefix", true, true, "root_image");
        assert_eq!(first, second);
    }

    #[test]
    fn sidecar_replaces_extension() {
        assert_eq!(sidecar_path("root/images/1.jpg", ".txt"), "root/images/1.txt");
        assert_eq!(
            sidecar_path("root/images/1.jpg", DETECTOR_SUFFIX),
            "root/images/1.detectors.txt"
        );
    }

    #[test]
    fn sidecar_keeps_full_stem_without_extension() {
        assert_eq!(sidecar_path("a/b", ".txt"), "a/b.txt");
        assert_eq!(sidecar_path("a/.hidden", ".txt"), "a/.hidden.txt");
    }

    #[test]
    fn sidecar_only_touches_last_segment() {
        assert_eq!(sidecar_path("a.b/c.d.jpg", ".txt"), "a.b/c.d.txt");
    }
}
