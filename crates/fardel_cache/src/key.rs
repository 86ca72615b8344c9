//! Cache key derivation.

use fardel_common::ContentHash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A content-derived cache key.
///
/// Keys are composed from the hashes of file content, transform
/// configuration, and target environment. A change to any of the three
/// changes the key, which is what makes the cache safe to share without
/// locking: the same key always names byte-identical work.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct CacheKey(ContentHash);

impl CacheKey {
    /// Derives a key from content, configuration, and environment hashes.
    pub fn new(content: ContentHash, config: ContentHash, env: ContentHash) -> Self {
        Self(ContentHash::combine(&[content, config, env]))
    }

    /// Wraps an already-composed hash as a key.
    ///
    /// Used for package jobs, where the key covers the set of asset ids in
    /// the bundle rather than a single file's content.
    pub fn from_hash(hash: ContentHash) -> Self {
        Self(hash)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hashes() -> (ContentHash, ContentHash, ContentHash) {
        (
            ContentHash::from_bytes(b"content"),
            ContentHash::from_bytes(b"config"),
            ContentHash::from_bytes(b"env"),
        )
    }

    #[test]
    fn deterministic() {
        let (c, f, e) = hashes();
        assert_eq!(CacheKey::new(c, f, e), CacheKey::new(c, f, e));
    }

    #[test]
    fn any_input_changes_key() {
        let (c, f, e) = hashes();
        let base = CacheKey::new(c, f, e);
        let c2 = ContentHash::from_bytes(b"content'");
        let f2 = ContentHash::from_bytes(b"config'");
        let e2 = ContentHash::from_bytes(b"env'");
        assert_ne!(base, CacheKey::new(c2, f, e));
        assert_ne!(base, CacheKey::new(c, f2, e));
        assert_ne!(base, CacheKey::new(c, f, e2));
    }

    #[test]
    fn display_is_hex() {
        let (c, f, e) = hashes();
        let s = CacheKey::new(c, f, e).to_string();
        assert_eq!(s.len(), 32);
        assert!(s.chars().all(|ch| ch.is_ascii_hexdigit()));
    }
}
