//! Content-addressed blob storage.
//!
//! Cached blobs (transform outputs, packaged bundle bytes) are stored as
//! binary files in kind-specific subdirectories of the cache. Each blob has
//! a header containing magic bytes, a format version, and a checksum for
//! integrity validation. Entries are write-once: a key is only ever created
//! or read, never overwritten.

use std::path::{Path, PathBuf};

use fardel_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::key::CacheKey;

/// Magic bytes identifying a fardel cache blob.
const BLOB_MAGIC: [u8; 4] = *b"FDLC";

/// Current blob format version. Increment on breaking changes to the
/// header or payload format.
const BLOB_FORMAT_VERSION: u32 = 1;

/// File extension for cache blobs.
const BLOB_EXT: &str = "bin";

/// Header prepended to every cached blob for validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobHeader {
    /// Magic bytes: must be `b"FDLC"`.
    pub magic: [u8; 4],

    /// Blob format version.
    pub format_version: u32,

    /// Content hash of the payload data (for integrity checks).
    pub checksum: ContentHash,
}

/// A content-addressed, write-once blob store.
///
/// Keys are derived from the inputs that produced a blob (file content,
/// transform config, environment), so two concurrent writers racing on the
/// same key are writing byte-identical data and no locking is needed.
/// Reads never block writers; a partially visible or corrupt entry reads
/// as a miss.
pub struct ContentCache {
    /// Root cache directory.
    cache_dir: PathBuf,
}

impl ContentCache {
    /// Opens a cache rooted at the given directory, creating it if needed.
    pub fn open(cache_dir: &Path) -> Result<Self, CacheError> {
        std::fs::create_dir_all(cache_dir).map_err(|e| CacheError::Io {
            path: cache_dir.to_path_buf(),
            source: e,
        })?;
        Ok(Self {
            cache_dir: cache_dir.to_path_buf(),
        })
    }

    /// Returns the file path for a blob with the given kind and key.
    fn blob_path(&self, kind: &str, key: &CacheKey) -> PathBuf {
        self.cache_dir.join(kind).join(format!("{key}.{BLOB_EXT}"))
    }

    /// Returns `true` if a blob exists for the given kind and key.
    pub fn has(&self, kind: &str, key: &CacheKey) -> bool {
        self.blob_path(kind, key).exists()
    }

    /// Stores a blob under the given kind and key.
    ///
    /// Idempotent: if the key already exists the write is skipped, since a
    /// content-derived key always names identical bytes. The blob is first
    /// written to a temporary sibling and then renamed into place so
    /// concurrent readers never observe a partial entry.
    pub fn set(&self, kind: &str, key: &CacheKey, data: &[u8]) -> Result<(), CacheError> {
        let path = self.blob_path(kind, key);
        if path.exists() {
            return Ok(());
        }

        let dir = self.cache_dir.join(kind);
        std::fs::create_dir_all(&dir).map_err(|e| CacheError::Io {
            path: dir.clone(),
            source: e,
        })?;

        let header = BlobHeader {
            magic: BLOB_MAGIC,
            format_version: BLOB_FORMAT_VERSION,
            checksum: ContentHash::from_bytes(data),
        };

        let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;

        // Layout: 4-byte header length (little-endian) + header + payload
        let header_len = header_bytes.len() as u32;
        let mut output = Vec::with_capacity(4 + header_bytes.len() + data.len());
        output.extend_from_slice(&header_len.to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(data);

        let tmp = dir.join(format!("{key}.{BLOB_EXT}.tmp"));
        std::fs::write(&tmp, &output).map_err(|e| CacheError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp, &path).map_err(|e| CacheError::Io { path, source: e })?;

        Ok(())
    }

    /// Reads a blob, validating its header.
    ///
    /// Returns `None` if the entry doesn't exist, the header is invalid,
    /// the format version doesn't match, or the checksum doesn't verify.
    /// This is fail-safe: corruption results in a cache miss.
    pub fn get(&self, kind: &str, key: &CacheKey) -> Option<Vec<u8>> {
        let path = self.blob_path(kind, key);
        let raw = std::fs::read(&path).ok()?;

        // Need at least 4 bytes for the header length
        if raw.len() < 4 {
            return None;
        }

        let header_len = u32::from_le_bytes(raw[..4].try_into().ok()?) as usize;
        if raw.len() < 4 + header_len {
            return None;
        }

        let header: BlobHeader =
            bincode::serde::decode_from_slice(&raw[4..4 + header_len], bincode::config::standard())
                .ok()?
                .0;

        if header.magic != BLOB_MAGIC {
            return None;
        }

        if header.format_version != BLOB_FORMAT_VERSION {
            return None;
        }

        let payload = &raw[4 + header_len..];

        if ContentHash::from_bytes(payload) != header.checksum {
            return None;
        }

        Some(payload.to_vec())
    }

    /// Returns the cache's root directory.
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }
}
