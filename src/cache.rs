//! Image hash cache for incremental builds.
//!
//! Encoding a photograph and its thumbnails to WebP is the bottleneck of a
//! build. This module lets the image pipeline skip all encoding when a
//! source image is byte-for-byte unchanged since the last successful build.
//!
//! # Design
//!
//! The cache is keyed by the source's **base file name** and stores one
//! value: the decimal FNV-1 32-bit hash of the full source file. A hit means
//! every output of that image is left untouched, modification times included.
//! Renaming a file therefore costs one re-encode; two images sharing a base
//! name in different directories share an entry.
//!
//! ## Storage
//!
//! [`FsHashStore`] keeps one small file per image:
//!
//! ```text
//! <cache root>/generated/img/<basename>.sum
//! ```
//!
//! The cache root defaults to the user cache directory joined with `sleet`
//! (e.g. `~/.cache/sleet` on Linux). The store is injected through the
//! [`HashStore`] trait so tests and `--no-cache` builds use
//! [`MemoryHashStore`] instead.
//!
//! ## Bypassing the cache
//!
//! Pass `--no-cache` to `build` to start from an empty in-memory store. Every
//! image is re-encoded and nothing is persisted.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Subdirectory of the cache root holding image hashes.
const IMAGE_SUMS_DIR: &str = "generated/img";

/// FNV-1 (multiply, then xor) 32-bit hash.
///
/// Fast and order-sensitive; not suitable for anything adversarial.
pub fn fnv1_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &b| {
        hash.wrapping_mul(FNV_PRIME) ^ u32::from(b)
    })
}

/// A get/put key-value capability for persisted source hashes.
///
/// Keys are image base file names; values are decimal hash strings.
pub trait HashStore: Send + Sync {
    fn get(&self, key: &str) -> io::Result<Option<String>>;
    fn put(&self, key: &str, value: &str) -> io::Result<()>;
}

/// One `.sum` file per key under a cache root.
#[derive(Debug, Clone)]
pub struct FsHashStore {
    root: PathBuf,
}

impl FsHashStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at the user cache directory, or `fallback` when the
    /// platform has none.
    pub fn in_user_cache(fallback: &Path) -> Self {
        let root = dirs::cache_dir()
            .map(|dir| dir.join("sleet"))
            .unwrap_or_else(|| fallback.to_path_buf());
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root
            .join(IMAGE_SUMS_DIR)
            .join(format!("{}.sum", crate::metadata::flat_name(key)))
    }
}

impl HashStore for FsHashStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value.trim().to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn put(&self, key: &str, value: &str) -> io::Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, value)
    }
}

/// Process-local store. Starts empty; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryHashStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryHashStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| io::Error::other("hash store lock poisoned"))
    }
}

impl HashStore for MemoryHashStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> io::Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Summary of cache performance for a build.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Images whose outputs were left untouched.
    pub fresh: u32,
    /// Images that were decoded and re-encoded.
    pub encoded: u32,
}

impl CacheStats {
    pub fn record_fresh(&mut self) {
        self.fresh += 1;
    }

    pub fn record_encoded(&mut self) {
        self.encoded += 1;
    }

    pub fn total(&self) -> u32 {
        self.fresh + self.encoded
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fresh > 0 {
            write!(
                f,
                "{} fresh, {} encoded ({} total)",
                self.fresh,
                self.encoded,
                self.total()
            )
        } else {
            write!(f, "{} encoded", self.encoded)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // =========================================================================
    // fnv1_32
    // =========================================================================

    #[test]
    fn fnv1_empty_is_offset_basis() {
        assert_eq!(fnv1_32(b""), 0x811c_9dc5);
    }

    #[test]
    fn fnv1_known_vectors() {
        // Reference values for FNV-1 (not FNV-1a).
        assert_eq!(fnv1_32(b"a"), 0x050c_5d7e);
        assert_eq!(fnv1_32(b"foobar"), 0x31f0_b262);
    }

    #[test]
    fn fnv1_is_order_sensitive() {
        assert_ne!(fnv1_32(b"ab"), fnv1_32(b"ba"));
    }

    #[test]
    fn fnv1_single_byte_change_differs() {
        let mut bytes = vec![7u8; 1024];
        let before = fnv1_32(&bytes);
        bytes[512] = 8;
        assert_ne!(before, fnv1_32(&bytes));
    }

    // =========================================================================
    // FsHashStore
    // =========================================================================

    #[test]
    fn fs_store_missing_key_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = FsHashStore::new(tmp.path());
        assert_eq!(store.get("photo.jpg").unwrap(), None);
    }

    #[test]
    fn fs_store_roundtrip_writes_sum_file() {
        let tmp = TempDir::new().unwrap();
        let store = FsHashStore::new(tmp.path());
        store.put("photo.jpg", "12345").unwrap();

        let file = tmp.path().join("generated/img/photo.jpg.sum");
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "12345");
        assert_eq!(store.get("photo.jpg").unwrap().as_deref(), Some("12345"));
    }

    #[test]
    fn fs_store_overwrites() {
        let tmp = TempDir::new().unwrap();
        let store = FsHashStore::new(tmp.path());
        store.put("photo.jpg", "1").unwrap();
        store.put("photo.jpg", "2").unwrap();
        assert_eq!(store.get("photo.jpg").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn fs_store_key_cannot_escape_root() {
        let tmp = TempDir::new().unwrap();
        let store = FsHashStore::new(tmp.path().join("cache"));
        store.put("../escape.jpg", "1").unwrap();
        assert!(!tmp.path().join("cache/generated/escape.jpg.sum").exists());
        assert_eq!(store.get("../escape.jpg").unwrap().as_deref(), Some("1"));
    }

    // =========================================================================
    // MemoryHashStore
    // =========================================================================

    #[test]
    fn memory_store_starts_empty() {
        let store = MemoryHashStore::new();
        assert_eq!(store.get("a.jpg").unwrap(), None);
        store.put("a.jpg", "9").unwrap();
        assert_eq!(store.get("a.jpg").unwrap().as_deref(), Some("9"));
    }

    // =========================================================================
    // CacheStats
    // =========================================================================

    #[test]
    fn cache_stats_display_with_fresh() {
        let mut stats = CacheStats::default();
        stats.record_fresh();
        stats.record_fresh();
        stats.record_encoded();
        assert_eq!(format!("{}", stats), "2 fresh, 1 encoded (3 total)");
    }

    #[test]
    fn cache_stats_display_no_fresh() {
        let mut stats = CacheStats::default();
        stats.record_encoded();
        stats.record_encoded();
        assert_eq!(format!("{}", stats), "2 encoded");
    }
}
