//! Two-tier image cache keyed by [`CacheKey`].
//!
//! Lookups try a byte-budgeted in-memory tier first and fall back to JPEG
//! files on disk, promoting disk hits into memory. The cache never touches
//! the network.

use std::{
    fmt, io,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use camino::{Utf8Path, Utf8PathBuf};
use image::DynamicImage;
use moka::{policy::EvictionPolicy, sync::Cache};
use photorama_core::CacheKey;
use thiserror::Error;

mod disk;

use disk::DiskTier;

/// Decoded image shared between the cache and its callers.
pub type CachedImage = Arc<DynamicImage>;

/// JPEG quality used for files in the disk tier.
pub const JPEG_QUALITY: u8 = 50;

/// Default size of the memory tier in bytes of decoded pixels.
pub const DEFAULT_MEMORY_BUDGET_BYTES: u64 = 64 * 1024 * 1024;

/// Configuration for [`ImageCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCacheConfig {
    /// Directory holding the disk tier. Created when missing.
    pub directory: Utf8PathBuf,
    /// Upper bound on decoded pixel bytes held in memory.
    pub memory_budget_bytes: u64,
}

impl ImageCacheConfig {
    /// Use `directory` with the default memory budget.
    #[must_use]
    pub fn new(directory: impl Into<Utf8PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            memory_budget_bytes: DEFAULT_MEMORY_BUDGET_BYTES,
        }
    }

    /// Set the memory budget.
    #[must_use]
    pub const fn with_memory_budget(mut self, bytes: u64) -> Self {
        self.memory_budget_bytes = bytes;
        self
    }
}

/// Raised when the disk tier cannot be prepared.
#[derive(Debug, Error)]
#[error("failed to open image cache directory {path}: {source}")]
pub struct ImageCacheError {
    /// Directory that could not be opened.
    pub path: Utf8PathBuf,
    /// Underlying I/O error.
    #[source]
    pub source: io::Error,
}

/// Counters describing how lookups were served.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered by the memory tier.
    pub memory_hits: u64,
    /// Lookups answered by the disk tier.
    pub disk_hits: u64,
    /// Lookups answered by neither tier.
    pub misses: u64,
    /// Attempts to read a file from the disk tier.
    pub disk_reads: u64,
    /// Files written to the disk tier.
    pub disk_writes: u64,
}

#[derive(Debug, Default)]
struct LookupCounters {
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
    misses: AtomicU64,
}

/// Memory and disk image cache.
///
/// Every method is safe to call from several threads at once. Disk failures
/// are logged and otherwise ignored, so a broken disk tier degrades to a
/// memory-only cache.
pub struct ImageCache {
    memory: Cache<CacheKey, CachedImage>,
    disk: DiskTier,
    counters: LookupCounters,
}

impl fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageCache")
            .field("directory", &self.disk.root())
            .field("memory_entries", &self.memory.entry_count())
            .finish_non_exhaustive()
    }
}

impl ImageCache {
    /// Open the cache described by `config`, creating its directory.
    ///
    /// # Errors
    ///
    /// Returns [`ImageCacheError`] when the directory cannot be created or
    /// opened.
    pub fn open(config: &ImageCacheConfig) -> Result<Self, ImageCacheError> {
        let disk = DiskTier::open(&config.directory).map_err(|source| ImageCacheError {
            path: config.directory.clone(),
            source,
        })?;
        // LRU admits every insert, so a fresh `put` is never turned away.
        let memory = Cache::builder()
            .max_capacity(config.memory_budget_bytes)
            .eviction_policy(EvictionPolicy::lru())
            .weigher(|_key: &CacheKey, image: &CachedImage| -> u32 {
                u32::try_from(image.as_bytes().len()).unwrap_or(u32::MAX)
            })
            .build();
        Ok(Self {
            memory,
            disk,
            counters: LookupCounters::default(),
        })
    }

    /// Image stored under `key`, from memory or else from disk.
    ///
    /// A disk hit is promoted into memory.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<CachedImage> {
        if let Some(image) = self.memory.get(key) {
            self.counters.memory_hits.fetch_add(1, Ordering::Relaxed);
            return Some(image);
        }
        let Some(decoded) = self.disk.load(key) else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };
        self.counters.disk_hits.fetch_add(1, Ordering::Relaxed);
        let image = Arc::new(decoded);
        self.memory.insert(*key, Arc::clone(&image));
        Some(image)
    }

    /// Store `image` under `key` in both tiers, replacing earlier entries.
    ///
    /// The memory tier is updated first. The disk copy is re-encoded as JPEG
    /// at [`JPEG_QUALITY`] and replaced atomically.
    pub fn put(&self, image: CachedImage, key: &CacheKey) {
        self.memory.insert(*key, Arc::clone(&image));
        self.disk.store(key, &image);
    }

    /// Evict `key` from both tiers.
    pub fn remove(&self, key: &CacheKey) {
        self.memory.invalidate(key);
        self.disk.remove(key);
    }

    /// Drop every entry from the memory tier, keeping the disk tier.
    pub fn clear_memory(&self) {
        self.memory.invalidate_all();
    }

    /// File the disk tier uses for `key`.
    #[must_use]
    pub fn path_for(&self, key: &CacheKey) -> Utf8PathBuf {
        self.disk.root().join(DiskTier::file_name(key))
    }

    /// Directory of the disk tier.
    #[must_use]
    pub fn directory(&self) -> &Utf8Path {
        self.disk.root()
    }

    /// Snapshot of the lookup and disk counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            memory_hits: self.counters.memory_hits.load(Ordering::Relaxed),
            disk_hits: self.counters.disk_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            disk_reads: self.disk.reads(),
            disk_writes: self.disk.writes(),
        }
    }
}
