//! Expiring memo of encoded transform output.
//!
//! Decoding, resampling and encoding dominate the cost of a request. This
//! module lets the service skip all three when an identical request was
//! answered recently.
//!
//! # Design
//!
//! [`TransformCache`] is an explicitly constructed value: whoever composes
//! the pipeline owns it and shares it (by reference or `Arc`) with the
//! threads serving requests. There is no process-wide instance.
//!
//! ## Cache keys
//!
//! A [`CacheKey`] is a structured, hashable value built from the source
//! identity, the requested box, the mode and the output format. Two keys are
//! equal exactly when those fields are equal, so there is no string-joining
//! ambiguity.
//!
//! - **source identity**: the loader path for file sources, or
//!   `sha256:<hex>` of the bytes for in-memory sources ([`hash_bytes`]).
//! - **style** (optional): anchor, background, ratios and Raw bounds. Left
//!   out by default, which means two requests differing only in anchor or
//!   background share one entry. Enable `cache.distinguish_style` to keep
//!   them apart.
//!
//! ## Expiry
//!
//! Every entry lives for the cache's TTL. Expiry is lazy: an entry older
//! than `inserted_at + ttl` is dropped when a lookup finds it. Nothing
//! sweeps in the background. Time comes from an injected [`Clock`] so tests
//! can step it with [`ManualClock`].
//!
//! ## Concurrency
//!
//! The map sits behind a `Mutex` that is held only for the lookup and for
//! the insert. The compute step runs unlocked, so unrelated requests never
//! serialize behind one another. Two threads missing on the same key may
//! both compute; the later insert wins. Failed computations are never
//! stored.

use crate::error::Result;
use crate::imaging::{Mode, OutputFormat, RawBounds, TransformRequest};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Identity of one cached derivative.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub source: String,
    pub width: u32,
    pub height: u32,
    pub mode: Mode,
    pub format: OutputFormat,
    pub style: Option<String>,
}

impl CacheKey {
    /// Key for `request` against `source`. With `distinguish_style` the
    /// per-mode styling parameters become part of the key as well.
    pub fn new(
        source: impl Into<String>,
        request: &TransformRequest,
        format: OutputFormat,
        distinguish_style: bool,
    ) -> Self {
        let (width, height) = request.dimensions();
        Self {
            source: source.into(),
            width,
            height,
            mode: request.mode(),
            format,
            style: distinguish_style.then(|| style_of(request)),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "thumbcache-{}-{}-{}-{}-{}",
            self.source, self.width, self.height, self.mode, self.format
        )?;
        if let Some(style) = &self.style {
            write!(f, "-{style}")?;
        }
        Ok(())
    }
}

fn style_of(request: &TransformRequest) -> String {
    match request {
        TransformRequest::Raw(RawBounds::Unbounded) => "unbounded".into(),
        TransformRequest::Raw(RawBounds::MaxDimension(_)) => "max".into(),
        TransformRequest::Raw(RawBounds::MaxBox { .. }) => "box".into(),
        TransformRequest::Scale(p) => match p.background {
            Some(bg) => format!("bg{}", bg.to_hex()),
            None => "bg".into(),
        },
        TransformRequest::Crop(p) => p.anchor.to_string(),
        TransformRequest::SpecifiedCrop(p) => {
            let r = p.region;
            format!("{}:{}:{}:{}", r.left, r.top, r.width, r.height)
        }
    }
}

/// SHA-256 of `bytes`, as `sha256:<hex>`. Identity of in-memory sources.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("sha256:{:x}", Sha256::digest(bytes))
}

// ============================================================================
// Time source
// ============================================================================

/// Monotonic time source used to stamp and expire entries.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// Store
// ============================================================================

/// Outcome of a store lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Hit(Arc<[u8]>),
    /// An entry existed but had outlived its TTL; it has been dropped.
    Expired,
    Miss,
}

/// Key-value substrate behind [`TransformCache`].
///
/// `set` overwrites. Expiry is best-effort; durability is not required.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &CacheKey) -> Lookup;
    fn set(&self, key: CacheKey, bytes: Arc<[u8]>, ttl: Duration);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    bytes: Arc<[u8]>,
    inserted_at: Instant,
    ttl: Duration,
}

/// In-process store: a mutex-guarded map with lazy expiry.
pub struct MemoryStore<C: Clock = SystemClock> {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    clock: C,
}

impl MemoryStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }
}

impl<C: Clock> CacheStore for MemoryStore<C> {
    fn get(&self, key: &CacheKey) -> Lookup {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            None => Lookup::Miss,
            Some(entry) if now > entry.inserted_at + entry.ttl => {
                entries.remove(key);
                Lookup::Expired
            }
            Some(entry) => Lookup::Hit(Arc::clone(&entry.bytes)),
        }
    }

    fn set(&self, key: CacheKey, bytes: Arc<[u8]>, ttl: Duration) {
        let entry = CacheEntry {
            bytes,
            inserted_at: self.clock.now(),
            ttl,
        };
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, entry);
    }

    fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

// ============================================================================
// TransformCache
// ============================================================================

/// Memoizes encoded bytes per [`CacheKey`] for a fixed TTL.
pub struct TransformCache {
    store: Box<dyn CacheStore>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
}

impl TransformCache {
    /// In-memory cache on the system clock.
    pub fn new(ttl: Duration) -> Self {
        Self::with_store(MemoryStore::new(), ttl)
    }

    /// In-memory cache on an injected clock.
    pub fn with_clock(ttl: Duration, clock: impl Clock + 'static) -> Self {
        Self::with_store(MemoryStore::with_clock(clock), ttl)
    }

    pub fn with_store(store: impl CacheStore + 'static, ttl: Duration) -> Self {
        Self {
            store: Box::new(store),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expired: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached bytes for `key`, or run `compute` and store what it
    /// produces. Errors from `compute` propagate and leave the cache as it
    /// was.
    pub fn get_or_compute<F>(&self, key: &CacheKey, compute: F) -> Result<Arc<[u8]>>
    where
        F: FnOnce() -> Result<Vec<u8>>,
    {
        match self.store.get(key) {
            Lookup::Hit(bytes) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(%key, "cache hit");
                return Ok(bytes);
            }
            Lookup::Expired => {
                self.expired.fetch_add(1, Ordering::Relaxed);
                debug!(%key, "cache entry expired");
            }
            Lookup::Miss => debug!(%key, "cache miss"),
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let bytes: Arc<[u8]> = compute()?.into();
        self.store.set(key.clone(), Arc::clone(&bytes), self.ttl);
        Ok(bytes)
    }

    /// Number of live-or-stale entries currently held by the store.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of cache counters. `expired` is a subset of `misses`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
}

impl CacheStats {
    pub fn total(&self) -> u64 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            if self.expired > 0 {
                write!(
                    f,
                    "{} cached, {} rendered, {} expired ({} total)",
                    self.hits,
                    self.misses,
                    self.expired,
                    self.total()
                )
            } else {
                write!(
                    f,
                    "{} cached, {} rendered ({} total)",
                    self.hits,
                    self.misses,
                    self.total()
                )
            }
        } else {
            write!(f, "{} rendered", self.misses)
        }
    }
}
