//! Response Cache for the Answer Pipeline
//!
//! Generating an answer is by far the most expensive step of a request, so
//! complete answers are memoised per `(jurisdiction, query)` pair in a bounded
//! least-recently-used cache.
//!
//! # Cache Key Strategy
//!
//! Keys are `"{jurisdiction}:{query}"`, with `*` standing in for "no
//! jurisdiction filter" (see [`answer_key`]). The query text is used verbatim,
//! so two phrasings of the same question are cached separately.
//!
//! # Example
//!
//! ```ignore
//! use cairn::rag::cache::{answer_key, ResponseCache};
//!
//! let cache = ResponseCache::new(&config.cache)?;
//! let key = answer_key(Some("UK"), "How long is a visitor visa valid?");
//! if let Some(answer) = cache.get(&key) {
//!     return Ok(answer);
//! }
//! let answer = generate().await?;
//! cache.put(key, answer.clone());
//! ```

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::{AnswerResponse, AppError, Result};
use crate::utils::toml_config::CacheConfig;

// ============================================================================
// Cache Types
// ============================================================================

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses (expired entries included)
    pub misses: u64,
    /// Number of entries pushed out because the cache was full
    pub evictions: u64,
    /// Number of entries currently cached
    pub entries: usize,
    /// Maximum number of entries
    pub capacity: usize,
}

impl CacheStats {
    /// Calculate hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Cache key for an answer to `query`, optionally scoped to a jurisdiction.
pub fn answer_key(jurisdiction: Option<&str>, query: &str) -> String {
    format!("{}:{}", jurisdiction.unwrap_or("*"), query)
}

#[derive(Debug, Clone)]
struct CacheEntry {
    answer: AnswerResponse,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() > exp)
    }
}

// ============================================================================
// LRU Response Cache
// ============================================================================

/// Bounded LRU cache of generated answers.
///
/// Thread-safe via `parking_lot::Mutex`; every lookup mutates recency, so a
/// read lock would not help.
pub struct ResponseCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    enabled: bool,
    ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    /// Bumped by every `clear`
    generation: AtomicU64,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Result<Self> {
        let capacity = NonZeroUsize::new(config.capacity).ok_or_else(|| {
            AppError::Configuration("cache capacity must be greater than 0".to_string())
        })?;

        Ok(Self {
            entries: Mutex::new(LruCache::new(capacity)),
            enabled: config.enabled,
            ttl: config.ttl_secs.map(Duration::from_secs),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        })
    }

    /// Create a cache holding at most `capacity` answers, without expiry
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::new(&CacheConfig {
            capacity,
            ..Default::default()
        })
    }

    /// Look up an answer, promoting it to most recently used.
    pub fn get(&self, key: &str) -> Option<AnswerResponse> {
        if !self.enabled {
            return None;
        }

        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.answer.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert or replace an answer; evicts the least recently used entry when full.
    pub fn put(&self, key: String, answer: AnswerResponse) {
        if !self.enabled {
            return;
        }
        let mut entries = self.entries.lock();
        self.insert(&mut entries, key, answer);
    }

    /// Current generation. Read it before computing an answer and hand it to
    /// [`put_if_current`](Self::put_if_current).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Like [`put`](Self::put), but skipped when the cache was cleared since
    /// `generation` was read. Returns whether the answer was stored.
    pub fn put_if_current(&self, key: String, answer: AnswerResponse, generation: u64) -> bool {
        if !self.enabled {
            return false;
        }
        let mut entries = self.entries.lock();
        if self.generation.load(Ordering::Acquire) != generation {
            return false;
        }
        self.insert(&mut entries, key, answer);
        true
    }

    fn insert(&self, entries: &mut LruCache<String, CacheEntry>, key: String, answer: AnswerResponse) {
        // A TTL too large to represent never expires
        let entry = CacheEntry {
            answer,
            expires_at: self.ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
        };

        // `push` hands back the replaced entry under the same key, or the evicted one
        if let Some((old_key, _)) = entries.push(key.clone(), entry) {
            if old_key != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains(key)
    }

    /// Drop every cached answer and start a new generation. Counters are kept.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        self.generation.fetch_add(1, Ordering::AcqRel);
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: entries.len(),
            capacity: entries.cap().get(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
