//! Response cache for repeated generation requests.
//!
//! Identical requests (same provider, model, messages and sampling settings)
//! are served from memory instead of calling the provider again. Entries are
//! content-addressed with SHA-256, expire after a TTL and are evicted least
//! recently used first when the cache is full.
//!
//! ```ignore
//! use vizforge::llm::{ResponseCache, ContentHash};
//!
//! let cache = ResponseCache::new(512);
//! let key = ContentHash::for_request("openai", &request);
//! if let Some(response) = cache.get(&key) {
//!     return Ok(response);
//! }
//! ```

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use super::types::{GenerationRequest, GenerationResponse};

/// Hash of cached content, hex-encoded SHA-256.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn from_content(content: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Cache key for a request sent to `provider`.
    ///
    /// Covers the model, every message (including image parts), temperature,
    /// candidate count, token limit and top_p.
    pub fn for_request(provider: &str, request: &GenerationRequest) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(provider.as_bytes());
        hasher.update([0u8]);
        // Serializing the request cannot fail: it only holds strings,
        // numbers and enums with string tags.
        let body = serde_json::to_vec(request).unwrap_or_default();
        hasher.update(&body);
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    response: GenerationResponse,
    created_at: Instant,
    last_accessed: Instant,
}

/// Configuration for the response cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub max_entries: usize,
    /// Entries older than this are treated as absent and evicted.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 512,
            ttl: Duration::from_secs(3600),
        }
    }
}

impl CacheConfig {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            ..Default::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Cache statistics for monitoring and debugging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries_added: u64,
    pub entries_evicted: u64,
}

impl CacheStats {
    /// Hit rate between 0.0 and 1.0, or 0.0 if there were no lookups.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn total_accesses(&self) -> u64 {
        self.hits + self.misses
    }
}

/// Thread-safe LRU + TTL cache of generation responses.
pub struct ResponseCache {
    cache: RwLock<HashMap<ContentHash, CacheEntry>>,
    config: CacheConfig,
    stats: RwLock<CacheStats>,
}

impl ResponseCache {
    pub fn new(max_entries: usize) -> Self {
        Self::with_config(CacheConfig::new(max_entries))
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            config,
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Looks up a response, counting a hit or a miss.
    pub fn get(&self, key: &ContentHash) -> Option<GenerationResponse> {
        let mut cache = self.cache.write().expect("cache write lock poisoned");
        let mut stats = self.stats.write().expect("stats write lock poisoned");

        match cache.get_mut(key) {
            Some(entry) if entry.created_at.elapsed() < self.config.ttl => {
                entry.last_accessed = Instant::now();
                stats.hits += 1;
                Some(entry.response.clone())
            }
            Some(_) => {
                cache.remove(key);
                stats.misses += 1;
                stats.entries_evicted += 1;
                None
            }
            None => {
                stats.misses += 1;
                None
            }
        }
    }

    /// Stores a response, evicting expired entries and then the least
    /// recently used one if the cache is full.
    pub fn put(&self, key: ContentHash, response: GenerationResponse) {
        if self.config.max_entries == 0 {
            return;
        }

        let mut cache = self.cache.write().expect("cache write lock poisoned");
        self.evict_expired(&mut cache);

        if !cache.contains_key(&key) && cache.len() >= self.config.max_entries {
            self.evict_oldest(&mut cache);
        }

        let now = Instant::now();
        cache.insert(
            key,
            CacheEntry {
                response,
                created_at: now,
                last_accessed: now,
            },
        );

        let mut stats = self.stats.write().expect("stats write lock poisoned");
        stats.entries_added += 1;
    }

    fn evict_oldest(&self, cache: &mut HashMap<ContentHash, CacheEntry>) {
        let oldest = cache
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(hash, _)| hash.clone());

        if let Some(hash) = oldest {
            cache.remove(&hash);
            let mut stats = self.stats.write().expect("stats write lock poisoned");
            stats.entries_evicted += 1;
        }
    }

    fn evict_expired(&self, cache: &mut HashMap<ContentHash, CacheEntry>) {
        let ttl = self.config.ttl;
        let before = cache.len();
        cache.retain(|_, entry| entry.created_at.elapsed() < ttl);
        let evicted = (before - cache.len()) as u64;

        if evicted > 0 {
            let mut stats = self.stats.write().expect("stats write lock poisoned");
            stats.entries_evicted += evicted;
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.read().expect("stats read lock poisoned").clone()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Drops one entry, returning whether it was present.
    pub fn remove(&self, key: &ContentHash) -> bool {
        let removed = self
            .cache
            .write()
            .expect("cache write lock poisoned")
            .remove(key)
            .is_some();
        if removed {
            let mut stats = self.stats.write().expect("stats write lock poisoned");
            stats.entries_evicted += 1;
        }
        removed
    }

    /// Removes all entries. Statistics are preserved.
    pub fn clear(&self) {
        self.cache.write().expect("cache write lock poisoned").clear();
    }

    pub fn len(&self) -> usize {
        self.cache.read().expect("cache read lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::with_config(CacheConfig::default())
    }
}

/// Shared response cache.
pub type SharedResponseCache = std::sync::Arc<ResponseCache>;
