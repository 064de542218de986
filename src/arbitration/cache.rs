// src/arbitration/cache.rs - Injected key-value cache for oracle verdicts
//
// The cache is a correctness-neutral performance device: the engine runs
// identically (just slower) with the no-op implementation.
use log::info;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::arbitration::ArbitrationVerdict;

const DEFAULT_CACHE_SIZE: usize = 20000;

pub trait OracleCache: Send + Sync {
    fn get(&mut self, key: &str) -> Option<ArbitrationVerdict>;
    fn put(&mut self, key: String, verdict: ArbitrationVerdict);
    /// (hits, misses) observed so far.
    fn stats(&self) -> (usize, usize);
}

/// In-memory LRU cache keyed by the deterministic arbitration hash.
pub struct LruOracleCache {
    cache: LruCache<String, ArbitrationVerdict>,
    hits: usize,
    misses: usize,
}

impl LruOracleCache {
    pub fn new() -> Self {
        let cache_size = std::env::var("ORACLE_CACHE_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_CACHE_SIZE);

        info!("Initializing oracle verdict cache with size: {}", cache_size);

        Self {
            cache: LruCache::new(NonZeroUsize::new(cache_size.max(1)).unwrap()),
            hits: 0,
            misses: 0,
        }
    }
}

impl Default for LruOracleCache {
    fn default() -> Self {
        Self::new()
    }
}

impl OracleCache for LruOracleCache {
    fn get(&mut self, key: &str) -> Option<ArbitrationVerdict> {
        match self.cache.get(key) {
            Some(verdict) => {
                self.hits += 1;
                Some(*verdict)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    fn put(&mut self, key: String, verdict: ArbitrationVerdict) {
        self.cache.put(key, verdict);
    }

    fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }
}

/// Remembers nothing; every lookup misses.
pub struct NoopOracleCache;

impl OracleCache for NoopOracleCache {
    fn get(&mut self, _key: &str) -> Option<ArbitrationVerdict> {
        None
    }

    fn put(&mut self, _key: String, _verdict: ArbitrationVerdict) {}

    fn stats(&self) -> (usize, usize) {
        (0, 0)
    }
}

/// Thread-safe handle shared between the orchestrator and its caller. Two
/// concurrent analyses must either use separate caches or rely on this
/// mutex for serialization.
pub type SharedOracleCache = Arc<Mutex<Box<dyn OracleCache>>>;

pub fn shared_lru_cache() -> SharedOracleCache {
    Arc::new(Mutex::new(Box::new(LruOracleCache::new())))
}

pub fn shared_noop_cache() -> SharedOracleCache {
    Arc::new(Mutex::new(Box::new(NoopOracleCache)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lru_cache_round_trip_and_stats() {
        let mut cache = LruOracleCache::new();
        assert!(cache.get("k").is_none());
        cache.put("k".to_string(), ArbitrationVerdict { selected: Some(2) });
        assert_eq!(cache.get("k"), Some(ArbitrationVerdict { selected: Some(2) }));
        assert_eq!(cache.stats(), (1, 1));
    }

    #[test]
    fn noop_cache_never_remembers() {
        let mut cache = NoopOracleCache;
        cache.put("k".to_string(), ArbitrationVerdict { selected: None });
        assert!(cache.get("k").is_none());
    }
}
