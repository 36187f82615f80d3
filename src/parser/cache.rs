// src/parser/cache.rs
// Bounded LRU cache for parse results, keyed by (phase, text digest).

use crate::parser::types::{CompactParseResult, ParsePhase};
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use tokio::sync::Mutex;

pub struct ParseCache {
    cache: Mutex<LruCache<String, CompactParseResult>>,
}

impl ParseCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity >= 1");
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Cache key over the already-truncated text. Typing and finalize
    /// results are cached separately; fidelity differs between phases.
    pub fn key(phase: ParsePhase, truncated_text: &str) -> String {
        let digest = Sha256::digest(truncated_text.as_bytes());
        format!("{}:{:x}", phase.as_str(), digest)
    }

    pub async fn get(&self, key: &str) -> Option<CompactParseResult> {
        let mut cache = self.cache.lock().await;
        cache.get(key).cloned()
    }

    pub async fn put(&self, key: String, value: CompactParseResult) {
        let mut cache = self.cache.lock().await;
        cache.put(key, value);
    }
}
