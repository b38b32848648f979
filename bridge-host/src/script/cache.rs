//! Compiled-code cache.
//!
//! Parsed function literals keyed by their exact source text, with LRU
//! eviction when the cache is full.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use hashbrown::HashMap;

use super::ast::FunctionNode;

/// Parse cache with LRU eviction.
pub struct ScriptCache {
    /// Parsed functions by source text.
    entries: HashMap<String, Rc<FunctionNode>>,
    /// Access order for LRU (most recent last).
    access_order: Vec<String>,
    /// Maximum number of entries; zero disables caching.
    capacity: usize,
    /// Lookups served from the cache.
    hits: u64,
    /// Lookups that had to parse.
    misses: u64,
}

impl ScriptCache {
    /// Create a new cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            access_order: Vec::new(),
            capacity,
            hits: 0,
            misses: 0,
        }
    }

    /// Look up parsed code, marking it recently used.
    pub fn get(&mut self, source: &str) -> Option<Rc<FunctionNode>> {
        match self.entries.get(source).cloned() {
            Some(node) => {
                self.hits += 1;
                self.touch(source);
                Some(node)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Insert parsed code.
    pub fn insert(&mut self, source: &str, node: Rc<FunctionNode>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.contains_key(source) {
            self.entries.insert(String::from(source), node);
            self.touch(source);
            return;
        }
        while self.entries.len() >= self.capacity && !self.entries.is_empty() {
            self.evict_lru();
        }
        self.access_order.push(String::from(source));
        self.entries.insert(String::from(source), node);
    }

    /// Evict the least recently used entry.
    fn evict_lru(&mut self) {
        if self.access_order.is_empty() {
            return;
        }
        let oldest = self.access_order.remove(0);
        self.entries.remove(&oldest);
        log::trace!("evicted cached script ({} bytes of source)", oldest.len());
    }

    /// Mark a source as recently accessed.
    fn touch(&mut self, source: &str) {
        if let Some(pos) = self.access_order.iter().position(|s| s == source) {
            let key = self.access_order.remove(pos);
            self.access_order.push(key);
        }
    }

    /// Get number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear the cache. Statistics are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.access_order.clear();
    }

    /// Get statistics about the cache.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            capacity: self.capacity,
            hits: self.hits,
            misses: self.misses,
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached entries.
    pub entries: usize,
    /// Maximum number of entries.
    pub capacity: usize,
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that had to parse.
    pub misses: u64,
}
