//! Compiled-code caching
//!
//! Two levels:
//!
//! ## Code cache
//! One per database: predicate tag -> compiled chunk. Entries are evicted
//! whenever the predicate changes, and compiled again lazily on next
//! resolution.
//!
//! ## Call-site cache
//! One per tag in each chunk: remembers what a `call` instruction resolved
//! to, together with the database generation at resolution time. Any
//! database change bumps the generation, so a stale entry is never used.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::backend::bytecode::chunk::BytecodeChunk;
use crate::backend::predicate::Callee;
use crate::backend::symbol::Tag;

/// Statistics for code cache monitoring
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CodeCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

fn initial_capacity() -> usize {
    std::env::var("HORN_CODE_CACHE_CAPACITY")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(256)
}

/// Shared map from predicate tag to compiled code
#[derive(Debug)]
pub struct CodeCache {
    entries: DashMap<Tag, Arc<BytecodeChunk>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for CodeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::with_capacity(initial_capacity()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up compiled code, counting the hit or miss
    pub fn get(&self, tag: Tag) -> Option<Arc<BytecodeChunk>> {
        match self.entries.get(&tag) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(Arc::clone(entry.value()))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, tag: Tag, chunk: Arc<BytecodeChunk>) {
        self.entries.insert(tag, chunk);
    }

    /// Drop the compiled code of one predicate
    pub fn evict(&self, tag: Tag) -> bool {
        self.entries.remove(&tag).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CodeCacheStats {
        CodeCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

/// Resolution remembered by one call site
#[derive(Debug, Default)]
pub struct CallSiteCache {
    slot: RwLock<Option<(u64, Callee)>>,
}

impl CallSiteCache {
    /// The cached callee, if it was resolved at `generation`
    #[inline]
    pub fn get(&self, generation: u64) -> Option<Callee> {
        match &*self.slot.read() {
            Some((cached, callee)) if *cached == generation => Some(callee.clone()),
            _ => None,
        }
    }

    pub fn store(&self, generation: u64, callee: Callee) {
        *self.slot.write() = Some((generation, callee));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::bytecode::chunk::ChunkBuilder;
    use crate::backend::bytecode::Opcode;
    use crate::backend::symbol::Interner;

    fn chunk(name: &str) -> Arc<BytecodeChunk> {
        let mut builder = ChunkBuilder::new(name);
        builder.emit(Opcode::Fail);
        Arc::new(builder.build())
    }

    #[test]
    fn test_code_cache_hit_miss_evict() {
        let interner = Interner::new();
        let tag = interner.tag_named("p", 0);
        let cache = CodeCache::new();

        assert!(cache.get(tag).is_none());
        cache.insert(tag, chunk("p/0"));
        assert!(cache.get(tag).is_some());
        assert_eq!(
            cache.stats(),
            CodeCacheStats {
                hits: 1,
                misses: 1,
                entries: 1
            }
        );

        assert!(cache.evict(tag));
        assert!(!cache.evict(tag));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_call_site_checks_generation() {
        let site = CallSiteCache::default();
        assert!(site.get(0).is_none());
        site.store(3, Callee::Compiled(chunk("q/0")));
        assert!(site.get(3).is_some());
        assert!(site.get(4).is_none());
    }
}
