//! Interning of opaque state byte blocks.
//!
//! Two states with identical bytes must resolve to the same handle so that
//! the node table indexes each logical state exactly once. A handle is a
//! cheap-to-clone `Arc<[u8]>`; the backing bytes are freed once every node,
//! message and worker-local heap entry referencing them has been dropped.

use std::sync::Arc;

use dashmap::DashMap;
use rustc_hash::FxBuildHasher;

/// A cheaply-cloneable handle to an interned state.
pub type StateHandle = Arc<[u8]>;

/// Mixes the bytes of a state into a 64-bit fingerprint. A simple
/// multiplicative rolling hash is all that's required — it only ever
/// affects load balance across workers and node-table shards, never
/// correctness, since every lookup still falls back to a full byte
/// comparison on collision.
pub fn mix_hash(bytes: &[u8]) -> u64 {
    let mut h: u64 = 0;
    for &b in bytes {
        h = h.wrapping_mul(31).wrapping_add(b as u64);
    }
    h
}

/// The worker that owns `bytes`: the only worker permitted to hold a node
/// for this state in its open heap.
pub fn owner_of(bytes: &[u8], worker_count: usize) -> usize {
    (mix_hash(bytes) % worker_count as u64) as usize
}

/// Assigns one stable handle per distinct byte sequence ever seen.
///
/// Thread-safe: concurrent calls to [`StateAllocator::intern`] with
/// identical bytes are guaranteed to return the same handle.
pub struct StateAllocator {
    by_fingerprint: DashMap<u64, Vec<StateHandle>, FxBuildHasher>,
}

impl StateAllocator {
    pub fn new() -> Self {
        Self {
            by_fingerprint: DashMap::with_hasher(FxBuildHasher::default()),
        }
    }

    /// Interns `bytes`, returning the canonical handle for its content.
    pub fn intern(&self, bytes: &[u8]) -> StateHandle {
        let fp = mix_hash(bytes);
        let mut bucket = self.by_fingerprint.entry(fp).or_default();
        if let Some(existing) = bucket.iter().find(|h| h.as_ref() == bytes) {
            return existing.clone();
        }
        let handle: StateHandle = Arc::from(bytes);
        bucket.push(handle.clone());
        handle
    }

    /// Number of distinct states interned so far. Used by tests and by the
    /// CLI's statistics printout.
    pub fn len(&self) -> usize {
        self.by_fingerprint.iter().map(|e| e.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for StateAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_bytes_intern_to_the_same_handle() {
        let allocator = StateAllocator::new();
        let a = allocator.intern(&[1, 2, 3]);
        let b = allocator.intern(&[1, 2, 3]);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(allocator.len(), 1);
    }

    #[test]
    fn distinct_bytes_intern_to_distinct_handles() {
        let allocator = StateAllocator::new();
        let a = allocator.intern(&[1, 2, 3]);
        let b = allocator.intern(&[1, 2, 4]);
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(allocator.len(), 2);
    }

    #[test]
    fn owner_of_is_deterministic_and_in_range() {
        let bytes = [1u8, 2, 3, 4];
        let first = owner_of(&bytes, 7);
        let second = owner_of(&bytes, 7);
        assert_eq!(first, second);
        assert!(first < 7);
    }

    #[test]
    fn concurrent_interning_of_the_same_state_yields_one_handle() {
        use std::sync::Arc as StdArc;
        let allocator = StdArc::new(StateAllocator::new());
        let bytes: &'static [u8] = &[9, 9, 9, 9];

        let handles: Vec<_> = std::thread::scope(|s| {
            (0..8)
                .map(|_| {
                    let allocator = StdArc::clone(&allocator);
                    s.spawn(move || allocator.intern(bytes))
                })
                .collect::<Vec<_>>()
                .into_iter()
                .map(|h| h.join().unwrap())
                .collect()
        });

        for h in &handles[1..] {
            assert!(Arc::ptr_eq(&handles[0], h));
        }
        assert_eq!(allocator.len(), 1);
    }
}
