//! Monotonic sprite-id allocation.
//!
//! Every sprite gets a unique, monotonically increasing [`SpriteId`]. The
//! allocator is owned by the sprite collection and scoped to the engine's
//! lifetime rather than being process-wide static state, so two engines in
//! one process never share a sequence.

use std::sync::atomic::{AtomicU64, Ordering};

/// A unique sprite identifier. Never reused within one engine lifetime.
pub type SpriteId = u64;

/// Hands out monotonically increasing [`SpriteId`]s.
///
/// The first allocated id is `1`; `0` is reserved as "no owner".
#[derive(Debug)]
pub struct SpriteIdAllocator {
    next: AtomicU64,
}

/// The owner id meaning "owned by nobody".
pub const NO_OWNER: SpriteId = 0;

impl SpriteIdAllocator {
    /// Create a fresh allocator starting at id `1`.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next id.
    #[inline]
    pub fn next(&self) -> SpriteId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// How many ids have been handed out so far.
    pub fn allocated(&self) -> u64 {
        self.next.load(Ordering::Relaxed) - 1
    }
}

impl Default for SpriteIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn ids_are_monotonic_from_one() {
        let alloc = SpriteIdAllocator::new();
        assert_eq!(alloc.next(), 1);
        assert_eq!(alloc.next(), 2);
        assert_eq!(alloc.next(), 3);
        assert_eq!(alloc.allocated(), 3);
    }

    #[test]
    fn two_allocators_are_independent() {
        let a = SpriteIdAllocator::new();
        let b = SpriteIdAllocator::new();
        a.next();
        a.next();
        assert_eq!(b.next(), 1, "allocators must not share state");
    }

    #[test]
    fn concurrent_allocation_is_unique() {
        let alloc = Arc::new(SpriteIdAllocator::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let alloc = Arc::clone(&alloc);
            handles.push(std::thread::spawn(move || {
                (0..250).map(|_| alloc.next()).collect::<Vec<_>>()
            }));
        }
        let mut all: Vec<SpriteId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 1000, "every allocated id must be unique");
    }
}
