use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::OnceLock;

use parking_lot::Mutex;

use crate::mask::BitMask;

/// Maximum number of idle masks retained per word-count key. Encode/decode is
/// on the hot path and masks are transient, so the pool exists to avoid
/// allocation churn, not to cache an unbounded number of them — beyond this
/// many idle instances, a released mask is simply dropped.
const MAX_IDLE_PER_SLOT: usize = 64;

/// A pool of [`BitMask`] instances keyed by word count.
///
/// Each word-count key gets its own bounded free list guarded by its own
/// lock, so masks of different sizes never contend with each other.
/// `acquire`/`release` are safe to call concurrently from any number of
/// tasks or threads.
pub struct BitMaskPool {
    slots: Mutex<HashMap<usize, Vec<BitMask>>>,
}

impl BitMaskPool {
    /// Create a new, empty pool.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Process-wide default pool, for callers that don't want to thread a
    /// pool reference through every encode/decode call.
    pub fn global() -> &'static BitMaskPool {
        static GLOBAL: OnceLock<BitMaskPool> = OnceLock::new();
        GLOBAL.get_or_init(BitMaskPool::new)
    }

    /// Borrow a zeroed mask with `words` words. The returned guard returns
    /// the mask to this pool (zeroed) when dropped, regardless of how the
    /// scope that borrowed it exits — including on error or panic unwind.
    pub fn acquire(&self, words: usize) -> PooledMask<'_> {
        let mask = {
            let mut slots = self.slots.lock();
            slots.get_mut(&words).and_then(|free| free.pop())
        };
        let mask = match mask {
            Some(m) => m,
            None => {
                tracing::trace!(words, "bitmask pool miss, allocating");
                BitMask::new(words)
            }
        };
        PooledMask {
            pool: self,
            mask: Some(mask),
        }
    }

    fn release(&self, mut mask: BitMask) {
        mask.reset();
        let words = mask.word_count();
        let mut slots = self.slots.lock();
        let free = slots.entry(words).or_default();
        if free.len() < MAX_IDLE_PER_SLOT {
            free.push(mask);
        }
        // else: at capacity for this key, drop the mask.
    }

    /// Number of idle masks currently held for a given word count. Exposed
    /// for tests; not part of the pool's operational contract.
    #[cfg(test)]
    fn idle_count(&self, words: usize) -> usize {
        self.slots
            .lock()
            .get(&words)
            .map(|free| free.len())
            .unwrap_or(0)
    }
}

impl Default for BitMaskPool {
    fn default() -> Self {
        Self::new()
    }
}

/// An RAII handle to a [`BitMask`] borrowed from a [`BitMaskPool`].
///
/// Dereferences to `BitMask`; returns the mask to its pool on drop.
pub struct PooledMask<'p> {
    pool: &'p BitMaskPool,
    mask: Option<BitMask>,
}

impl Deref for PooledMask<'_> {
    type Target = BitMask;

    fn deref(&self) -> &BitMask {
        self.mask.as_ref().expect("mask taken before drop")
    }
}

impl DerefMut for PooledMask<'_> {
    fn deref_mut(&mut self) -> &mut BitMask {
        self.mask.as_mut().expect("mask taken before drop")
    }
}

impl Drop for PooledMask<'_> {
    fn drop(&mut self) {
        if let Some(mask) = self.mask.take() {
            self.pool.release(mask);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn acquire_returns_zeroed_mask() {
        let pool = BitMaskPool::new();
        let mask = pool.acquire(2);
        assert!(mask.is_empty());
        assert_eq!(mask.word_count(), 2);
    }

    #[test]
    fn released_mask_is_reused() {
        let pool = BitMaskPool::new();
        {
            let mut mask = pool.acquire(1);
            mask.set(3, true);
        }
        assert_eq!(pool.idle_count(1), 1);
        let reused = pool.acquire(1);
        assert!(reused.is_empty(), "released mask must be zeroed on reuse");
    }

    #[test]
    fn different_word_counts_use_different_slots() {
        let pool = BitMaskPool::new();
        {
            let _a = pool.acquire(1);
            let _b = pool.acquire(4);
        }
        assert_eq!(pool.idle_count(1), 1);
        assert_eq!(pool.idle_count(4), 1);
    }

    #[test]
    fn idle_slot_is_capped() {
        let pool = BitMaskPool::new();
        for _ in 0..(MAX_IDLE_PER_SLOT + 10) {
            let _mask = pool.acquire(1);
        }
        assert!(pool.idle_count(1) <= MAX_IDLE_PER_SLOT);
    }

    #[test]
    fn mask_is_released_even_if_scope_panics() {
        let pool = Arc::new(BitMaskPool::new());
        let pool2 = pool.clone();
        let result = std::panic::catch_unwind(move || {
            let _mask = pool2.acquire(1);
            panic!("simulated failure mid-encode");
        });
        assert!(result.is_err());
        assert_eq!(pool.idle_count(1), 1);
    }

    #[test]
    fn concurrent_acquire_release_never_double_hands_out() {
        let pool = Arc::new(BitMaskPool::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let pool = pool.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..200 {
                    for words in 1..=8usize {
                        let mut mask = pool.acquire(words);
                        assert!(mask.is_empty(), "acquired mask must start zeroed");
                        mask.set(0, true);
                    }
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn global_pool_is_a_singleton() {
        let a = BitMaskPool::global() as *const _;
        let b = BitMaskPool::global() as *const _;
        assert_eq!(a, b);
    }
}
