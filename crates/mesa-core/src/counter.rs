//! Ephemeral per-instance counter.
//!
//! Every entity carries one. It starts at 0 for each instance and moves
//! forward on every request, so reading it is itself a mutation. The value is
//! not a storage identity: it is never persisted and never used to decide
//! whether two entities are the same row.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct EphemeralCounter(AtomicU64);

impl EphemeralCounter {
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Return the current value and advance the counter.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    /// Current value without advancing.
    #[must_use]
    pub fn peek(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Clone for EphemeralCounter {
    fn clone(&self) -> Self {
        Self(AtomicU64::new(self.peek()))
    }
}

impl fmt::Debug for EphemeralCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EphemeralCounter").field(&self.peek()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero_and_advances_on_every_read() {
        let counter = EphemeralCounter::new();
        assert_eq!(counter.next(), 0);
        assert_eq!(counter.next(), 1);
        assert_eq!(counter.next(), 2);
        assert_eq!(counter.peek(), 3);
    }

    #[test]
    fn instances_count_independently() {
        let a = EphemeralCounter::new();
        let b = EphemeralCounter::new();
        a.next();
        a.next();
        assert_eq!(b.next(), 0, "a fresh instance starts from zero");
    }
}
