//! Process-wide monotonic counters.
//!
//! These live for the whole process and are never reset. They are shared by
//! every execution context, so they only ever move through `fetch_add`.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
pub struct Counter {
    next: AtomicU64,
}

/// Symbol identifiers handed out by [`crate::SymbolTable`].
pub static SYMBOL_IDS: Counter = Counter::starting_at(1);
/// File descriptor indices. 0, 1 and 2 belong to the standard streams.
pub static FILE_DESCRIPTORS: Counter = Counter::starting_at(3);
/// Line numbers assigned to evaluated chunks of code.
pub static LINE_NUMBERS: Counter = Counter::starting_at(1);
/// Method frame identities, unique across threads so a non-local exit can
/// never hit a frame it was not aimed at.
pub static FRAME_IDS: Counter = Counter::starting_at(1);

impl Counter {
    pub const fn starting_at(value: u64) -> Self {
        Self {
            next: AtomicU64::new(value),
        }
    }

    /// Returns the current value and advances the counter.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Reserves `count` consecutive values and returns the first one.
    pub fn reserve(&self, count: u64) -> u64 {
        self.next.fetch_add(count, Ordering::Relaxed)
    }

    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}
