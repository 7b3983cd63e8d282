//! Per-process compilation statistics.
//!
//! Modeled on Cranelift's own per-pass counters: a fixed-size table of atomically-updated
//! counters keyed by an enum, rather than a mutex-guarded map.

use core::sync::atomic::{AtomicU64, Ordering};

/// A compilation statistic this crate's passes can record.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Stat {
    /// A loop was rewritten from top-tested to bottom-tested form.
    FormBottomLoop,
}

impl Stat {
    const COUNT: usize = 1;

    fn index(self) -> usize {
        match self {
            Stat::FormBottomLoop => 0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stat::FormBottomLoop => "FormBottomLoop",
        }
    }
}

/// An atomic per-[`Stat`] counter store. Cheap to share across concurrently-compiling methods:
/// each counter is updated with a single atomic increment, no locking.
#[derive(Debug)]
pub struct StatCounter {
    counts: [AtomicU64; Stat::COUNT],
}

impl StatCounter {
    pub fn new() -> Self {
        Self {
            counts: [const { AtomicU64::new(0) }; Stat::COUNT],
        }
    }

    pub fn record(&self, stat: Stat) {
        self.counts[stat.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, stat: Stat) -> u64 {
        self.counts[stat.index()].load(Ordering::Relaxed)
    }
}

impl Default for StatCounter {
    fn default() -> Self {
        Self::new()
    }
}
