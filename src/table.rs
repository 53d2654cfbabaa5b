//! A transposition table private to one work order.
//!
//! Entries record the value a frame settled on, the stack depth the frame
//! lived at, its polarity, and how the value relates to the window it was
//! searched under. Tables are never shared between work orders: a bound
//! recorded under one job's window is meaningless under another's.

use crate::interface::Score;
use std::collections::HashMap;

/// How a stored value relates to the window it was computed under.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EntryFlag {
    /// The value settled strictly inside the window.
    Exact,
    /// The frame failed low; the true value is at most the stored one.
    Upperbound,
    /// The frame was cut off; the true value is at least the stored one.
    Lowerbound,
}

#[derive(Copy, Clone, Debug)]
pub struct Entry {
    pub value: Score,
    /// Stack depth of the frame that produced the value. A deeper record
    /// carries less remaining look-ahead, so reuse requires the probing
    /// frame to sit at this depth or below.
    pub depth: usize,
    pub is_max: bool,
    pub flag: EntryFlag,
}

/// Last-write-wins map from position hash to entry.
///
/// Job-private tables stay small and die with their work order, so a plain
/// map beats the fixed-size replacement schemes used by long-lived shared
/// tables.
#[derive(Default)]
pub struct TranspositionTable {
    entries: HashMap<u64, Entry>,
}

impl TranspositionTable {
    pub fn new() -> Self {
        TranspositionTable { entries: HashMap::new() }
    }

    pub fn lookup(&self, key: u64) -> Option<&Entry> {
        self.entries.get(&key)
    }

    pub fn store(&mut self, key: u64, value: Score, depth: usize, is_max: bool, flag: EntryFlag) {
        self.entries.insert(key, Entry { value, depth, is_max, flag });
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
