//! Bounded ring of pre-mutation table states.

use std::collections::VecDeque;
use std::time::Instant;

/// A copy of the table taken before a transition, tagged with the state
/// version it was taken at.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    pub version: u64,
    pub taken_at: Instant,
    pub state: T,
}

/// Keeps the most recent `capacity` snapshots; pushing into a full ring evicts the oldest.
///
/// Retention is for inspection only. A failed transition restores its own
/// in-flight copy, never an entry from the ring.
#[derive(Debug, Clone)]
pub struct SnapshotRing<T> {
    capacity: usize,
    entries: VecDeque<Snapshot<T>>,
}

impl<T> SnapshotRing<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, version: u64, state: T) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(Snapshot {
            version,
            taken_at: Instant::now(),
            state,
        });
    }

    pub fn latest(&self) -> Option<&Snapshot<T>> {
        self.entries.back()
    }

    /// Versions held, oldest first.
    pub fn versions(&self) -> Vec<u64> {
        self.entries.iter().map(|s| s.version).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_when_full() {
        let mut ring = SnapshotRing::new(3);
        for v in 0..5u64 {
            ring.push(v, format!("state {v}"));
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.versions(), vec![2, 3, 4]);
        assert_eq!(ring.latest().map(|s| s.state.as_str()), Some("state 4"));
    }

    #[test]
    fn starts_empty() {
        let ring: SnapshotRing<char> = SnapshotRing::new(2);
        assert!(ring.is_empty());
        assert!(ring.latest().is_none());
    }

    #[test]
    fn zero_capacity_still_holds_one() {
        let mut ring = SnapshotRing::new(0);
        ring.push(1, ());
        ring.push(2, ());
        assert_eq!(ring.capacity(), 1);
        assert_eq!(ring.versions(), vec![2]);
    }
}
