use std::collections::BTreeMap;

use crate::messages::StatusVector;
use crate::node::Origin;

/// VectorClock tracks, per origin, the next sequence number we expect.
///
/// An origin we have never heard of expects sequence 1. Entries only move
/// forward, and exactly one step per accepted rumor. Origins first seen in a
/// peer's status vector are inserted at 1 as placeholders; a placeholder says
/// nothing about which messages we hold.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VectorClock {
    clocks: BTreeMap<Origin, u32>, // origin -> next expected sequence
}

impl VectorClock {
    /// Create a new empty vector clock
    pub fn new() -> Self {
        Self {
            clocks: BTreeMap::new(),
        }
    }

    /// Next expected sequence number for `origin` (1 when unknown)
    pub fn expected(&self, origin: &str) -> u32 {
        self.clocks.get(origin).copied().unwrap_or(1)
    }

    /// Record that `sequence` from `origin` was accepted
    pub fn advance(&mut self, origin: &Origin, sequence: u32) {
        let entry = self.clocks.entry(origin.clone()).or_insert(1);
        *entry = (*entry).max(sequence + 1);
    }

    /// Insert a placeholder entry for an unknown origin.
    /// Returns true if the origin was new.
    pub fn learn(&mut self, origin: &Origin) -> bool {
        if self.clocks.contains_key(origin.as_str()) {
            return false;
        }
        self.clocks.insert(origin.clone(), 1);
        true
    }

    /// Snapshot for a status exchange
    pub fn status(&self) -> StatusVector {
        self.clocks.clone()
    }

    /// Origins where we hold messages the remote lacks, in origin order, with
    /// the remote's expected sequence. Only entries above the placeholder
    /// value count as being ahead.
    pub fn ahead_of<'a>(
        &'a self,
        remote: &'a StatusVector,
    ) -> impl Iterator<Item = (&'a Origin, u32)> + 'a {
        self.clocks.iter().filter_map(move |(origin, &local)| {
            let wanted = remote.get(origin).copied().unwrap_or(1);
            (local > wanted && local > 1).then_some((origin, wanted))
        })
    }

    /// First origin where the remote is ahead of us, with its expected sequence
    pub fn first_behind<'a>(&self, remote: &'a StatusVector) -> Option<(&'a Origin, u32)> {
        remote
            .iter()
            .find(|(origin, &theirs)| theirs > self.expected(origin.as_str()))
            .map(|(origin, &theirs)| (origin, theirs))
    }

    /// Check if the vector clock is empty
    pub fn is_empty(&self) -> bool {
        self.clocks.is_empty()
    }

    /// Number of origins with an entry
    pub fn len(&self) -> usize {
        self.clocks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(entries: &[(&str, u32)]) -> StatusVector {
        entries
            .iter()
            .map(|(origin, seq)| (Origin::from(*origin), *seq))
            .collect()
    }

    #[test]
    fn test_new_vector_clock_is_empty() {
        let clock = VectorClock::new();
        assert!(clock.is_empty());
        assert_eq!(clock.expected("a"), 1);
    }

    #[test]
    fn test_advance_moves_forward_only() {
        let mut clock = VectorClock::new();
        let a = Origin::from("a");

        clock.advance(&a, 1);
        assert_eq!(clock.expected("a"), 2);
        clock.advance(&a, 2);
        assert_eq!(clock.expected("a"), 3);

        // a stale advance never moves the entry back
        clock.advance(&a, 1);
        assert_eq!(clock.expected("a"), 3);
    }

    #[test]
    fn test_learn_inserts_placeholder_once() {
        let mut clock = VectorClock::new();
        let b = Origin::from("b");
        assert!(clock.learn(&b));
        assert!(!clock.learn(&b));
        assert_eq!(clock.expected("b"), 1);
        assert_eq!(clock.len(), 1);

        clock.advance(&b, 1);
        assert!(!clock.learn(&b));
        assert_eq!(clock.expected("b"), 2);
    }

    #[test]
    fn test_ahead_of_ignores_placeholders() {
        let mut clock = VectorClock::new();
        clock.learn(&Origin::from("a"));
        clock.advance(&Origin::from("b"), 1);
        clock.advance(&Origin::from("b"), 2);

        // remote knows nothing: only b counts, a is a placeholder
        let remote = status(&[]);
        let ahead: Vec<_> = clock.ahead_of(&remote).collect();
        assert_eq!(ahead, vec![(&Origin::from("b"), 1)]);

        let remote = status(&[("b", 2)]);
        let ahead: Vec<_> = clock.ahead_of(&remote).collect();
        assert_eq!(ahead, vec![(&Origin::from("b"), 2)]);

        let remote = status(&[("b", 3)]);
        assert_eq!(clock.ahead_of(&remote).count(), 0);
    }

    #[test]
    fn test_first_behind() {
        let mut clock = VectorClock::new();
        clock.advance(&Origin::from("a"), 1);

        assert_eq!(clock.first_behind(&status(&[("a", 2)])), None);
        assert_eq!(
            clock.first_behind(&status(&[("a", 2), ("c", 4)])),
            Some((&Origin::from("c"), 4))
        );
        assert_eq!(
            clock.first_behind(&status(&[("a", 5)])),
            Some((&Origin::from("a"), 5))
        );
        // a remote placeholder is not ahead of anything
        assert_eq!(clock.first_behind(&status(&[("z", 1)])), None);
    }

    #[test]
    fn test_status_snapshot() {
        let mut clock = VectorClock::new();
        clock.advance(&Origin::from("a"), 1);
        clock.learn(&Origin::from("b"));

        let snapshot = clock.status();
        assert_eq!(snapshot, status(&[("a", 2), ("b", 1)]));
    }
}
