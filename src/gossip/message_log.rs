use std::collections::BTreeMap;

use crate::messages::Rumor;
use crate::node::Origin;

/// Append-only store of accepted rumors, per origin, indexed by sequence number.
///
/// Sequence numbers start at 1; position 0 is the sentinel and never holds a
/// message. Each origin's history is a contiguous prefix `1..=n`.
#[derive(Clone, Debug, Default)]
pub struct MessageLog {
    messages: BTreeMap<Origin, Vec<Rumor>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next rumor of its origin.
    ///
    /// Callers check the sequence against the vector clock first; a rumor
    /// that would leave a gap or duplicate an entry is refused.
    pub fn append(&mut self, rumor: Rumor) -> bool {
        let history = self.messages.entry(rumor.origin.clone()).or_default();
        if rumor.sequence as usize != history.len() + 1 {
            return false;
        }
        history.push(rumor);
        true
    }

    /// Rumor `sequence` from `origin`; sequence 0 is the sentinel
    pub fn get(&self, origin: &str, sequence: u32) -> Option<&Rumor> {
        let index = (sequence as usize).checked_sub(1)?;
        self.messages.get(origin)?.get(index)
    }

    /// Every accepted rumor from `origin`, in sequence order
    pub fn history(&self, origin: &str) -> &[Rumor] {
        self.messages
            .get(origin)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn count(&self, origin: &str) -> usize {
        self.history(origin).len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Origin, &[Rumor])> {
        self.messages
            .iter()
            .map(|(origin, history)| (origin, history.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
