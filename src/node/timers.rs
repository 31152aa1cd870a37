//! Single-shot timer table.
//!
//! Each timer kind has at most one pending deadline. Arming replaces the
//! deadline and stopping removes it, so a superseded fire can never happen.
use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Hot rumor retransmission
    Rumor,
    /// Status vector push
    AntiEntropy,
    /// Route rumor self announcement
    RouteAnnounce,
    /// Proposer round timeout
    PaxosRound,
}

#[derive(Debug, Default)]
pub struct Timers {
    deadlines: HashMap<TimerKind, Instant>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, timer: TimerKind, after: Duration, now: Instant) {
        self.deadlines.insert(timer, now + after);
    }

    pub fn stop(&mut self, timer: TimerKind) {
        self.deadlines.remove(&timer);
    }

    pub fn is_armed(&self, timer: TimerKind) -> bool {
        self.deadlines.contains_key(&timer)
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<(TimerKind, Instant)> {
        self.deadlines
            .iter()
            .min_by_key(|(_, deadline)| **deadline)
            .map(|(timer, deadline)| (*timer, *deadline))
    }

    /// Remove and return every timer due at `now`, earliest first
    pub fn expire(&mut self, now: Instant) -> Vec<TimerKind> {
        let mut due: Vec<(TimerKind, Instant)> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(timer, deadline)| (*timer, *deadline))
            .collect();
        due.sort_by_key(|(_, deadline)| *deadline);
        for (timer, _) in &due {
            self.deadlines.remove(timer);
        }
        due.into_iter().map(|(timer, _)| timer).collect()
    }
}
