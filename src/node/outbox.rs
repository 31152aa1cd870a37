//! Effects produced by the protocol state machines.
//!
//! The gossip engine, router and Paxos coordinator never touch the socket,
//! the clock or the front-end channels. They push effects here and the node
//! controller applies them, in order, after the event that produced them.
use std::net::SocketAddr;
use std::time::Duration;

use super::commands::NodeEvent;
use super::timers::TimerKind;
use super::Origin;
use crate::messages::Message;
use crate::paxos::PaxosMessage;

#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Unicast a record to a neighbor
    Send { to: SocketAddr, message: Message },
    /// Hand a consensus message to the router for delivery to a participant
    Paxos { dest: Origin, message: PaxosMessage },
    /// (Re)arm a single-shot timer, replacing any pending deadline
    Arm { timer: TimerKind, after: Duration },
    /// Cancel a pending timer
    Stop(TimerKind),
    /// Notify the front ends
    Notify(NodeEvent),
}

#[derive(Debug, Default)]
pub struct Outbox {
    effects: Vec<Effect>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, to: SocketAddr, message: Message) {
        self.effects.push(Effect::Send { to, message });
    }

    pub fn paxos(&mut self, dest: Origin, message: PaxosMessage) {
        self.effects.push(Effect::Paxos { dest, message });
    }

    pub fn arm(&mut self, timer: TimerKind, after: Duration) {
        self.effects.push(Effect::Arm { timer, after });
    }

    pub fn stop(&mut self, timer: TimerKind) {
        self.effects.push(Effect::Stop(timer));
    }

    pub fn notify(&mut self, event: NodeEvent) {
        self.effects.push(Effect::Notify(event));
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    /// Take every pending effect, leaving the outbox empty
    pub fn take(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    /// Records sent so far, with their destinations
    pub fn sent(&self) -> Vec<(SocketAddr, &Message)> {
        self.effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Send { to, message } => Some((*to, message)),
                _ => None,
            })
            .collect()
    }

    /// Consensus messages handed to the router so far
    pub fn paxos_sent(&self) -> Vec<(&Origin, &PaxosMessage)> {
        self.effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Paxos { dest, message } => Some((dest, message)),
                _ => None,
            })
            .collect()
    }

    pub fn events(&self) -> Vec<&NodeEvent> {
        self.effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Notify(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    /// Whether the last timer operation on `timer` left it armed
    pub fn armed(&self, timer: TimerKind) -> bool {
        self.effects
            .iter()
            .rev()
            .find_map(|effect| match effect {
                Effect::Arm { timer: t, .. } if *t == timer => Some(true),
                Effect::Stop(t) if *t == timer => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::StatusVector;

    #[test]
    fn test_armed_tracks_last_operation() {
        let mut outbox = Outbox::new();
        assert!(!outbox.armed(TimerKind::Rumor));

        outbox.arm(TimerKind::Rumor, Duration::from_millis(10));
        assert!(outbox.armed(TimerKind::Rumor));
        assert!(!outbox.armed(TimerKind::AntiEntropy));

        outbox.stop(TimerKind::Rumor);
        assert!(!outbox.armed(TimerKind::Rumor));
    }

    #[test]
    fn test_take_drains_effects() {
        let mut outbox = Outbox::new();
        let to: SocketAddr = "127.0.0.1:45001".parse().unwrap();
        outbox.send(to, Message::Status(StatusVector::new()));
        assert_eq!(outbox.sent().len(), 1);

        let effects = outbox.take();
        assert_eq!(effects.len(), 1);
        assert!(outbox.is_empty());
    }
}
