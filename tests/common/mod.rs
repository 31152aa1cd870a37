#![allow(dead_code)]
//! In-memory harnesses driving the protocol state machines without sockets.
use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::time::Duration;

use peerster::gossip::GossipEngine;
use peerster::messages::Message;
use peerster::node::{Effect, NodeEvent, Origin, Outbox, TimerKind};
use peerster::paxos::{Coordinator, PaxosMessage, ProposalValue};
use peerster::settings::GossipTimings;

pub fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

pub fn origins(names: &[&str]) -> Vec<Origin> {
    names.iter().map(|name| Origin::from(*name)).collect()
}

/// A message between two participants that has not been delivered yet
#[derive(Clone, Debug)]
pub struct InFlight {
    pub from: Origin,
    pub to: Origin,
    pub message: PaxosMessage,
}

/// Participants exchanging consensus messages through a shared pool that
/// the test delivers, duplicates or drops at will.
pub struct PaxosCluster {
    pub nodes: BTreeMap<Origin, Coordinator>,
    pub in_flight: Vec<InFlight>,
    /// Every value ever announced as decided, per round
    pub decided: BTreeMap<u32, BTreeSet<String>>,
    pub events: Vec<(Origin, NodeEvent)>,
}

impl PaxosCluster {
    pub fn new(names: &[&str]) -> Self {
        let participants = origins(names);
        let nodes = participants
            .iter()
            .map(|me| {
                let coordinator =
                    Coordinator::new(me.clone(), participants.clone(), Duration::from_secs(3))
                        .unwrap();
                (me.clone(), coordinator)
            })
            .collect();
        Self {
            nodes,
            in_flight: Vec::new(),
            decided: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    pub fn propose(&mut self, at: &str, text: &str) -> ProposalValue {
        let me = Origin::from(at);
        let mut out = Outbox::new();
        let value = self
            .nodes
            .get_mut(&me)
            .unwrap()
            .client_request(text.to_string(), &mut out);
        self.collect(&me, out);
        value
    }

    fn collect(&mut self, from: &Origin, mut out: Outbox) {
        for effect in out.take() {
            match effect {
                Effect::Paxos { dest, message } => {
                    if let PaxosMessage::Commit { round, value, .. }
                    | PaxosMessage::Lagging { round, value, .. } = &message
                    {
                        self.decided
                            .entry(*round)
                            .or_default()
                            .insert(value.id.clone());
                    }
                    self.in_flight.push(InFlight {
                        from: from.clone(),
                        to: dest,
                        message,
                    });
                }
                Effect::Notify(event) => self.events.push((from.clone(), event)),
                Effect::Send { .. } | Effect::Arm { .. } | Effect::Stop(_) => {}
            }
        }
    }

    /// Deliver (and remove) the message at `index`
    pub fn deliver(&mut self, index: usize) {
        let InFlight { from, to, message } = self.in_flight.remove(index);
        let mut out = Outbox::new();
        self.nodes
            .get_mut(&to)
            .unwrap()
            .handle(from, message, &mut out);
        self.collect(&to, out);
    }

    pub fn duplicate(&mut self, index: usize) {
        let copy = self.in_flight[index].clone();
        self.in_flight.push(copy);
    }

    pub fn drop_message(&mut self, index: usize) {
        self.in_flight.remove(index);
    }

    /// Deliver everything in order, up to `limit` messages
    pub fn run_fifo(&mut self, limit: usize) {
        let mut delivered = 0;
        while !self.in_flight.is_empty() && delivered < limit {
            self.deliver(0);
            delivered += 1;
        }
    }

    /// Round timer fires everywhere
    pub fn fire_timeouts(&mut self) {
        let names: Vec<Origin> = self.nodes.keys().cloned().collect();
        for name in names {
            let mut out = Outbox::new();
            self.nodes.get_mut(&name).unwrap().on_round_timeout(&mut out);
            self.collect(&name, out);
        }
    }

    /// Deliver and time out until nobody is proposing
    pub fn settle(&mut self) {
        for _ in 0..100 {
            self.run_fifo(100_000);
            if self.nodes.values().all(|node| !node.is_proposing()) {
                return;
            }
            self.fire_timeouts();
        }
        panic!("cluster did not settle");
    }

    pub fn commits(&self, name: &str) -> &BTreeMap<u32, ProposalValue> {
        self.nodes.get(name).unwrap().commits()
    }

    pub fn node(&self, name: &str) -> &Coordinator {
        self.nodes.get(name).unwrap()
    }

    /// No round ever saw two different values decided, and no two nodes
    /// recorded different values for the same round.
    pub fn assert_safe(&self) {
        for (round, ids) in &self.decided {
            assert!(ids.len() <= 1, "round {} decided {:?}", round, ids);
        }
        let mut seen: BTreeMap<u32, &ProposalValue> = BTreeMap::new();
        for node in self.nodes.values() {
            for (round, value) in node.commits() {
                if let Some(other) = seen.insert(*round, value) {
                    assert_eq!(other, value, "round {} diverged", round);
                }
            }
        }
    }
}

/// Gossip engines wired together through an in-memory datagram queue
pub struct GossipNet {
    pub engines: Vec<GossipEngine>,
    pub queue: Vec<(SocketAddr, SocketAddr, Message)>,
}

impl GossipNet {
    /// `count` engines on ports 45000.., each knowing only the next one
    pub fn chain(count: u16) -> Self {
        let mut engines = Vec::new();
        for i in 0..count {
            let mut engine = GossipEngine::new(
                Origin::from(format!("n{}", i).as_str()),
                addr(45000 + i),
                &GossipTimings::default(),
                false,
            )
            .with_seed(i as u64);
            if i + 1 < count {
                engine.learn_neighbor(addr(45000 + i + 1));
            }
            engines.push(engine);
        }
        Self {
            engines,
            queue: Vec::new(),
        }
    }

    fn index(addr: SocketAddr) -> usize {
        (addr.port() - 45000) as usize
    }

    pub fn submit(&mut self, at: usize, text: &str) {
        let mut out = Outbox::new();
        self.engines[at].submit_local(text.to_string(), &mut out).unwrap();
        self.collect(at, out);
    }

    pub fn collect(&mut self, at: usize, mut out: Outbox) {
        let from = addr(45000 + at as u16);
        for effect in out.take() {
            if let Effect::Send { to, message } = effect {
                self.queue.push((from, to, message));
            }
        }
    }

    pub fn deliver(&mut self, index: usize) {
        let (from, to, message) = self.queue.remove(index);
        let at = Self::index(to);
        let mut out = Outbox::new();
        match message {
            Message::Rumor { rumor, last_hop } => {
                self.engines[at].receive_rumor(rumor, from, last_hop, &mut out);
            }
            Message::Status(status) => self.engines[at].receive_status(status, from, &mut out),
            _ => {}
        }
        self.collect(at, out);
    }

    /// Fire the given timer on every engine
    pub fn tick(&mut self, timer: TimerKind) {
        for at in 0..self.engines.len() {
            let mut out = Outbox::new();
            match timer {
                TimerKind::Rumor => self.engines[at].on_rumor_timeout(&mut out),
                TimerKind::AntiEntropy => self.engines[at].on_anti_entropy(&mut out),
                _ => {}
            }
            self.collect(at, out);
        }
    }

    pub fn run_fifo(&mut self, limit: usize) {
        let mut delivered = 0;
        while !self.queue.is_empty() && delivered < limit {
            self.deliver(0);
            delivered += 1;
        }
    }

    pub fn converged(&self) -> bool {
        let first = self.engines[0].status();
        self.engines.iter().all(|engine| engine.status() == first)
    }
}
