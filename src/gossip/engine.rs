//! Rumor mongering and anti-entropy over a vector clock.
use std::net::SocketAddr;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use super::{MessageLog, NeighborTable, VectorClock};
use crate::error::{GossipError, Result};
use crate::messages::{Message, Payload, Rumor, StatusVector};
use crate::node::outbox::Outbox;
use crate::node::timers::TimerKind;
use crate::node::{NodeEvent, Origin};
use crate::settings::GossipTimings;

/// The most recently accepted rumor still being pushed to neighbors
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HotRumor {
    pub rumor: Rumor,
    /// Peer we got it from; `None` for our own rumors
    pub received_from: Option<SocketAddr>,
}

#[derive(Debug)]
pub struct GossipEngine {
    me: Origin,
    next_sequence: u32,
    clock: VectorClock,
    log: MessageLog,
    neighbors: NeighborTable,
    hot: Option<HotRumor>,
    anything_hot: bool,
    noforward: bool,
    rumor_timeout: Duration,
    anti_entropy_interval: Duration,
    rng: StdRng,
}

impl GossipEngine {
    pub fn new(me: Origin, local_addr: SocketAddr, timings: &GossipTimings, noforward: bool) -> Self {
        Self {
            me,
            next_sequence: 1,
            clock: VectorClock::new(),
            log: MessageLog::new(),
            neighbors: NeighborTable::new(local_addr),
            hot: None,
            anything_hot: false,
            noforward,
            rumor_timeout: timings.rumor_timeout,
            anti_entropy_interval: timings.anti_entropy_interval,
            rng: StdRng::from_entropy(),
        }
    }

    /// Replace the random source, for reproducible peer selection in tests
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Arm the periodic anti-entropy timer
    pub fn start(&mut self, out: &mut Outbox) {
        out.arm(TimerKind::AntiEntropy, self.anti_entropy_interval);
    }

    pub fn me(&self) -> &Origin {
        &self.me
    }

    pub fn learn_neighbor(&mut self, addr: SocketAddr) -> bool {
        let learned = self.neighbors.learn(addr);
        if learned {
            debug!("[{}] New neighbor {}", self.me, addr);
        }
        learned
    }

    /// Allocate the next local sequence number. Chat and route rumors share
    /// the counter.
    pub fn originate(&mut self, payload: Payload) -> Rumor {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        Rumor {
            origin: self.me.clone(),
            sequence,
            payload,
        }
    }

    /// Accept an own rumor locally, turning a refusal into an error
    pub fn accept_own(&mut self, rumor: Rumor, out: &mut Outbox) -> Result<Rumor> {
        let expected = self.clock.expected(rumor.origin.as_str());
        if !self.accept_rumor(rumor.clone(), None, out) {
            return Err(GossipError::LocalClock {
                origin: rumor.origin.to_string(),
                sequence: rumor.sequence,
                expected,
            }
            .into());
        }
        Ok(rumor)
    }

    /// Originate a chat rumor and start mongering it
    pub fn submit_local(&mut self, text: String, out: &mut Outbox) -> Result<Rumor> {
        let rumor = self.originate(Payload::Chat(text));
        let rumor = self.accept_own(rumor, out)?;
        self.propagate_step(out);
        Ok(rumor)
    }

    /// Accept `rumor` iff it is exactly the next sequence number expected
    /// from its origin. Everything else is dropped; nothing is buffered.
    pub fn accept_rumor(
        &mut self,
        rumor: Rumor,
        received_from: Option<SocketAddr>,
        out: &mut Outbox,
    ) -> bool {
        let expected = self.clock.expected(rumor.origin.as_str());
        if rumor.sequence != expected {
            debug!(
                "[{}] Dropping rumor {}#{}: expected #{}",
                self.me, rumor.origin, rumor.sequence, expected
            );
            return false;
        }
        if !self.log.append(rumor.clone()) {
            warn!(
                "[{}] Message log out of step with clock for {}",
                self.me, rumor.origin
            );
            return false;
        }
        self.clock.advance(&rumor.origin, rumor.sequence);

        if let Some(text) = rumor.chat_text() {
            out.notify(NodeEvent::MessageAccepted {
                origin: rumor.origin.clone(),
                sequence: rumor.sequence,
                text: text.to_string(),
            });
        }

        out.stop(TimerKind::Rumor);
        if self.noforward && rumor.origin != self.me {
            return true;
        }
        self.hot = Some(HotRumor {
            rumor,
            received_from,
        });
        self.anything_hot = true;
        true
    }

    /// Inbound rumor datagram. Every rumor is acknowledged with our status,
    /// accepted or not.
    pub fn receive_rumor(
        &mut self,
        rumor: Rumor,
        from: SocketAddr,
        last_hop: Option<SocketAddr>,
        out: &mut Outbox,
    ) -> bool {
        self.learn_neighbor(from);
        if let Some(addr) = last_hop {
            self.learn_neighbor(addr);
        }

        let accepted = self.accept_rumor(rumor, Some(from), out);
        out.send(from, Message::Status(self.status()));
        if accepted {
            self.propagate_step(out);
        }
        accepted
    }

    /// Push the hot rumor to one random neighbor and wait for its status
    pub fn propagate_step(&mut self, out: &mut Outbox) {
        if !self.anything_hot {
            return;
        }
        let Some(peer) = self.neighbors.random(&mut self.rng) else {
            return;
        };
        self.send_hot(peer, out);
    }

    pub fn on_rumor_timeout(&mut self, out: &mut Outbox) {
        if self.anything_hot {
            debug!("[{}] No status came back, retransmitting", self.me);
            self.propagate_step(out);
        }
    }

    pub fn on_anti_entropy(&mut self, out: &mut Outbox) {
        if let Some(peer) = self.neighbors.random(&mut self.rng) {
            out.send(peer, Message::Status(self.status()));
        }
        out.arm(TimerKind::AntiEntropy, self.anti_entropy_interval);
    }

    /// Compare a peer's status vector with ours. The first mismatch wins.
    pub fn receive_status(&mut self, status: StatusVector, from: SocketAddr, out: &mut Outbox) {
        self.learn_neighbor(from);
        for origin in status.keys() {
            self.clock.learn(origin);
        }
        out.stop(TimerKind::Rumor);

        // 1. we hold something they lack
        let missing = self
            .clock
            .ahead_of(&status)
            .filter(|(origin, _)| !self.noforward || **origin == self.me)
            .find_map(|(origin, wanted)| self.log.get(origin.as_str(), wanted))
            .cloned();
        if let Some(rumor) = missing {
            debug!(
                "[{}] {} is missing {}#{}",
                self.me, from, rumor.origin, rumor.sequence
            );
            out.send(
                from,
                Message::Rumor {
                    rumor,
                    last_hop: None,
                },
            );
            out.arm(TimerKind::Rumor, self.rumor_timeout);
            return;
        }

        // 2. they hold something we lack
        if let Some((origin, theirs)) = self.clock.first_behind(&status) {
            debug!(
                "[{}] {} is ahead on {} (#{}), pulling",
                self.me, from, origin, theirs
            );
            out.send(from, Message::Status(self.status()));
            return;
        }

        // 3. in sync
        if !self.anything_hot {
            return;
        }
        if self.rng.gen_bool(0.5) {
            if let Some(peer) = self.neighbors.random(&mut self.rng) {
                self.send_hot(peer, out);
            }
        } else {
            debug!("[{}] In sync with {}, rumor goes cold", self.me, from);
            self.anything_hot = false;
        }
    }

    fn send_hot(&mut self, peer: SocketAddr, out: &mut Outbox) {
        let Some(hot) = &self.hot else {
            return;
        };
        out.send(
            peer,
            Message::Rumor {
                rumor: hot.rumor.clone(),
                last_hop: hot.received_from,
            },
        );
        out.arm(TimerKind::Rumor, self.rumor_timeout);
    }

    pub fn status(&self) -> StatusVector {
        self.clock.status()
    }

    pub fn vector_clock(&self) -> &VectorClock {
        &self.clock
    }

    pub fn message_log(&self) -> &MessageLog {
        &self.log
    }

    pub fn neighbors(&self) -> &NeighborTable {
        &self.neighbors
    }

    pub fn is_hot(&self) -> bool {
        self.anything_hot
    }

    pub fn hot_message(&self) -> Option<&HotRumor> {
        self.hot.as_ref()
    }

    pub fn is_noforward(&self) -> bool {
        self.noforward
    }
}
