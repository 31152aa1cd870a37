//! Multi-instance Paxos: one proposer, one acceptor per round, and the
//! commit log they produce.
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::acceptor::Acceptor;
use super::proposer::Proposer;
use super::types::{PaxosMessage, ProposalValue};
use crate::error::{PaxosError, Result};
use crate::node::outbox::Outbox;
use crate::node::{NodeEvent, Origin};

/// What `commit` did with a decided value
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// Same value as already recorded for the round
    Duplicate,
    /// A different value is already recorded; the new one is refused
    Conflict,
}

#[derive(Debug)]
pub struct Coordinator {
    me: Origin,
    participants: Vec<Origin>,
    proposer: Proposer,
    acceptor: Acceptor,
    commits: BTreeMap<u32, ProposalValue>,
    max_safe_round: u32,
    pending: VecDeque<ProposalValue>,
    requests: u64,
}

impl Coordinator {
    pub fn new(me: Origin, participants: Vec<Origin>, round_timeout: Duration) -> Result<Self> {
        if participants.is_empty() {
            return Err(PaxosError::NoParticipants.into());
        }
        if !participants.contains(&me) {
            return Err(PaxosError::NotAParticipant(me.to_string()).into());
        }
        Ok(Self {
            proposer: Proposer::new(me.clone(), participants.clone(), round_timeout),
            acceptor: Acceptor::new(),
            me,
            participants,
            commits: BTreeMap::new(),
            max_safe_round: 0,
            pending: VecDeque::new(),
            requests: 0,
        })
    }

    /// Queue a client value and start proposing if the proposer is free
    pub fn client_request(&mut self, text: String, out: &mut Outbox) -> ProposalValue {
        self.requests += 1;
        let value = ProposalValue::new(format!("{}/{}", self.me, self.requests), text);
        self.pending.push_back(value.clone());
        self.propose_next(out);
        value
    }

    /// Dispatch one consensus message from `from`
    pub fn handle(&mut self, from: Origin, message: PaxosMessage, out: &mut Outbox) {
        match message {
            PaxosMessage::Phase1 { round, number } => {
                let reply = match self.commits.get(&round) {
                    Some(value) => PaxosMessage::Lagging {
                        round,
                        number,
                        value: value.clone(),
                    },
                    None => self.acceptor.try_promise(round, number),
                };
                out.paxos(from, reply);
            }
            PaxosMessage::Phase2 {
                round,
                number,
                value,
            } => {
                let reply = self.acceptor.try_accept(round, number, value);
                out.paxos(from, reply);
            }
            PaxosMessage::Reject { round, number } => {
                self.proposer.process_failed(round, number, out);
            }
            PaxosMessage::Promise {
                round,
                number,
                accepted,
            } => {
                self.proposer
                    .process_promise(from, round, number, accepted, out);
            }
            PaxosMessage::Accept { round, number } => {
                self.proposer.process_accept(from, round, number, out);
            }
            PaxosMessage::Commit { round, value, .. } => {
                self.commit(round, value, out);
            }
            PaxosMessage::Lagging { round, value, .. } => {
                debug!("[{}] Round {} already decided, per {}", self.me, round, from);
                self.commit(round, value, out);
            }
        }
    }

    /// Record `value` as decided for `round`. Idempotent.
    pub fn commit(&mut self, round: u32, value: ProposalValue, out: &mut Outbox) -> CommitOutcome {
        if let Some(existing) = self.commits.get(&round) {
            if *existing == value {
                return CommitOutcome::Duplicate;
            }
            warn!(
                "[{}] Round {} already committed to {}, refusing {}",
                self.me, round, existing.id, value.id
            );
            return CommitOutcome::Conflict;
        }

        info!(
            "[{}] Round {} committed: {} {:?}",
            self.me, round, value.id, value.text
        );
        self.commits.insert(round, value.clone());
        self.max_safe_round = self.max_safe_round.max(round);

        if let Some(carried) = self.proposer.abandon(round, out) {
            if carried.id != value.id {
                debug!(
                    "[{}] Lost round {}, requeueing {}",
                    self.me, round, carried.id
                );
                self.pending.push_front(carried);
            }
        }
        out.notify(NodeEvent::ValueCommitted { round, value });
        self.propose_next(out);
        CommitOutcome::Committed
    }

    pub fn on_round_timeout(&mut self, out: &mut Outbox) {
        self.proposer.on_timeout(out);
    }

    fn propose_next(&mut self, out: &mut Outbox) {
        if self.proposer.is_proposing() {
            return;
        }
        if let Some(value) = self.pending.pop_front() {
            self.proposer.phase1(self.max_safe_round + 1, value, out);
        }
    }

    pub fn me(&self) -> &Origin {
        &self.me
    }

    pub fn participants(&self) -> &[Origin] {
        &self.participants
    }

    pub fn commits(&self) -> &BTreeMap<u32, ProposalValue> {
        &self.commits
    }

    pub fn max_safe_round(&self) -> u32 {
        self.max_safe_round
    }

    pub fn pending(&self) -> &VecDeque<ProposalValue> {
        &self.pending
    }

    pub fn is_proposing(&self) -> bool {
        self.proposer.is_proposing()
    }

    pub fn proposer(&self) -> &Proposer {
        &self.proposer
    }
}
