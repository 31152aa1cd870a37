//! Proposer state machine for one round at a time. No I/O.
use std::collections::BTreeSet;
use std::time::Duration;

use tracing::{debug, warn};

use super::types::{PaxosMessage, ProposalNumber, ProposalValue};
use crate::node::outbox::Outbox;
use crate::node::timers::TimerKind;
use crate::node::Origin;

/// Proposer phase
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProposerPhase {
    Idle,
    /// Collecting promises (phase 1)
    Preparing {
        promises: BTreeSet<Origin>,
        /// Highest-numbered value reported as already accepted
        adopted: Option<(ProposalNumber, ProposalValue)>,
    },
    /// Collecting accepts (phase 2)
    Accepting {
        accepts: BTreeSet<Origin>,
        value: ProposalValue,
    },
    /// Commit broadcast; waiting for it to be applied locally
    Committing { value: ProposalValue },
}

#[derive(Debug)]
pub struct Proposer {
    me: Origin,
    participants: Vec<Origin>,
    quorum: usize,
    round_timeout: Duration,
    round: u32,
    /// Ballot of the current attempt
    number: ProposalNumber,
    /// Highest ballot used by us or seen in a rejection
    highest_seen: ProposalNumber,
    client_value: Option<ProposalValue>,
    phase: ProposerPhase,
}

impl Proposer {
    pub fn new(me: Origin, participants: Vec<Origin>, round_timeout: Duration) -> Self {
        let quorum = participants.len() / 2 + 1;
        Self {
            me,
            participants,
            quorum,
            round_timeout,
            round: 0,
            number: ProposalNumber::default(),
            highest_seen: ProposalNumber::default(),
            client_value: None,
            phase: ProposerPhase::Idle,
        }
    }

    /// Start proposing `value` for `round`
    pub fn phase1(&mut self, round: u32, value: ProposalValue, out: &mut Outbox) {
        debug!(
            "[{}] Proposing {} for round {}",
            self.me, value.id, round
        );
        self.round = round;
        self.client_value = Some(value);
        self.prepare(out);
    }

    fn prepare(&mut self, out: &mut Outbox) {
        let Some(number) = ProposalNumber::above(&self.highest_seen, self.me.clone()) else {
            warn!(
                "[{}] Round {}: no ballot above {}, not retrying",
                self.me, self.round, self.highest_seen
            );
            return;
        };
        self.number = number;
        self.highest_seen = self.number.clone();
        self.phase = ProposerPhase::Preparing {
            promises: BTreeSet::new(),
            adopted: None,
        };
        self.broadcast(
            PaxosMessage::Phase1 {
                round: self.round,
                number: self.number.clone(),
            },
            out,
        );
        out.arm(TimerKind::PaxosRound, self.round_timeout);
    }

    pub fn process_promise(
        &mut self,
        from: Origin,
        round: u32,
        number: ProposalNumber,
        accepted: Option<(ProposalNumber, ProposalValue)>,
        out: &mut Outbox,
    ) {
        if round != self.round || number != self.number {
            return;
        }
        let ProposerPhase::Preparing { promises, adopted } = &mut self.phase else {
            return;
        };
        if !promises.insert(from) {
            return;
        }
        if let Some((accepted_number, value)) = accepted {
            if adopted
                .as_ref()
                .map_or(true, |(best, _)| accepted_number > *best)
            {
                *adopted = Some((accepted_number, value));
            }
        }
        if promises.len() < self.quorum {
            return;
        }

        let value = match adopted.take() {
            Some((_, value)) => value,
            None => match &self.client_value {
                Some(value) => value.clone(),
                None => return,
            },
        };
        debug!(
            "[{}] Round {}: promised by a majority, accepting {}",
            self.me, self.round, value.id
        );
        out.stop(TimerKind::PaxosRound);
        self.phase = ProposerPhase::Accepting {
            accepts: BTreeSet::new(),
            value: value.clone(),
        };
        self.broadcast(
            PaxosMessage::Phase2 {
                round: self.round,
                number: self.number.clone(),
                value,
            },
            out,
        );
        out.arm(TimerKind::PaxosRound, self.round_timeout);
    }

    pub fn process_accept(
        &mut self,
        from: Origin,
        round: u32,
        number: ProposalNumber,
        out: &mut Outbox,
    ) {
        if round != self.round || number != self.number {
            return;
        }
        let ProposerPhase::Accepting { accepts, value } = &mut self.phase else {
            return;
        };
        if !accepts.insert(from) || accepts.len() < self.quorum {
            return;
        }

        let value = value.clone();
        debug!(
            "[{}] Round {}: accepted by a majority, committing {}",
            self.me, self.round, value.id
        );
        out.stop(TimerKind::PaxosRound);
        self.broadcast(
            PaxosMessage::Commit {
                round: self.round,
                number: self.number.clone(),
                value: value.clone(),
            },
            out,
        );
        self.phase = ProposerPhase::Committing { value };
    }

    /// A rejection. Retried with a higher number only when it answers the
    /// current attempt and carries a number above ours.
    pub fn process_failed(&mut self, round: u32, number: ProposalNumber, out: &mut Outbox) {
        if round != self.round || !self.is_balloting() {
            return;
        }
        // a ballot we can never outbid would stall every later retry
        if ProposalNumber::above(&number, self.me.clone()).is_none() {
            warn!(
                "[{}] Round {}: ignoring unbeatable rejection {}",
                self.me, self.round, number
            );
            return;
        }
        if number > self.highest_seen {
            self.highest_seen = number.clone();
        }
        if number <= self.number {
            return;
        }
        debug!(
            "[{}] Round {}: {} rejected by {}, retrying",
            self.me, self.round, self.number, number
        );
        self.prepare(out);
    }

    pub fn on_timeout(&mut self, out: &mut Outbox) {
        if !self.is_balloting() {
            return;
        }
        debug!(
            "[{}] Round {}: {} timed out, retrying",
            self.me, self.round, self.number
        );
        self.prepare(out);
    }

    /// Stop working on `round`, which was decided. Returns the client value
    /// this proposer was carrying for it.
    pub fn abandon(&mut self, round: u32, out: &mut Outbox) -> Option<ProposalValue> {
        if round != self.round || self.phase == ProposerPhase::Idle {
            return None;
        }
        out.stop(TimerKind::PaxosRound);
        self.phase = ProposerPhase::Idle;
        self.client_value.take()
    }

    fn broadcast(&self, message: PaxosMessage, out: &mut Outbox) {
        for participant in &self.participants {
            out.paxos(participant.clone(), message.clone());
        }
    }

    fn is_balloting(&self) -> bool {
        matches!(
            self.phase,
            ProposerPhase::Preparing { .. } | ProposerPhase::Accepting { .. }
        )
    }

    pub fn is_proposing(&self) -> bool {
        self.phase != ProposerPhase::Idle
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn number(&self) -> &ProposalNumber {
        &self.number
    }

    pub fn phase(&self) -> &ProposerPhase {
        &self.phase
    }

    pub fn client_value(&self) -> Option<&ProposalValue> {
        self.client_value.as_ref()
    }

    pub fn quorum(&self) -> usize {
        self.quorum
    }
}
