//! Acceptor state machine: per-round promises and accepted values. No I/O.
use std::collections::BTreeMap;

use super::types::{PaxosMessage, ProposalNumber, ProposalValue};

/// One independent acceptor per round, kept in a pair of maps.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Acceptor {
    /// Per-round: highest promised proposal
    promised: BTreeMap<u32, ProposalNumber>,
    /// Per-round: accepted (proposal, value)
    accepted: BTreeMap<u32, (ProposalNumber, ProposalValue)>,
}

impl Acceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase 1. Promise `number` if it beats every earlier promise for the
    /// round, reporting whatever was accepted so far; otherwise reject with
    /// the promise that dominates it.
    pub fn try_promise(&mut self, round: u32, number: ProposalNumber) -> PaxosMessage {
        if let Some(promised) = self.promised.get(&round) {
            if number <= *promised {
                return PaxosMessage::Reject {
                    round,
                    number: promised.clone(),
                };
            }
        }
        self.promised.insert(round, number.clone());
        PaxosMessage::Promise {
            round,
            number,
            accepted: self.accepted.get(&round).cloned(),
        }
    }

    /// Phase 2. Accept unless a strictly higher number was promised.
    pub fn try_accept(
        &mut self,
        round: u32,
        number: ProposalNumber,
        value: ProposalValue,
    ) -> PaxosMessage {
        if let Some(promised) = self.promised.get(&round) {
            if number < *promised {
                return PaxosMessage::Reject {
                    round,
                    number: promised.clone(),
                };
            }
        }
        self.promised.insert(round, number.clone());
        self.accepted.insert(round, (number.clone(), value));
        PaxosMessage::Accept { round, number }
    }

    pub fn promised(&self, round: u32) -> Option<&ProposalNumber> {
        self.promised.get(&round)
    }

    pub fn accepted(&self, round: u32) -> Option<&(ProposalNumber, ProposalValue)> {
        self.accepted.get(&round)
    }
}
