//! Consensus value types shared by the proposer, the acceptor and the wire codec
use serde::{Deserialize, Serialize};

use crate::node::Origin;

/// Paxos ballot: ordered by `(number, name)`, the proposer name breaking ties
/// so two proposers never produce equal ballots.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProposalNumber {
    #[serde(rename = "Number")]
    pub number: u64,
    #[serde(rename = "Name")]
    pub name: Origin,
}

impl ProposalNumber {
    pub fn new(number: u64, name: Origin) -> Self {
        Self { number, name }
    }

    /// Smallest ballot owned by `name` that dominates `other`, or `None`
    /// once the counter is exhausted
    pub fn above(other: &ProposalNumber, name: Origin) -> Option<Self> {
        let number = other.number.checked_add(1)?;
        Some(Self { number, name })
    }
}

impl std::fmt::Display for ProposalNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.number, self.name)
    }
}

/// A client value submitted for consensus.
///
/// `id` is unique per client request (`"<origin>/<n>"`), which lets a
/// proposer tell whether a committed value was the one it was carrying.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct ProposalValue {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Text")]
    pub text: String,
}

impl ProposalValue {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Wire kind codes. Proposer-originated kinds are odd, acceptor replies even.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PaxosKind {
    Reject,
    Phase1,
    PromiseValue,
    Phase2,
    PromiseNoValue,
    Commit,
    Accept,
    Lagging,
}

impl PaxosKind {
    pub fn code(self) -> u8 {
        match self {
            PaxosKind::Reject => 0,
            PaxosKind::Phase1 => 1,
            PaxosKind::PromiseValue => 2,
            PaxosKind::Phase2 => 3,
            PaxosKind::PromiseNoValue => 4,
            PaxosKind::Commit => 5,
            PaxosKind::Accept => 6,
            PaxosKind::Lagging => 8,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(PaxosKind::Reject),
            1 => Some(PaxosKind::Phase1),
            2 => Some(PaxosKind::PromiseValue),
            3 => Some(PaxosKind::Phase2),
            4 => Some(PaxosKind::PromiseNoValue),
            5 => Some(PaxosKind::Commit),
            6 => Some(PaxosKind::Accept),
            8 => Some(PaxosKind::Lagging),
            _ => None,
        }
    }
}

/// Consensus messages exchanged between participants
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaxosMessage {
    /// Proposer: prepare `number` for `round`
    Phase1 { round: u32, number: ProposalNumber },
    /// Proposer: accept `value` under `number`
    Phase2 {
        round: u32,
        number: ProposalNumber,
        value: ProposalValue,
    },
    /// Proposer: `value` is chosen for `round`
    Commit {
        round: u32,
        number: ProposalNumber,
        value: ProposalValue,
    },
    /// Acceptor: refused; `number` is the acceptor's highest promise
    Reject { round: u32, number: ProposalNumber },
    /// Acceptor: promised `number`, reporting any previously accepted pair
    Promise {
        round: u32,
        number: ProposalNumber,
        accepted: Option<(ProposalNumber, ProposalValue)>,
    },
    /// Acceptor: accepted the phase 2 request under `number`
    Accept { round: u32, number: ProposalNumber },
    /// Acceptor: `round` is already committed to `value`; `number` echoes the
    /// phase 1 request being answered
    Lagging {
        round: u32,
        number: ProposalNumber,
        value: ProposalValue,
    },
}

impl PaxosMessage {
    pub fn kind(&self) -> PaxosKind {
        match self {
            PaxosMessage::Phase1 { .. } => PaxosKind::Phase1,
            PaxosMessage::Phase2 { .. } => PaxosKind::Phase2,
            PaxosMessage::Commit { .. } => PaxosKind::Commit,
            PaxosMessage::Reject { .. } => PaxosKind::Reject,
            PaxosMessage::Promise { accepted: Some(_), .. } => PaxosKind::PromiseValue,
            PaxosMessage::Promise { accepted: None, .. } => PaxosKind::PromiseNoValue,
            PaxosMessage::Accept { .. } => PaxosKind::Accept,
            PaxosMessage::Lagging { .. } => PaxosKind::Lagging,
        }
    }

    pub fn round(&self) -> u32 {
        match self {
            PaxosMessage::Phase1 { round, .. }
            | PaxosMessage::Phase2 { round, .. }
            | PaxosMessage::Commit { round, .. }
            | PaxosMessage::Reject { round, .. }
            | PaxosMessage::Promise { round, .. }
            | PaxosMessage::Accept { round, .. }
            | PaxosMessage::Lagging { round, .. } => *round,
        }
    }

    pub fn number(&self) -> &ProposalNumber {
        match self {
            PaxosMessage::Phase1 { number, .. }
            | PaxosMessage::Phase2 { number, .. }
            | PaxosMessage::Commit { number, .. }
            | PaxosMessage::Reject { number, .. }
            | PaxosMessage::Promise { number, .. }
            | PaxosMessage::Accept { number, .. }
            | PaxosMessage::Lagging { number, .. } => number,
        }
    }
}
