//! Multi-instance Paxos over the participant set.
//!
//! Every participant runs one [`Coordinator`], which owns a single
//! [`Proposer`] (working on one round at a time), the per-round
//! [`Acceptor`] state and the commit log. All three are synchronous state
//! machines; outbound messages go through the node's outbox and are routed
//! to participants by origin.
pub mod acceptor;
pub mod coordinator;
pub mod proposer;
pub mod types;

pub use acceptor::Acceptor;
pub use coordinator::{CommitOutcome, Coordinator};
pub use proposer::{Proposer, ProposerPhase};
pub use types::{PaxosKind, PaxosMessage, ProposalNumber, ProposalValue};
