/// Commands from front ends into the node task, and events back out.
use std::collections::BTreeMap;
use std::net::SocketAddr;

use tokio::sync::oneshot;

use crate::error::Result;
use crate::messages::{Rumor, SearchRequest, StatusVector};
use crate::node::Origin;
use crate::paxos::ProposalValue;

/// Commands that front ends send to the node controller
#[derive(Debug)]
pub enum NodeCommand {
    /// Originate a chat rumor; answers with its sequence number
    SubmitChat {
        text: String,
        resp_chan: oneshot::Sender<Result<u32>>,
    },
    /// Route a private message; answers false when no route is known
    SendPrivate {
        dest: Origin,
        text: String,
        resp_chan: oneshot::Sender<bool>,
    },
    /// Submit a value for consensus; answers with the value's id
    ProposeValue {
        text: String,
        resp_chan: oneshot::Sender<String>,
    },
    /// Add a neighbor by address
    AddPeer {
        addr: SocketAddr,
        resp_chan: oneshot::Sender<bool>,
    },
    /// Read-only view of node state
    Snapshot {
        resp_chan: oneshot::Sender<NodeSnapshot>,
    },
}

/// Notifications for front ends
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeEvent {
    /// A chat rumor was accepted into the message log
    MessageAccepted {
        origin: Origin,
        sequence: u32,
        text: String,
    },
    /// A private message addressed to us arrived
    PrivateReceived { origin: Origin, text: Option<String> },
    /// A consensus round was decided
    ValueCommitted { round: u32, value: ProposalValue },
    /// A search request for the external dispatcher
    SearchRequest(SearchRequest),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub origin: Origin,
    pub status: StatusVector,
    pub messages: Vec<Rumor>,
    pub neighbors: Vec<SocketAddr>,
    pub routes: BTreeMap<Origin, SocketAddr>,
    pub commits: BTreeMap<u32, ProposalValue>,
    pub hot: bool,
}

impl NodeSnapshot {
    /// Chat texts accepted from `origin`, in sequence order
    pub fn chat_from(&self, origin: &str) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|rumor| rumor.origin.as_str() == origin)
            .filter_map(Rumor::chat_text)
            .collect()
    }
}
