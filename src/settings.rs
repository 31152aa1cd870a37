//! Peerster node settings
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::config_error;
use crate::error::Result;
use crate::node::Origin;

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const STANDARD_PORT_UDP: u16 = 45000;
pub const DEFAULT_PORT_UDP: &str = "45000";

/// Initial hop budget of a private or consensus envelope
pub const HOP_LIMIT: u32 = 10;

pub const RUMOR_TIMEOUT_MS: u64 = 2000;
pub const ANTI_ENTROPY_INTERVAL_MS: u64 = 10_000;
pub const ROUTE_ANNOUNCE_INTERVAL_MS: u64 = 60_000;
pub const PAXOS_ROUND_TIMEOUT_MS: u64 = 3000;

/// Single-shot timer periods used by the node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GossipTimings {
    // Retransmission of the hot rumor when no status came back
    pub rumor_timeout: Duration,
    // Status vector push to a random neighbor
    pub anti_entropy_interval: Duration,
    // Route rumor self announcement
    pub route_announce_interval: Duration,
    // Paxos proposer round timer
    pub paxos_round_timeout: Duration,
}

impl Default for GossipTimings {
    fn default() -> Self {
        Self {
            rumor_timeout: Duration::from_millis(RUMOR_TIMEOUT_MS),
            anti_entropy_interval: Duration::from_millis(ANTI_ENTROPY_INTERVAL_MS),
            route_announce_interval: Duration::from_millis(ROUTE_ANNOUNCE_INTERVAL_MS),
            paxos_round_timeout: Duration::from_millis(PAXOS_ROUND_TIMEOUT_MS),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    // UDP listen address
    pub listen_address: String,

    // UDP listen port
    pub listen_port: u16,

    // Origin identity; derived from the bound address when unset
    pub node_name: Option<String>,

    // Neighbors known at startup
    pub peers: Vec<SocketAddr>,

    // Paxos participant identities (self included); empty means just us
    pub participants: Vec<String>,

    // Leaf mode: never relay rumors of other origins
    pub noforward: bool,

    pub timings: GossipTimings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_address: "127.0.0.1".to_string(),
            listen_port: STANDARD_PORT_UDP,
            node_name: None,
            peers: Vec::new(),
            participants: Vec::new(),
            noforward: false,
            timings: GossipTimings::default(),
        }
    }
}

impl Settings {
    pub fn listen_socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .listen_address
            .parse()
            .map_err(|_| config_error!("Invalid listen address: {}", self.listen_address))?;
        Ok(SocketAddr::new(ip, self.listen_port))
    }

    /// Origin of this node once its socket is bound to `local_addr`
    pub fn origin(&self, local_addr: SocketAddr) -> Origin {
        match &self.node_name {
            Some(name) => Origin::from(name.as_str()),
            None => Origin::from_socket_addr(local_addr),
        }
    }

    /// Participant set for consensus, always including `me`
    pub fn participants(&self, me: &Origin) -> Vec<Origin> {
        let mut participants: Vec<Origin> = self
            .participants
            .iter()
            .map(|p| Origin::from(p.as_str()))
            .collect();
        if !participants.contains(me) {
            participants.push(me.clone());
        }
        participants.sort();
        participants.dedup();
        participants
    }
}
