//! CLI for this application
//!
use std::net::{SocketAddr, ToSocketAddrs};

use crate::config_error;
use crate::error::Result;
use crate::settings;

#[derive(Clone, Debug, clap::Parser)]
#[clap(version, about = "Gossip chat, private routing and Paxos over UDP")]
pub struct Cli {
    // UDP listen address
    #[clap(
        long,
        default_value = "127.0.0.1",
        env("PEERSTER_LISTEN_ADDRESS"),
        help = "IP Address to listen on"
    )]
    pub listen_address: String,

    // UDP listen port
    #[clap(
        long,
        default_value = settings::DEFAULT_PORT_UDP,
        env("PEERSTER_LISTEN_PORT"),
        help = "UDP port to bind to"
    )]
    pub listen_port: u16,

    // Origin identity
    #[clap(
        long,
        env("PEERSTER_NAME"),
        help = "Origin name of this peer (default: <listen-address>:<port>)"
    )]
    pub name: Option<String>,

    // Initial neighbors
    #[clap(
        long,
        env("PEERSTER_PEERS"),
        value_delimiter = ',',
        help = "Neighbor addresses as host:port (e.g., 127.0.0.1:45001,node2:45000)"
    )]
    pub peers: Vec<String>,

    // Paxos participant set
    #[clap(
        long,
        env("PEERSTER_PARTICIPANTS"),
        value_delimiter = ',',
        help = "Origin names taking part in consensus (this peer is always included)"
    )]
    pub participants: Vec<String>,

    // Leaf mode
    #[clap(
        long,
        default_value_t = false,
        env("PEERSTER_NOFORWARD"),
        help = "Never relay rumors originated by other peers"
    )]
    pub noforward: bool,
}

impl Cli {
    pub fn into_settings(self) -> Result<settings::Settings> {
        let peers = self
            .peers
            .iter()
            .map(|peer| resolve_peer(peer))
            .collect::<Result<Vec<SocketAddr>>>()?;

        Ok(settings::Settings {
            listen_address: self.listen_address,
            listen_port: self.listen_port,
            node_name: self.name,
            peers,
            participants: self.participants,
            noforward: self.noforward,
            timings: settings::GossipTimings::default(),
        })
    }
}

/// Resolve a `host:port` neighbor specification to its first address
pub fn resolve_peer(peer: &str) -> Result<SocketAddr> {
    peer.to_socket_addrs()
        .map_err(|e| config_error!("Cannot resolve peer {}: {}", peer, e))?
        .next()
        .ok_or_else(|| config_error!("Peer {} resolved to no address", peer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::parse_from(["peerster"]);
        assert_eq!(cli.listen_port, settings::STANDARD_PORT_UDP);
        assert!(cli.peers.is_empty());
        assert!(!cli.noforward);
    }

    #[test]
    fn test_into_settings_resolves_peers() {
        let cli = Cli::parse_from([
            "peerster",
            "--listen-port",
            "45010",
            "--peers",
            "127.0.0.1:45011,127.0.0.1:45012",
            "--participants",
            "a,b,c",
            "--noforward",
        ]);
        let settings = cli.into_settings().unwrap();
        assert_eq!(settings.listen_port, 45010);
        assert_eq!(settings.peers.len(), 2);
        assert_eq!(settings.peers[0], "127.0.0.1:45011".parse().unwrap());
        assert_eq!(settings.participants, vec!["a", "b", "c"]);
        assert!(settings.noforward);
    }

    #[test]
    fn test_unresolvable_peer_is_config_error() {
        let err = resolve_peer("missing-port").unwrap_err();
        assert_eq!(err.error_type(), "configuration_error");
    }
}
