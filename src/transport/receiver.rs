//! UDP Receiver
//!
//! Reads datagrams off the node's socket and hands them to the controller
//! over an unbounded channel.
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::TransportStats;

/// Largest datagram we will read
pub const MAX_DATAGRAM_SIZE: usize = 65536;

pub type Datagram = (Vec<u8>, SocketAddr);

pub struct UdpReceiver {
    socket: Arc<UdpSocket>,
    stats: Arc<TransportStats>,
}

impl UdpReceiver {
    pub fn new(socket: Arc<UdpSocket>, stats: Arc<TransportStats>) -> Self {
        Self { socket, stats }
    }

    /// Spawn the receive loop. It runs until the returned channel is dropped.
    pub fn start(self) -> mpsc::UnboundedReceiver<Datagram> {
        let (tx, rx) = mpsc::unbounded_channel();
        let socket = self.socket;
        let stats = self.stats;

        tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

            loop {
                match socket.recv_from(&mut buf).await {
                    Ok((len, addr)) => {
                        stats.messages_received.fetch_add(1, Ordering::Relaxed);
                        if tx.send((buf[..len].to_vec(), addr)).is_err() {
                            debug!("UDP receiver channel closed, exiting");
                            break;
                        }
                    }
                    Err(e) => {
                        // ICMP unreachable from a dead peer surfaces here on some
                        // platforms; keep receiving
                        stats.receive_errors.fetch_add(1, Ordering::Relaxed);
                        warn!("UDP receive error: {}", e);
                    }
                }
            }
        });

        rx
    }
}
