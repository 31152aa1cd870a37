//! UDP Transport Module
//!
//! One socket, bound once at startup, used for both directions: peers learn
//! our address from the source of the datagrams we send.

pub mod receiver;
pub mod traits;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UdpSocket;

use crate::error::Result;
use crate::transport_error;
pub use receiver::{Datagram, UdpReceiver, MAX_DATAGRAM_SIZE};
pub use traits::Sender;

/// Transport statistics
#[derive(Debug, Default)]
pub struct TransportStats {
    pub messages_sent: AtomicU64,
    pub send_errors: AtomicU64,
    pub messages_received: AtomicU64,
    pub receive_errors: AtomicU64,
}

#[derive(Clone, Debug)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    stats: Arc<TransportStats>,
}

impl UdpTransport {
    /// Bind the node's socket
    pub async fn bind(bind_addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| transport_error!("Failed to bind {}: {}", bind_addr, e))?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| transport_error!("Socket creation failed: {}", e))?;

        Ok(Self {
            socket: Arc::new(socket),
            local_addr,
            stats: Arc::new(TransportStats::default()),
        })
    }

    /// Receiver sharing this transport's socket
    pub fn receiver(&self) -> UdpReceiver {
        UdpReceiver::new(Arc::clone(&self.socket), Arc::clone(&self.stats))
    }

    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }
}

#[async_trait]
impl Sender for UdpTransport {
    async fn send_to(&self, target: SocketAddr, data: &[u8]) -> Result<()> {
        match self.socket.send_to(data, target).await {
            Ok(_) => {
                self.stats.messages_sent.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.stats.send_errors.fetch_add(1, Ordering::Relaxed);
                Err(transport_error!("Send to {} failed: {}", target, e))
            }
        }
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}
