//! Transport trait for the node controller.
use std::net::SocketAddr;

use async_trait::async_trait;

use crate::error::Result;

/// Fire-and-forget datagram sending
#[async_trait]
pub trait Sender: Send + Sync {
    /// Send one datagram to `target`
    async fn send_to(&self, target: SocketAddr, data: &[u8]) -> Result<()>;

    /// Address our datagrams come from, as peers see it
    fn local_addr(&self) -> SocketAddr;
}
