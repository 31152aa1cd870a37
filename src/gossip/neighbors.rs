use std::net::SocketAddr;

use indexmap::IndexSet;
use rand::Rng;

/// Known peer addresses, learned passively from inbound traffic.
///
/// Grows monotonically and never contains our own address. Kept in an
/// `IndexSet` so a uniformly random neighbor is one index draw.
#[derive(Clone, Debug)]
pub struct NeighborTable {
    local_addr: SocketAddr,
    peers: IndexSet<SocketAddr>,
}

impl NeighborTable {
    pub fn new(local_addr: SocketAddr) -> Self {
        Self {
            local_addr,
            peers: IndexSet::new(),
        }
    }

    /// Add `addr` if unseen. Returns true if the table grew.
    pub fn learn(&mut self, addr: SocketAddr) -> bool {
        if addr == self.local_addr {
            return false;
        }
        self.peers.insert(addr)
    }

    /// Uniformly random neighbor; a fresh draw on every call
    pub fn random<R: Rng>(&self, rng: &mut R) -> Option<SocketAddr> {
        if self.peers.is_empty() {
            return None;
        }
        let random_idx = rng.gen_range(0..self.peers.len());
        self.peers.get_index(random_idx).copied()
    }

    pub fn contains(&self, addr: &SocketAddr) -> bool {
        self.peers.contains(addr)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SocketAddr> {
        self.peers.iter()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
