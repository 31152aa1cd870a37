use std::borrow::Borrow;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Identity of a peer and of every message it authors.
///
/// Serialized as a bare string so it can key the `Want` map on the wire.
#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, PartialOrd, Ord, Eq, Hash,
)]
#[serde(transparent)]
pub struct Origin(String);

impl Origin {
    pub fn new(id: String) -> Self {
        Self(id)
    }

    /// Default identity for a node listening on `addr`
    pub fn from_socket_addr(addr: SocketAddr) -> Self {
        Self(format!("{}:{}", addr.ip(), addr.port()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Origin {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Origin {
    fn from(id: &str) -> Self {
        Origin::new(id.to_string())
    }
}

impl From<String> for Origin {
    fn from(id: String) -> Self {
        Origin::new(id)
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
