pub mod cli;
pub mod error;
pub mod gossip;
pub mod messages;
pub mod node;
pub mod paxos;
pub mod routing;
pub mod settings;
pub mod transport;

pub use error::{PeersterError, Result};
pub use node::{Node, NodeEvent, NodeHandle, Origin};
