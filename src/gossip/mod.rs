//! Gossip layer: per-origin sequenced rumors spread by rumor mongering, with
//! periodic status exchanges repairing whatever the mongering missed.
pub mod engine;
pub mod message_log;
pub mod neighbors;
pub mod vector_clock;

pub use engine::{GossipEngine, HotRumor};
pub use message_log::MessageLog;
pub use neighbors::NeighborTable;
pub use vector_clock::VectorClock;
