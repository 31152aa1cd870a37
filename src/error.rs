use std::fmt;

/// Main error type for a Peerster node
#[derive(Debug)]
pub enum PeersterError {
    /// Configuration or CLI argument errors
    Config(String),

    /// Gossip protocol errors
    Gossip(GossipError),

    /// Consensus errors
    Paxos(PaxosError),

    /// System I/O errors
    Io(std::io::Error),

    /// Transport layer errors
    Transport(String),

    /// Serialization/deserialization errors
    Serialization(SerializationError),

    /// The node task has gone away
    Node(String),
}

/// Gossip protocol specific errors
#[derive(Debug)]
pub enum GossipError {
    /// A self-originated rumor failed local acceptance: the vector clock entry
    /// for our own origin no longer matches the local sequence counter.
    LocalClock {
        origin: String,
        sequence: u32,
        expected: u32,
    },
}

/// Consensus specific errors
#[derive(Debug)]
pub enum PaxosError {
    /// The participant set is empty
    NoParticipants,

    /// This node is not in its own participant set
    NotAParticipant(String),
}

/// Serialization related errors
#[derive(Debug)]
pub enum SerializationError {
    /// JSON serialization/deserialization errors
    Json(serde_json::Error),
}

impl fmt::Display for PeersterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeersterError::Config(msg) => write!(f, "Configuration error: {}", msg),
            PeersterError::Gossip(err) => write!(f, "Gossip error: {}", err),
            PeersterError::Paxos(err) => write!(f, "Paxos error: {}", err),
            PeersterError::Io(err) => write!(f, "I/O error: {}", err),
            PeersterError::Transport(msg) => write!(f, "Transport error: {}", msg),
            PeersterError::Serialization(err) => write!(f, "Serialization error: {}", err),
            PeersterError::Node(msg) => write!(f, "Node error: {}", msg),
        }
    }
}

impl fmt::Display for GossipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GossipError::LocalClock {
                origin,
                sequence,
                expected,
            } => write!(
                f,
                "Local clock: own rumor {}#{} rejected, clock expects {}",
                origin, sequence, expected
            ),
        }
    }
}

impl fmt::Display for PaxosError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaxosError::NoParticipants => write!(f, "participant set is empty"),
            PaxosError::NotAParticipant(me) => {
                write!(f, "{} is not listed among the participants", me)
            }
        }
    }
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializationError::Json(err) => write!(f, "JSON: {}", err),
        }
    }
}

impl std::error::Error for PeersterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PeersterError::Io(err) => Some(err),
            PeersterError::Gossip(err) => Some(err),
            PeersterError::Paxos(err) => Some(err),
            PeersterError::Serialization(SerializationError::Json(err)) => Some(err),
            _ => None,
        }
    }
}

impl std::error::Error for GossipError {}
impl std::error::Error for PaxosError {}
impl std::error::Error for SerializationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SerializationError::Json(err) => Some(err),
        }
    }
}

// Convenient type alias for Results using our error type
pub type Result<T> = std::result::Result<T, PeersterError>;

impl PeersterError {
    /// Get the error type identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            PeersterError::Config(_) => "configuration_error",
            PeersterError::Gossip(_) => "gossip_error",
            PeersterError::Paxos(_) => "paxos_error",
            PeersterError::Io(_) => "io_error",
            PeersterError::Transport(_) => "transport_error",
            PeersterError::Serialization(_) => "serialization_error",
            PeersterError::Node(_) => "node_error",
        }
    }
}

// Conversions from common error types
impl From<std::io::Error> for PeersterError {
    fn from(err: std::io::Error) -> Self {
        PeersterError::Io(err)
    }
}

impl From<serde_json::Error> for PeersterError {
    fn from(err: serde_json::Error) -> Self {
        PeersterError::Serialization(SerializationError::Json(err))
    }
}

impl From<GossipError> for PeersterError {
    fn from(err: GossipError) -> Self {
        PeersterError::Gossip(err)
    }
}

impl From<PaxosError> for PeersterError {
    fn from(err: PaxosError) -> Self {
        PeersterError::Paxos(err)
    }
}

impl From<SerializationError> for PeersterError {
    fn from(err: SerializationError) -> Self {
        PeersterError::Serialization(err)
    }
}

// Helper macros for common error construction patterns
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::PeersterError::Config($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::PeersterError::Config(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! transport_error {
    ($msg:expr) => {
        $crate::error::PeersterError::Transport($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::PeersterError::Transport(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! node_error {
    ($msg:expr) => {
        $crate::error::PeersterError::Node($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::PeersterError::Node(format!($fmt, $($arg)*))
    };
}
