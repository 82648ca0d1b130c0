use crate::NodeId;

/// Errors returned by the transport host.
///
/// `Display` strings line up with the wire-visible error kinds in the
/// spec's error-handling design where the transport produces one.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to bind endpoint: {0}")]
    Bind(#[source] anyhow::Error),

    #[error("connect-failed")]
    Connect {
        node_id: NodeId,
        #[source]
        source: anyhow::Error,
    },

    #[error("stream-open-failed")]
    StreamOpen {
        node_id: NodeId,
        #[source]
        source: anyhow::Error,
    },

    #[error("peer-unreachable")]
    PeerUnreachable { node_id: NodeId },

    #[error("receive failed: {0}")]
    Receive(#[source] anyhow::Error),

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("node is shut down")]
    Shutdown,

    #[error("invalid node id: {0}")]
    InvalidNodeId(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("identity key file error: {0}")]
    KeyFile(String),
}

impl From<anyhow::Error> for TransportError {
    fn from(e: anyhow::Error) -> Self {
        TransportError::Receive(e)
    }
}
