use crate::NodeId;
use std::time::Duration;

/// A relay peer supplied by the rendezvous directory (out of scope),
/// used to configure circuit-relay and hole punching.
#[derive(Debug, Clone)]
pub struct RelayInfo {
    pub relay_id: NodeId,
    pub addrs: Vec<String>,
    pub cleanup_delay: Duration,
    pub poll_deadline: Duration,
    pub connect_timeout: Duration,
    pub recovery_grace: Duration,
}

impl RelayInfo {
    pub fn new(relay_id: NodeId, addrs: Vec<String>) -> Self {
        Self {
            relay_id,
            addrs,
            cleanup_delay: Duration::from_secs(3),
            poll_deadline: Duration::from_secs(25),
            connect_timeout: Duration::from_secs(15),
            recovery_grace: Duration::from_secs(5),
        }
    }
}

/// Configuration for a [`GoopNode`](crate::GoopNode).
///
/// All fields have sensible defaults matching the timeout table in the
/// spec's concurrency section. Use the builder pattern:
///
/// ```rust
/// use goop_transport::GoopNodeConfig;
///
/// let config = GoopNodeConfig::new()
///     .max_message_size(2 * 1024 * 1024)
///     .recv_buffer(512);
/// ```
#[derive(Debug, Clone)]
pub struct GoopNodeConfig {
    /// Path to the persisted Ed25519 identity key file.
    pub(crate) key_path: std::path::PathBuf,
    /// Maximum incoming framed message size in bytes (site/docs/avatar bodies).
    pub(crate) max_message_size: usize,
    /// Channel buffer size for incoming messages.
    pub(crate) recv_buffer: usize,
    /// Relay configuration, if the rendezvous directory supplied one.
    pub(crate) relay: Option<RelayInfo>,
    /// Stream dial timeout (default 5s).
    pub(crate) dial_timeout: Duration,
    /// Minimum peerstore TTL for learned addresses (default 2 min).
    pub(crate) min_addr_ttl: Duration,
}

impl Default for GoopNodeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl GoopNodeConfig {
    /// Create a new config with defaults.
    pub fn new() -> Self {
        Self {
            key_path: std::path::PathBuf::from("./goop-identity.key"),
            max_message_size: 50 * 1024 * 1024, // matches the 50 MiB site body cap
            recv_buffer: 256,
            relay: None,
            dial_timeout: Duration::from_secs(5),
            min_addr_ttl: Duration::from_secs(120),
        }
    }

    /// Set the identity key file path (default: `./goop-identity.key`).
    pub fn key_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.key_path = path.into();
        self
    }

    /// Set maximum incoming message size (default: 50 MiB).
    pub fn max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    /// Set the channel buffer size for incoming messages (default: 256).
    pub fn recv_buffer(mut self, capacity: usize) -> Self {
        self.recv_buffer = capacity;
        self
    }

    /// Configure circuit-relay / hole punching against a known relay peer.
    pub fn relay(mut self, info: RelayInfo) -> Self {
        self.relay = Some(info);
        self
    }

    pub fn dial_timeout(mut self, d: Duration) -> Self {
        self.dial_timeout = d;
        self
    }
}
