//! Goop2 transport host.
//!
//! Wraps QUIC connectivity (hole punching, circuit relay fallback,
//! transport-layer encryption) via `iroh` behind a stable API, and layers
//! a pubsub overlay via `iroh-gossip` for Presence. Every protocol tag in
//! the wire design (`/goop/content/1.0.0`, `/goop/site/1.0.0`, ...) is
//! registered as its own ALPN on a shared [`iroh::protocol::Router`], so a
//! single bound endpoint serves all of them behind one `NodeId`.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use goop_transport::{GoopNode, GoopNodeConfig, PROTOCOL_CONTENT};
//!
//! # async fn example() -> Result<(), goop_transport::TransportError> {
//! let node = GoopNode::bind(GoopNodeConfig::new()).await?;
//! println!("My ID: {}", node.id());
//!
//! let (mut send, mut recv) = node.open_stream(node.id(), PROTOCOL_CONTENT).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod error;
mod identity;
mod node;
mod path;
mod peerstore;
mod protocol;
mod time;

pub use config::{GoopNodeConfig, RelayInfo};
pub use error::TransportError;
pub use node::GoopNode;
pub use protocol::{read_framed, write_framed, IncomingStream};
pub use path::{CircuitEvent, PathEvent, PathKind};
pub use peerstore::{Peerstore, CIRCUIT_ADDR_TTL};
pub use time::now_ms;

// Re-export the gossip crate so downstream crates (Presence) don't need
// their own direct dependency version to stay in lockstep with ours.
pub use iroh_gossip;

use std::fmt;
use std::str::FromStr;

/// Every fixed protocol tag the dispatcher multiplexes over a single
/// endpoint, each negotiated as a distinct QUIC ALPN.
pub const PROTOCOL_CONTENT: &[u8] = b"/goop/content/1.0.0";
pub const PROTOCOL_SITE: &[u8] = b"/goop/site/1.0.0";
pub const PROTOCOL_AVATAR: &[u8] = b"/goop/avatar/1.0.0";
pub const PROTOCOL_DOCS: &[u8] = b"/goop/docs/1.0.0";
pub const PROTOCOL_DATA: &[u8] = b"/goop/data/1.0.0";
pub const PROTOCOL_CHAT: &[u8] = b"/goop/chat/1.0.0";
pub const PROTOCOL_GROUP: &[u8] = b"/goop/group/1.0.0";
pub const PROTOCOL_DIAG: &[u8] = b"/goop/diag/1.0.0";
pub const PROTOCOL_RELAY_REFRESH: &[u8] = b"/goop/relay-refresh/1.0.0";

/// All nine protocol tags, in registration order.
pub const ALL_PROTOCOLS: &[&[u8]] = &[
    PROTOCOL_CONTENT,
    PROTOCOL_SITE,
    PROTOCOL_AVATAR,
    PROTOCOL_DOCS,
    PROTOCOL_DATA,
    PROTOCOL_CHAT,
    PROTOCOL_GROUP,
    PROTOCOL_DIAG,
    PROTOCOL_RELAY_REFRESH,
];

/// Goop2 network identity — Ed25519 public key.
///
/// Wraps `iroh`'s `EndpointId`. Displayed and parsed as a hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(iroh::EndpointId);

impl NodeId {
    /// Wrap an `EndpointId`.
    pub fn from_endpoint_id(id: iroh::EndpointId) -> Self {
        Self(id)
    }

    /// Access the underlying `EndpointId`.
    pub fn as_endpoint_id(&self) -> &iroh::EndpointId {
        &self.0
    }

    /// The raw 32-byte public key.
    pub fn as_bytes(&self) -> [u8; 32] {
        *self.0.as_bytes()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.0.to_string();
        let short = if hex.len() > 12 { &hex[..12] } else { &hex };
        write!(f, "NodeId({short}...)")
    }
}

impl FromStr for NodeId {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: iroh::EndpointId = s
            .parse()
            .map_err(|_| TransportError::InvalidNodeId(s.to_string()))?;
        Ok(Self(id))
    }
}

impl serde::Serialize for NodeId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for NodeId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
