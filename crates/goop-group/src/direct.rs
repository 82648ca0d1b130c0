use async_trait::async_trait;
use goop_transport::NodeId;
use serde_json::Value as Json;

/// Collaborator interface (§6 `DirectSender`): an out-of-scope side
/// channel (e.g. a push notification relay) for delivering content to a
/// peer this node cannot currently open a stream to. The core only
/// calls through this trait, never implements it.
#[async_trait]
pub trait DirectSender: Send + Sync {
    async fn send_direct(&self, to_peer_id: NodeId, content: Json) -> Result<(), anyhow::Error>;
}
