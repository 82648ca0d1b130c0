use async_trait::async_trait;
use goop_transport::NodeId;

/// Collaborator interface (§6 `PulseFn`): a rendezvous-directory-backed
/// side channel for asking a peer to run its own relay-refresh, used
/// when this node cannot reach the relay peer directly. Out of scope —
/// the core only ever calls through this trait, never implements it.
#[async_trait]
pub trait PulseFn: Send + Sync {
    async fn pulse(&self, peer_id: NodeId) -> Result<(), anyhow::Error>;
}
