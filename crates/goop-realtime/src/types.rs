use goop_group::Role;
use goop_transport::NodeId;
use serde_json::Value as Json;

/// A realtime channel descriptor (§3 Channel): a `rt-<hex>` group
/// backed 1:1 by a 2-member volatile group with app type `realtime`.
#[derive(Debug, Clone)]
pub struct Channel {
    pub id: String,
    pub remote: NodeId,
    pub role: Role,
    pub created_at_ms: u64,
}

/// Application-facing events a channel subscriber sees, filtered and
/// relabeled from the underlying [`goop_group::GroupEvent`] stream by
/// the forwarder (§4.I).
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    Message {
        channel_id: String,
        from: NodeId,
        payload: Json,
    },
    PeerLeft {
        channel_id: String,
    },
    Closed {
        channel_id: String,
    },
}
