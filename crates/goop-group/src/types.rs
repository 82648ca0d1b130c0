use goop_transport::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Group message kinds (§4.H): `welcome | members | msg | leave | close
/// | invite | kick`, plus `join` — the act of opening a member stream,
/// which must itself be a wire message so the host knows which of its
/// hosted groups a freshly accepted `PROTOCOL_GROUP` stream belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeKind {
    Join,
    Welcome,
    Members,
    Msg,
    Leave,
    Close,
    Invite,
    Kick,
}

/// Wire envelope exchanged on every group stream (§4.H): `{group, type,
/// from, payload, ts}`. `from` is informational only — the host never
/// trusts it over the stream's verified peer identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub group: String,
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    pub from: String,
    pub payload: Json,
    pub ts: i64,
}

impl Envelope {
    pub fn new(group: &str, kind: EnvelopeKind, from: NodeId, payload: Json) -> Self {
        Self {
            group: group.to_string(),
            kind,
            from: from.to_string(),
            payload,
            ts: goop_transport::now_ms() as i64,
        }
    }
}

/// In-memory view of a group's identity, shared by host and member
/// records (§3 Group).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    pub id: String,
    pub name: String,
    pub app_type: String,
    pub max_members: i64,
    pub volatile: bool,
}

/// Role a local node plays with respect to one group (§3 Group: "a peer
/// is either host ... or member").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Member,
}

/// Observable group activity, fed to subscribers such as the Realtime
/// layer (§4.I: "Forwarder ... filters group events to subscribers").
#[derive(Debug, Clone)]
pub enum GroupEvent {
    Welcomed {
        group_id: String,
        app_type: String,
        members: Vec<NodeId>,
    },
    MemberJoined {
        group_id: String,
        peer: NodeId,
    },
    MemberLeft {
        group_id: String,
        peer: NodeId,
    },
    Message {
        group_id: String,
        from: NodeId,
        payload: Json,
    },
    Invited {
        group_id: String,
        name: String,
        app_type: String,
        from: NodeId,
    },
    Kicked {
        group_id: String,
    },
    Closed {
        group_id: String,
    },
    SubscriptionLost {
        group_id: String,
    },
}

/// `rt-<hex>` group id generator for Realtime channels (§3 Channel,
/// §4.I).
pub fn new_realtime_group_id() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 8];
    rand::rng().fill_bytes(&mut bytes);
    let mut hex = String::with_capacity(16);
    for b in bytes {
        hex.push_str(&format!("{b:02x}"));
    }
    format!("rt-{hex}")
}
