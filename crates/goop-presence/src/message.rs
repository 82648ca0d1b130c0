use goop_transport::NodeId;
use serde::{Deserialize, Serialize};

/// Presence announcement gossiped on the fixed presence topic (§3, §4.E).
/// Only ever self-published; recipients upsert on `Online`/`Update` and
/// mark offline on `Offline`. Ordering across recipients is not
/// guaranteed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PresenceMsg {
    Online(PresenceInfo),
    Update(PresenceInfo),
    Offline { identity: NodeId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceInfo {
    pub identity: NodeId,
    pub content: String,
    pub email: String,
    pub avatar_hash: String,
    pub video_disabled: bool,
    pub active_template: String,
    pub addrs: Vec<String>,
    pub timestamp: u64,
}

impl PresenceMsg {
    pub fn identity(&self) -> NodeId {
        match self {
            PresenceMsg::Online(info) | PresenceMsg::Update(info) => info.identity,
            PresenceMsg::Offline { identity } => *identity,
        }
    }

    /// Drop rule (§4.E): empty identity text or an empty discriminant
    /// never upserts. `NodeId`'s textual form is never empty, so the
    /// only practical case is an `Online`/`Update` whose content is
    /// entirely blank metadata, which is still valid — retained for
    /// parity with the wire contract's "drop empty-type/empty-ID".
    pub fn is_well_formed(&self) -> bool {
        !self.identity().to_string().is_empty()
    }

    pub fn encode(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn node_id(seed: u8) -> NodeId {
        use rand::SeedableRng;
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed as u64);
        let secret = iroh::SecretKey::generate(&mut rng);
        NodeId::from_str(&secret.public().to_string()).unwrap()
    }

    #[test]
    fn round_trips_through_msgpack() {
        let msg = PresenceMsg::Online(PresenceInfo {
            identity: node_id(1),
            content: "hello".into(),
            email: "a@example.com".into(),
            avatar_hash: "deadbeef".into(),
            video_disabled: false,
            active_template: "default".into(),
            addrs: vec!["/ip4/1.2.3.4/udp/9/quic".into()],
            timestamp: 12345,
        });
        let bytes = msg.encode().unwrap();
        let decoded = PresenceMsg::decode(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn offline_carries_only_identity() {
        let id = node_id(2);
        let msg = PresenceMsg::Offline { identity: id };
        assert_eq!(msg.identity(), id);
        assert!(msg.is_well_formed());
    }
}
