//! Gossip presence publish/subscribe (§4.E).
//!
//! Publishes [`PresenceMsg`] on the fixed `goop.presence.v1` topic and
//! feeds inbound announcements into the [`PeerTable`], learning
//! addresses into the shared peerstore along the way. Only ever
//! publishes messages about `self`; every inbound message is someone
//! else's self-announcement.

mod error;
mod message;

pub use error::PresenceError;
pub use message::{PresenceInfo, PresenceMsg};

use std::sync::Arc;
use std::time::Duration;

use goop_peertable::{PeerTable, PeerUpdate};
use goop_transport::iroh_gossip::api::Event as GossipEvent;
use goop_transport::iroh_gossip::TopicId;
use goop_transport::{GoopNode, NodeId, Peerstore, RelayInfo};
use n0_future::StreamExt;
use tokio::sync::mpsc;

/// Fixed ASCII presence topic shared by every node (§6), padded with
/// zero bytes to the 32-byte topic ID the gossip overlay requires.
const fn presence_topic_bytes() -> [u8; 32] {
    let name = b"goop.presence.v1";
    let mut buf = [0u8; 32];
    let mut i = 0;
    while i < name.len() {
        buf[i] = name[i];
        i += 1;
    }
    buf
}

pub const PRESENCE_TOPIC: [u8; 32] = presence_topic_bytes();

/// Floor TTL for addresses learned from presence (§4.E: "max(configured,
/// 2 minutes)").
pub const MIN_PRESENCE_ADDR_TTL: Duration = Duration::from_secs(120);

/// Drives presence publish/subscribe for one node. Cloneable — every
/// clone shares the same background task via the publish channel.
#[derive(Clone)]
pub struct PresenceManager {
    publish_tx: mpsc::Sender<PresenceMsg>,
}

impl PresenceManager {
    /// Join the fixed presence topic and spawn the background task that
    /// forwards outbound publishes and processes inbound announcements
    /// into `peer_table`.
    pub async fn spawn(
        node: Arc<GoopNode>,
        peer_table: Arc<PeerTable>,
        relay: Option<RelayInfo>,
    ) -> Result<Self, PresenceError> {
        let topic_id = TopicId::from_bytes(PRESENCE_TOPIC);
        let topic = node
            .gossip()
            .subscribe(topic_id, Vec::new())
            .await
            .map_err(|e| PresenceError::Join(e.into()))?;
        let (sender, mut receiver) = topic.split();

        let (publish_tx, mut publish_rx) = mpsc::channel::<PresenceMsg>(16);
        let self_id = node.id();
        let peerstore = node.peerstore().clone();
        let min_ttl = node.min_addr_ttl().max(MIN_PRESENCE_ADDR_TTL);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    outbound = publish_rx.recv() => {
                        let Some(msg) = outbound else { break };
                        match msg.encode() {
                            Ok(bytes) => {
                                if let Err(e) = sender.broadcast(bytes.into()).await {
                                    tracing::warn!(error = %e, "presence broadcast failed");
                                }
                            }
                            Err(e) => tracing::warn!(error = %e, "presence encode failed"),
                        }
                    }
                    inbound = receiver.next() => {
                        let Some(result) = inbound else { break };
                        match result {
                            Ok(GossipEvent::Received(received)) => {
                                match PresenceMsg::decode(&received.content) {
                                    Ok(msg) => apply_presence(msg, self_id, &peer_table, &peerstore, min_ttl, relay.as_ref()),
                                    Err(e) => tracing::debug!(error = %e, "dropping malformed presence message"),
                                }
                            }
                            Ok(GossipEvent::Lagged) => {
                                tracing::warn!("presence gossip receiver lagged, missed events");
                            }
                            Ok(_) => {}
                            Err(e) => tracing::debug!(error = %e, "presence gossip receive error"),
                        }
                    }
                }
            }
        });

        Ok(Self { publish_tx })
    }

    /// Publish a presence announcement about self.
    pub async fn publish(&self, msg: PresenceMsg) -> Result<(), PresenceError> {
        self.publish_tx
            .send(msg)
            .await
            .map_err(|_| PresenceError::Broadcast(anyhow::anyhow!("presence manager shut down")))
    }
}

/// Apply one inbound presence message to the peer table and peerstore
/// (§4.E). Drops self-originated and malformed messages, upserts on
/// `online`/`update`, marks offline on `offline`. Separated from the
/// gossip plumbing above so the upsert/address-learning logic is
/// directly unit-testable without a live transport.
fn apply_presence(
    msg: PresenceMsg,
    self_id: NodeId,
    peer_table: &PeerTable,
    peerstore: &Peerstore,
    min_addr_ttl: Duration,
    relay: Option<&RelayInfo>,
) {
    if msg.identity() == self_id {
        return;
    }
    if !msg.is_well_formed() {
        tracing::debug!("dropping presence message with empty identity");
        return;
    }

    match msg {
        PresenceMsg::Online(info) | PresenceMsg::Update(info) => {
            let identity = info.identity;
            peerstore.add_addrs(identity, info.addrs.clone(), min_addr_ttl);

            let has_circuit = info.addrs.iter().any(|a| a.ends_with("/p2p-circuit"));
            if !has_circuit {
                if let Some(relay) = relay {
                    peerstore.inject_circuit_addr(identity, relay.relay_id, &relay.addrs);
                }
            }
            peerstore.clear_backoff_hint(identity);

            peer_table.upsert(
                PeerUpdate {
                    identity,
                    content: info.content,
                    email: info.email,
                    avatar_hash: info.avatar_hash,
                    video_disabled: info.video_disabled,
                    active_template: info.active_template,
                    addrs: info.addrs,
                    last_seen: info.timestamp,
                },
                false,
            );
        }
        PresenceMsg::Offline { identity } => {
            peer_table.mark_offline(identity);
        }
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

    fn info(identity: NodeId, addrs: Vec<String>) -> PresenceInfo {
        PresenceInfo {
            identity,
            content: "hello".into(),
            email: "a@example.com".into(),
            avatar_hash: String::new(),
            video_disabled: false,
            active_template: "default".into(),
            addrs,
            timestamp: 1000,
        }
    }

    #[test]
    fn self_originated_messages_are_dropped() {
        let table = PeerTable::new();
        let store = Peerstore::new();
        let me = node_id(1);
        apply_presence(
            PresenceMsg::Online(info(me, vec!["1.2.3.4:1".into()])),
            me,
            &table,
            &store,
            MIN_PRESENCE_ADDR_TTL,
            None,
        );
        assert!(table.get(&me).is_none());
    }

    #[test]
    fn online_upserts_and_learns_addresses() {
        let table = PeerTable::new();
        let store = Peerstore::new();
        let me = node_id(1);
        let peer = node_id(2);
        apply_presence(
            PresenceMsg::Online(info(peer, vec!["/ip4/1.2.3.4/udp/9/quic".into()])),
            me,
            &table,
            &store,
            MIN_PRESENCE_ADDR_TTL,
            None,
        );
        assert!(table.get(&peer).is_some());
        assert_eq!(store.addrs(&peer), vec!["/ip4/1.2.3.4/udp/9/quic".to_string()]);
        assert!(store.backoff_was_cleared(&peer));
    }

    #[test]
    fn offline_marks_offline_without_removing() {
        let table = PeerTable::new();
        let store = Peerstore::new();
        let me = node_id(1);
        let peer = node_id(2);
        apply_presence(
            PresenceMsg::Online(info(peer, vec![])),
            me,
            &table,
            &store,
            MIN_PRESENCE_ADDR_TTL,
            None,
        );
        apply_presence(
            PresenceMsg::Offline { identity: peer },
            me,
            &table,
            &store,
            MIN_PRESENCE_ADDR_TTL,
            None,
        );
        let record = table.get(&peer).unwrap();
        assert!(!record.reachable);
        assert!(record.offline_since.is_some());
    }

    #[test]
    fn injects_circuit_address_when_no_direct_addr_and_relay_known() {
        let table = PeerTable::new();
        let store = Peerstore::new();
        let me = node_id(1);
        let peer = node_id(2);
        let relay_id = node_id(3);
        let relay = RelayInfo::new(relay_id, vec!["/ip4/9.9.9.9/udp/1/quic".into()]);

        apply_presence(
            PresenceMsg::Online(info(peer, vec!["/ip4/1.2.3.4/udp/9/quic".into()])),
            me,
            &table,
            &store,
            MIN_PRESENCE_ADDR_TTL,
            Some(&relay),
        );
        assert!(store.has_circuit_addr(&peer));
    }
}
