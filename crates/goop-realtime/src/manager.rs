use std::collections::HashMap;
use std::sync::Arc;

use goop_group::{GroupEvent, GroupManager, Role};
use goop_transport::{now_ms, GoopNode, NodeId};
use serde_json::Value as Json;
use tokio::sync::{broadcast, RwLock};

use crate::error::{RealtimeError, RealtimeResult};
use crate::types::{Channel, ChannelEvent};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Realtime Channels (§4.I): a thin two-peer wrapper over
/// [`GroupManager`]. Every channel is a `rt-`-prefixed, 2-cap, volatile
/// group; this layer only tracks which of those groups are channels,
/// which role the local node plays in each, and relabels the group
/// event stream into [`ChannelEvent`]s.
///
/// Holds no direct reference to the Group Manager's internal map (§9:
/// "never holds direct references to Group's internal map") — only the
/// public API and its broadcast event channel.
pub struct RealtimeManager {
    local_id: NodeId,
    group: Arc<GroupManager>,
    channels: RwLock<HashMap<String, Channel>>,
    events_tx: broadcast::Sender<ChannelEvent>,
}

impl RealtimeManager {
    /// Construct the manager and spawn its forwarder task, which
    /// subscribes to the Group Manager's event stream for the lifetime
    /// of the returned handle.
    pub fn new(local_id: NodeId, group: Arc<GroupManager>) -> Arc<Self> {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let manager = Arc::new(Self {
            local_id,
            group: group.clone(),
            channels: RwLock::new(HashMap::new()),
            events_tx,
        });
        manager.clone().spawn_forwarder();
        manager
    }

    /// Filters the Group Manager's global event stream down to channels
    /// this manager knows about, skipping self-originated messages on
    /// the host side (§4.I: host-broadcast echoes a `Message` event with
    /// `from == local_id` back to the caller; a realtime participant
    /// must never see its own outgoing message as an incoming one).
    fn spawn_forwarder(self: Arc<Self>) {
        let mut events = self.group.subscribe_events();
        tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(e) => e,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                self.forward(event).await;
            }
        });
    }

    async fn forward(&self, event: GroupEvent) {
        match event {
            GroupEvent::Message { group_id, from, payload } => {
                let Some(channel) = self.channels.read().await.get(&group_id).cloned() else {
                    return;
                };
                if channel.role == Role::Host && from == self.local_id {
                    return;
                }
                self.emit(ChannelEvent::Message {
                    channel_id: group_id,
                    from,
                    payload,
                });
            }
            GroupEvent::MemberLeft { group_id, .. } | GroupEvent::SubscriptionLost { group_id } => {
                if self.channels.read().await.contains_key(&group_id) {
                    self.emit(ChannelEvent::PeerLeft { channel_id: group_id });
                }
            }
            GroupEvent::Closed { group_id } | GroupEvent::Kicked { group_id } => {
                if self.channels.write().await.remove(&group_id).is_some() {
                    self.emit(ChannelEvent::Closed { channel_id: group_id });
                }
            }
            _ => {}
        }
    }

    fn emit(&self, event: ChannelEvent) {
        let _ = self.events_tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events_tx.subscribe()
    }

    pub async fn channel(&self, id: &str) -> Option<Channel> {
        self.channels.read().await.get(id).cloned()
    }

    /// `CreateChannel(remote)` (§4.I): create a 2-cap volatile
    /// `realtime` group (the Group Manager assigns it the `rt-<hex>`
    /// id), register the local side as host, and invite `remote`.
    pub async fn create_channel(
        &self,
        node: &GoopNode,
        remote: NodeId,
    ) -> RealtimeResult<Channel> {
        let group_id = self.group.create_group("realtime", "realtime", 2, true).await?;
        let channel = Channel {
            id: group_id.clone(),
            remote,
            role: Role::Host,
            created_at_ms: now_ms(),
        };
        self.channels.write().await.insert(group_id.clone(), channel.clone());

        if let Err(e) = self.group.invite(node, &group_id, remote).await {
            self.channels.write().await.remove(&group_id);
            return Err(e.into());
        }
        Ok(channel)
    }

    /// `AcceptChannel(id, host)` (§4.I): join the remote-hosted group
    /// and register the local side as guest.
    pub async fn accept_channel(
        self: &Arc<Self>,
        node: Arc<GoopNode>,
        group_id: &str,
        host: NodeId,
    ) -> RealtimeResult<Channel> {
        self.group
            .join(node, host, group_id, "realtime", "realtime", 2, true)
            .await?;
        let channel = Channel {
            id: group_id.to_string(),
            remote: host,
            role: Role::Member,
            created_at_ms: now_ms(),
        };
        self.channels.write().await.insert(group_id.to_string(), channel.clone());
        Ok(channel)
    }

    /// `Send(id, payload)` (§4.I): host-relay broadcast if this node is
    /// host, member send otherwise.
    pub async fn send(&self, channel_id: &str, payload: Json) -> RealtimeResult<()> {
        let channel = self
            .channels
            .read()
            .await
            .get(channel_id)
            .cloned()
            .ok_or(RealtimeError::NotFound)?;
        match channel.role {
            Role::Host => self.group.host_broadcast(channel_id, payload).await?,
            Role::Member => self.group.member_send(channel_id, payload).await?,
        }
        Ok(())
    }

    /// `Close(id)` (§4.I): idempotent. Host closes the group; guest
    /// leaves it. A second call on an already-closed channel returns
    /// success without emitting another close.
    pub async fn close(&self, channel_id: &str) -> RealtimeResult<()> {
        let Some(channel) = self.channels.write().await.remove(channel_id) else {
            return Ok(());
        };
        match channel.role {
            Role::Host => self.group.close_group(channel_id).await?,
            Role::Member => self.group.leave(channel_id).await?,
        }
        self.emit(ChannelEvent::Closed {
            channel_id: channel_id.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goop_store::Store;

    fn node_id(seed: u8) -> NodeId {
        use rand::SeedableRng;
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed as u64);
        let secret = iroh::SecretKey::generate(&mut rng);
        secret.public().to_string().parse().unwrap()
    }

    fn realtime() -> Arc<RealtimeManager> {
        let local = node_id(1);
        let store = Arc::new(Store::open_in_memory().unwrap());
        let group = Arc::new(GroupManager::new(local, store).unwrap());
        RealtimeManager::new(local, group)
    }

    #[tokio::test]
    async fn close_is_idempotent_for_unknown_channel() {
        let rt = realtime();
        rt.close("rt-doesnotexist").await.unwrap();
        rt.close("rt-doesnotexist").await.unwrap();
    }

    #[tokio::test]
    async fn send_on_unknown_channel_errors_not_found() {
        let rt = realtime();
        let err = rt.send("rt-nope", serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, RealtimeError::NotFound));
    }

    #[tokio::test]
    async fn close_second_call_is_a_noop_after_first_removes_it() {
        let rt = realtime();
        // Manually register a host-side channel without a real peer
        // connection, since close() on the host path only needs the
        // Group Manager's in-memory hosted-group record.
        let gid = rt.group.create_group("Call", "realtime", 2, true).await.unwrap();
        rt.channels.write().await.insert(
            gid.clone(),
            Channel {
                id: gid.clone(),
                remote: node_id(2),
                role: Role::Host,
                created_at_ms: now_ms(),
            },
        );

        let mut events = rt.subscribe();
        rt.close(&gid).await.unwrap();
        rt.close(&gid).await.unwrap();

        let event = tokio::time::timeout(std::time::Duration::from_millis(100), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, ChannelEvent::Closed { .. }));
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(50), events.recv())
                .await
                .is_err(),
            "second close() must not emit a second Closed event"
        );
    }
}
