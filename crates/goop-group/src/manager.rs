use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use goop_store::{GroupRecord, GroupSubscription, Store};
use goop_transport::{read_framed, write_framed, GoopNode, IncomingStream, NodeId, PROTOCOL_GROUP};
use serde_json::Value as Json;
use tokio::sync::{broadcast, mpsc, RwLock};

use crate::direct::DirectSender;
use crate::error::{GroupError, GroupResult};
use crate::types::{Envelope, EnvelopeKind, GroupEvent, GroupInfo};

const MAX_GROUP_FRAME: usize = 256 * 1024;
const SEND_TIMEOUT: Duration = Duration::from_secs(30);
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A live writer task's mailbox plus the member's identity, held by a
/// hosted group for as long as its stream stays up.
struct MemberLink {
    tx: mpsc::Sender<Envelope>,
}

/// Host-side state for one group this node owns the authoritative
/// record for (§4.H host responsibilities).
struct HostedGroup {
    info: GroupInfo,
    members: HashMap<NodeId, MemberLink>,
}

/// Member-side state for one group hosted elsewhere this node has
/// joined (§3 Subscription, §4.H member responsibilities).
struct SubscriptionState {
    host: NodeId,
    info: GroupInfo,
    members: Vec<NodeId>,
    tx: Option<mpsc::Sender<Envelope>>,
    active: bool,
}

/// Group Manager (§4.H): maintains every group this node hosts or has
/// joined, multiplexing all of it over persistent streams on
/// [`PROTOCOL_GROUP`]. A pure decision core would not fit here the way
/// it does for the Relay Controller — membership fan-out is inherently
/// an I/O-bound broadcast over live streams — so host and member state
/// machines are expressed directly against real senders, each one
/// backed by its own writer task enforcing the 30-second send timeout.
pub struct GroupManager {
    local_id: NodeId,
    store: Arc<Store>,
    hosted: RwLock<HashMap<String, HostedGroup>>,
    subscriptions: RwLock<HashMap<String, SubscriptionState>>,
    events_tx: broadcast::Sender<GroupEvent>,
    direct: Option<Arc<dyn DirectSender>>,
}

impl GroupManager {
    /// Construct the manager, purging stale `rt-` records left over from
    /// an unclean shutdown (§3 Channel, EXPANSION D.6) and loading
    /// persisted hosted groups and subscriptions into memory. Streams are
    /// not reopened here — call [`GroupManager::resume_subscriptions`]
    /// once a bound [`GoopNode`] is available.
    pub fn new(local_id: NodeId, store: Arc<Store>) -> GroupResult<Self> {
        let purged = store.purge_stale_realtime_groups()?;
        if purged > 0 {
            tracing::info!(purged, "purged stale realtime group records on start");
        }

        let mut hosted = HashMap::new();
        for record in store.list_groups()? {
            if !record.host_joined {
                continue;
            }
            hosted.insert(
                record.id.clone(),
                HostedGroup {
                    info: group_info_from_record(&record),
                    members: HashMap::new(),
                },
            );
        }

        let mut subscriptions = HashMap::new();
        for sub in store.list_subscriptions()? {
            let host: NodeId = match sub.host_peer_id.parse() {
                Ok(id) => id,
                Err(_) => continue,
            };
            let members = store.group_members(&sub.group_id).unwrap_or_default();
            let members = members.into_iter().filter_map(|p| p.parse().ok()).collect();
            subscriptions.insert(
                sub.group_id.clone(),
                SubscriptionState {
                    host,
                    info: group_info_from_subscription(&sub),
                    members,
                    tx: None,
                    active: false,
                },
            );
        }

        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            local_id,
            store,
            hosted: RwLock::new(hosted),
            subscriptions: RwLock::new(subscriptions),
            events_tx,
            direct: None,
        })
    }

    /// Attach the §6 `DirectSender` collaborator, used as a fallback
    /// delivery path for invites when the target can't be dialed
    /// directly.
    pub fn with_direct_sender(mut self, direct: Arc<dyn DirectSender>) -> Self {
        self.direct = Some(direct);
        self
    }

    /// Reopen a persistent stream to every group this node is subscribed
    /// to (EXPANSION D.5 — subscriptions survive restart and resume on
    /// start). Failures are logged and leave the subscription inactive;
    /// the UI can still see it and retry via [`GroupManager::rejoin`].
    pub async fn resume_subscriptions(self: &Arc<Self>, node: Arc<GoopNode>) {
        let hosts: Vec<(String, NodeId)> = {
            let subs = self.subscriptions.read().await;
            subs.iter().map(|(gid, s)| (gid.clone(), s.host)).collect()
        };
        for (group_id, host) in hosts {
            if let Err(e) = self.rejoin(node.clone(), &group_id, host).await {
                tracing::warn!(group = %group_id, error = %e, "failed to resume group subscription");
            }
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<GroupEvent> {
        self.events_tx.subscribe()
    }

    fn emit(&self, event: GroupEvent) {
        let _ = self.events_tx.send(event);
    }

    // ── Host-side API ────────────────────────────────────────────────

    /// Create a new hosted group (§4.H, §3 Group). `app_type` is opaque
    /// to the manager; Realtime channels use `"realtime"`.
    pub async fn create_group(
        &self,
        name: &str,
        app_type: &str,
        max_members: i64,
        volatile: bool,
    ) -> GroupResult<String> {
        let id = if app_type == "realtime" {
            crate::types::new_realtime_group_id()
        } else {
            format!("grp-{}", uuid_like())
        };

        let record = GroupRecord {
            id: id.clone(),
            name: name.to_string(),
            app_type: app_type.to_string(),
            max_members,
            volatile,
            host_joined: true,
        };
        self.store.upsert_group(&record)?;

        let mut hosted = self.hosted.write().await;
        hosted.insert(
            id.clone(),
            HostedGroup {
                info: group_info_from_record(&record),
                members: HashMap::new(),
            },
        );
        Ok(id)
    }

    /// Send a best-effort one-shot invitation (§4.H: "Invites are
    /// best-effort one-shot streams"). Falls back to the §6
    /// `DirectSender` side channel, if one is configured, when the peer
    /// can't be dialed directly.
    pub async fn invite(&self, node: &GoopNode, group_id: &str, peer: NodeId) -> GroupResult<()> {
        let info = {
            let hosted = self.hosted.read().await;
            hosted
                .get(group_id)
                .map(|g| g.info.clone())
                .ok_or(GroupError::NotFound)?
        };

        let payload = serde_json::json!({
            "name": info.name,
            "app_type": info.app_type,
            "max_members": info.max_members,
        });
        let envelope = Envelope::new(group_id, EnvelopeKind::Invite, self.local_id, payload);

        match node.open_stream(peer, PROTOCOL_GROUP).await {
            Ok((mut send, _recv)) => {
                let body = serde_json::to_vec(&envelope).unwrap_or_default();
                let _ = tokio::time::timeout(SEND_TIMEOUT, write_framed(&mut send, &body)).await;
                Ok(())
            }
            Err(e) => {
                let Some(direct) = &self.direct else {
                    return Err(GroupError::ConnectFailed(e.into()));
                };
                direct
                    .send_direct(peer, envelope.payload.clone())
                    .await
                    .map_err(GroupError::ConnectFailed)
            }
        }
    }

    /// Host-side admin action: remove a member and notify it (§4.H,
    /// grounded on the teacher's `kick_member` pattern).
    pub async fn kick(&self, group_id: &str, target: NodeId) -> GroupResult<()> {
        let link = {
            let mut hosted = self.hosted.write().await;
            let group = hosted.get_mut(group_id).ok_or(GroupError::NotFound)?;
            group.members.remove(&target)
        };
        self.persist_members(group_id).await?;

        if let Some(link) = link {
            let envelope = Envelope::new(group_id, EnvelopeKind::Kick, self.local_id, Json::Null);
            let _ = link.tx.send(envelope).await;
        }
        self.broadcast_members(group_id).await;
        Ok(())
    }

    /// Host-side close: notify every member, drop the record if volatile
    /// (§4.H).
    pub async fn close_group(&self, group_id: &str) -> GroupResult<()> {
        let group = {
            let mut hosted = self.hosted.write().await;
            hosted.remove(group_id).ok_or(GroupError::NotFound)?
        };

        let envelope = Envelope::new(group_id, EnvelopeKind::Close, self.local_id, Json::Null);
        for link in group.members.values() {
            let _ = link.tx.send(envelope.clone()).await;
        }

        if group.info.volatile {
            self.store.delete_group(group_id)?;
        } else if let Some(mut record) = self.store.group(group_id)? {
            record.host_joined = false;
            self.store.upsert_group(&record)?;
        }
        Ok(())
    }

    /// Broadcast an application payload to every member of a hosted
    /// group. No echo is possible here since hosted member links never
    /// include the host itself.
    pub async fn host_broadcast(&self, group_id: &str, payload: Json) -> GroupResult<()> {
        let senders: Vec<mpsc::Sender<Envelope>> = {
            let hosted = self.hosted.read().await;
            let group = hosted.get(group_id).ok_or(GroupError::NotFound)?;
            group.members.values().map(|l| l.tx.clone()).collect()
        };
        let envelope = Envelope::new(group_id, EnvelopeKind::Msg, self.local_id, payload);
        for tx in senders {
            let _ = tx.send(envelope.clone()).await;
        }
        self.emit(GroupEvent::Message {
            group_id: group_id.to_string(),
            from: self.local_id,
            payload: envelope.payload,
        });
        Ok(())
    }

    pub async fn is_host(&self, group_id: &str) -> bool {
        self.hosted.read().await.contains_key(group_id)
    }

    pub async fn is_member(&self, peer: NodeId, group_id: &str) -> bool {
        if let Some(group) = self.hosted.read().await.get(group_id) {
            return group.members.contains_key(&peer) || peer == self.local_id;
        }
        false
    }

    /// Accept a freshly opened `PROTOCOL_GROUP` stream, whichever role it
    /// turns out to be for (§4.H). The caller (the node's accept loop)
    /// routes both `group` and `chat` tags here unexamined.
    pub async fn handle_incoming_stream(self: &Arc<Self>, incoming: IncomingStream) {
        let manager = self.clone();
        tokio::spawn(async move {
            if let Err(e) = manager.accept_member_stream(incoming).await {
                tracing::warn!(error = %e, "group stream handling failed");
            }
        });
    }

    async fn accept_member_stream(self: &Arc<Self>, mut incoming: IncomingStream) -> GroupResult<()> {
        let frame = read_framed(&mut incoming.recv, MAX_GROUP_FRAME).await?;
        let envelope: Envelope =
            serde_json::from_slice(&frame).map_err(|_| GroupError::AccessDenied)?;
        if envelope.kind != EnvelopeKind::Join {
            return Err(GroupError::AccessDenied);
        }

        let peer = incoming.peer;
        let group_id = envelope.group.clone();

        {
            let hosted = self.hosted.read().await;
            let group = hosted.get(&group_id).ok_or(GroupError::NotFound)?;
            if group.info.max_members > 0 && group.members.len() as i64 >= group.info.max_members {
                return Err(GroupError::GroupFull);
            }
        }

        let (tx, rx) = mpsc::channel(32);
        {
            let mut hosted = self.hosted.write().await;
            let group = hosted.get_mut(&group_id).ok_or(GroupError::NotFound)?;
            group.members.insert(peer, MemberLink { tx: tx.clone() });
        }
        self.persist_members(&group_id).await?;

        spawn_writer(incoming.send, rx);

        let (welcome_members, info) = {
            let hosted = self.hosted.read().await;
            let group = hosted.get(&group_id).ok_or(GroupError::NotFound)?;
            let mut members: Vec<String> = group.members.keys().map(|p| p.to_string()).collect();
            members.push(self.local_id.to_string());
            (members, group.info.clone())
        };
        let welcome_payload = serde_json::json!({
            "members": welcome_members,
            "app_type": info.app_type,
            "name": info.name,
            "max_members": info.max_members,
        });
        let welcome = Envelope::new(&group_id, EnvelopeKind::Welcome, self.local_id, welcome_payload);
        let _ = tx.send(welcome).await;

        self.emit(GroupEvent::MemberJoined {
            group_id: group_id.clone(),
            peer,
        });
        self.broadcast_members(&group_id).await;

        self.read_member_loop(incoming.recv, group_id, peer).await;
        Ok(())
    }

    async fn read_member_loop(
        self: &Arc<Self>,
        mut recv: iroh::endpoint::RecvStream,
        group_id: String,
        peer: NodeId,
    ) {
        loop {
            let frame = match read_framed(&mut recv, MAX_GROUP_FRAME).await {
                Ok(f) => f,
                Err(_) => break,
            };
            let envelope: Envelope = match serde_json::from_slice(&frame) {
                Ok(e) => e,
                Err(_) => continue,
            };
            match envelope.kind {
                EnvelopeKind::Msg => {
                    self.relay_from_member(&group_id, peer, envelope.payload.clone()).await;
                    self.emit(GroupEvent::Message {
                        group_id: group_id.clone(),
                        from: peer,
                        payload: envelope.payload,
                    });
                }
                EnvelopeKind::Leave => break,
                _ => {}
            }
        }
        self.handle_member_departed(&group_id, peer).await;
    }

    async fn relay_from_member(&self, group_id: &str, from: NodeId, payload: Json) {
        let senders: Vec<mpsc::Sender<Envelope>> = {
            let hosted = self.hosted.read().await;
            let Some(group) = hosted.get(group_id) else {
                return;
            };
            group
                .members
                .iter()
                .filter(|(id, _)| **id != from)
                .map(|(_, l)| l.tx.clone())
                .collect()
        };
        let envelope = Envelope::new(group_id, EnvelopeKind::Msg, from, payload);
        for tx in senders {
            let _ = tx.send(envelope.clone()).await;
        }
    }

    async fn handle_member_departed(&self, group_id: &str, peer: NodeId) {
        {
            let mut hosted = self.hosted.write().await;
            if let Some(group) = hosted.get_mut(group_id) {
                group.members.remove(&peer);
            } else {
                return;
            }
        }
        let _ = self.persist_members(group_id).await;
        self.emit(GroupEvent::MemberLeft {
            group_id: group_id.to_string(),
            peer,
        });
        self.broadcast_members(group_id).await;
    }

    async fn broadcast_members(&self, group_id: &str) {
        let (senders, payload) = {
            let hosted = self.hosted.read().await;
            let Some(group) = hosted.get(group_id) else {
                return;
            };
            let mut members: Vec<String> = group.members.keys().map(|p| p.to_string()).collect();
            members.push(self.local_id.to_string());
            (
                group.members.values().map(|l| l.tx.clone()).collect::<Vec<_>>(),
                serde_json::json!({ "members": members }),
            )
        };
        let envelope = Envelope::new(group_id, EnvelopeKind::Members, self.local_id, payload);
        for tx in senders {
            let _ = tx.send(envelope.clone()).await;
        }
    }

    async fn persist_members(&self, group_id: &str) -> GroupResult<()> {
        let hosted = self.hosted.read().await;
        let Some(group) = hosted.get(group_id) else {
            return Ok(());
        };
        let ids: Vec<String> = group.members.keys().map(|p| p.to_string()).collect();
        self.store.set_group_members(group_id, &ids)?;
        Ok(())
    }

    // ── Member-side API ──────────────────────────────────────────────

    /// Join a group hosted by `host`, opening and keeping alive a
    /// persistent stream (§4.H). Used for both invite-accept and
    /// subscription-resume.
    pub async fn join(
        self: &Arc<Self>,
        node: Arc<GoopNode>,
        host: NodeId,
        group_id: &str,
        name: &str,
        app_type: &str,
        max_members: i64,
        volatile: bool,
    ) -> GroupResult<()> {
        let (mut send, recv) = node
            .open_stream(host, PROTOCOL_GROUP)
            .await
            .map_err(|e| match e {
                goop_transport::TransportError::PeerUnreachable { .. } => GroupError::PeerUnreachable,
                other => GroupError::ConnectFailed(other.into()),
            })?;

        let join_envelope = Envelope::new(group_id, EnvelopeKind::Join, self.local_id, Json::Null);
        let body = serde_json::to_vec(&join_envelope).unwrap_or_default();
        write_framed(&mut send, &body)
            .await
            .map_err(|e| GroupError::StreamOpenFailed(e))?;

        let (tx, rx) = mpsc::channel(32);
        spawn_writer(send, rx);

        let sub = GroupSubscription {
            host_peer_id: host.to_string(),
            group_id: group_id.to_string(),
            name: name.to_string(),
            app_type: app_type.to_string(),
            max_members,
            volatile,
            role: "member".to_string(),
        };
        self.store.upsert_subscription(&sub)?;

        {
            let mut subs = self.subscriptions.write().await;
            subs.insert(
                group_id.to_string(),
                SubscriptionState {
                    host,
                    info: group_info_from_subscription(&sub),
                    members: Vec::new(),
                    tx: Some(tx),
                    active: true,
                },
            );
        }

        let manager = self.clone();
        let gid = group_id.to_string();
        tokio::spawn(async move {
            manager.read_host_loop(recv, gid).await;
        });
        Ok(())
    }

    /// Resume a previously persisted subscription after restart
    /// (EXPANSION D.5).
    pub async fn rejoin(self: &Arc<Self>, node: Arc<GoopNode>, group_id: &str, host: NodeId) -> GroupResult<()> {
        let (name, app_type, max_members, volatile) = {
            let subs = self.subscriptions.read().await;
            let sub = subs.get(group_id).ok_or(GroupError::NotFound)?;
            (
                sub.info.name.clone(),
                sub.info.app_type.clone(),
                sub.info.max_members,
                sub.info.volatile,
            )
        };
        self.join(node, host, group_id, &name, &app_type, max_members, volatile).await
    }

    /// Voluntary leave (§4.H, §4.I `Close`: "guest→leave group").
    pub async fn leave(&self, group_id: &str) -> GroupResult<()> {
        let removed = self.subscriptions.write().await.remove(group_id);
        let Some(sub) = removed else {
            return Ok(());
        };
        if let Some(tx) = sub.tx {
            let envelope = Envelope::new(group_id, EnvelopeKind::Leave, self.local_id, Json::Null);
            let _ = tx.send(envelope).await;
        }
        self.store.delete_subscription(&sub.host.to_string(), group_id)?;
        Ok(())
    }

    /// Send an application payload as a member (§4.I `Send`: "via member
    /// send").
    pub async fn member_send(&self, group_id: &str, payload: Json) -> GroupResult<()> {
        let tx = {
            let subs = self.subscriptions.read().await;
            subs.get(group_id).and_then(|s| s.tx.clone())
        };
        let Some(tx) = tx else {
            return Err(GroupError::NotFound);
        };
        let envelope = Envelope::new(group_id, EnvelopeKind::Msg, self.local_id, payload);
        tx.send(envelope).await.map_err(|_| GroupError::SendTimeout)?;
        Ok(())
    }

    pub async fn subscription_members(&self, group_id: &str) -> Vec<NodeId> {
        self.subscriptions
            .read()
            .await
            .get(group_id)
            .map(|s| s.members.clone())
            .unwrap_or_default()
    }

    async fn read_host_loop(self: Arc<Self>, mut recv: iroh::endpoint::RecvStream, group_id: String) {
        loop {
            let frame = match read_framed(&mut recv, MAX_GROUP_FRAME).await {
                Ok(f) => f,
                Err(_) => break,
            };
            let envelope: Envelope = match serde_json::from_slice(&frame) {
                Ok(e) => e,
                Err(_) => continue,
            };
            self.handle_host_envelope(&group_id, envelope).await;
        }
        self.mark_subscription_inactive(&group_id).await;
    }

    async fn handle_host_envelope(&self, group_id: &str, envelope: Envelope) {
        match envelope.kind {
            EnvelopeKind::Welcome => {
                let members: Vec<NodeId> = envelope
                    .payload
                    .get("members")
                    .and_then(|v| v.as_array())
                    .map(|a| a.iter().filter_map(|v| v.as_str()?.parse().ok()).collect())
                    .unwrap_or_default();
                let app_type = envelope
                    .payload
                    .get("app_type")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                {
                    let mut subs = self.subscriptions.write().await;
                    if let Some(sub) = subs.get_mut(group_id) {
                        sub.members = members.clone();
                        sub.active = true;
                    }
                }
                let ids: Vec<String> = members.iter().map(|p| p.to_string()).collect();
                let _ = self.store.set_group_members(group_id, &ids);
                self.emit(GroupEvent::Welcomed {
                    group_id: group_id.to_string(),
                    app_type,
                    members,
                });
            }
            EnvelopeKind::Members => {
                let members: Vec<NodeId> = envelope
                    .payload
                    .get("members")
                    .and_then(|v| v.as_array())
                    .map(|a| a.iter().filter_map(|v| v.as_str()?.parse().ok()).collect())
                    .unwrap_or_default();
                {
                    let mut subs = self.subscriptions.write().await;
                    if let Some(sub) = subs.get_mut(group_id) {
                        sub.members = members.clone();
                    }
                }
                let ids: Vec<String> = members.iter().map(|p| p.to_string()).collect();
                let _ = self.store.set_group_members(group_id, &ids);
            }
            EnvelopeKind::Msg => {
                let from: NodeId = envelope.from.parse().unwrap_or(self.local_id);
                self.emit(GroupEvent::Message {
                    group_id: group_id.to_string(),
                    from,
                    payload: envelope.payload,
                });
            }
            EnvelopeKind::Kick => {
                let removed = self.subscriptions.write().await.remove(group_id);
                if let Some(sub) = removed {
                    let _ = self.store.delete_subscription(&sub.host.to_string(), group_id);
                }
                self.emit(GroupEvent::Kicked {
                    group_id: group_id.to_string(),
                });
            }
            EnvelopeKind::Close => {
                let removed = self.subscriptions.write().await.remove(group_id);
                if let Some(sub) = removed {
                    if sub.info.volatile {
                        let _ = self.store.delete_subscription(&sub.host.to_string(), group_id);
                    }
                }
                self.emit(GroupEvent::Closed {
                    group_id: group_id.to_string(),
                });
            }
            EnvelopeKind::Join | EnvelopeKind::Invite | EnvelopeKind::Leave => {}
        }
    }

    async fn mark_subscription_inactive(&self, group_id: &str) {
        let mut subs = self.subscriptions.write().await;
        if let Some(sub) = subs.get_mut(group_id) {
            sub.active = false;
            sub.tx = None;
        }
        drop(subs);
        self.emit(GroupEvent::SubscriptionLost {
            group_id: group_id.to_string(),
        });
    }
}

fn spawn_writer(mut send: iroh::endpoint::SendStream, mut rx: mpsc::Receiver<Envelope>) {
    tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let body = serde_json::to_vec(&envelope).unwrap_or_default();
            match tokio::time::timeout(SEND_TIMEOUT, write_framed(&mut send, &body)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "group send failed");
                    break;
                }
                Err(_) => {
                    tracing::warn!("group send timed out after 30s");
                    break;
                }
            }
        }
    });
}

fn group_info_from_record(record: &GroupRecord) -> GroupInfo {
    GroupInfo {
        id: record.id.clone(),
        name: record.name.clone(),
        app_type: record.app_type.clone(),
        max_members: record.max_members,
        volatile: record.volatile,
    }
}

fn group_info_from_subscription(sub: &GroupSubscription) -> GroupInfo {
    GroupInfo {
        id: sub.group_id.clone(),
        name: sub.name.clone(),
        app_type: sub.app_type.clone(),
        max_members: sub.max_members,
        volatile: sub.volatile,
    }
}

fn uuid_like() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    let mut hex = String::with_capacity(32);
    for b in bytes {
        hex.push_str(&format!("{b:02x}"));
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_id(seed: u8) -> NodeId {
        use rand::SeedableRng;
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed as u64);
        let secret = iroh::SecretKey::generate(&mut rng);
        secret.public().to_string().parse().unwrap()
    }

    fn manager() -> Arc<GroupManager> {
        let store = Arc::new(Store::open_in_memory().unwrap());
        Arc::new(GroupManager::new(node_id(1), store).unwrap())
    }

    #[tokio::test]
    async fn create_group_registers_as_host() {
        let mgr = manager();
        let gid = mgr.create_group("Test", "chat", 0, false).await.unwrap();
        assert!(mgr.is_host(&gid).await);
    }

    #[tokio::test]
    async fn realtime_group_id_has_rt_prefix_and_cap() {
        let mgr = manager();
        let gid = mgr.create_group("Call", "realtime", 2, true).await.unwrap();
        assert!(gid.starts_with("rt-"));
    }

    #[tokio::test]
    async fn kick_unknown_group_errors() {
        let mgr = manager();
        let target = node_id(2);
        let err = mgr.kick("nope", target).await.unwrap_err();
        assert!(matches!(err, GroupError::NotFound));
    }

    #[tokio::test]
    async fn close_group_drops_volatile_record() {
        let mgr = manager();
        let gid = mgr.create_group("Ephemeral", "chat", 0, true).await.unwrap();
        mgr.close_group(&gid).await.unwrap();
        assert!(!mgr.is_host(&gid).await);
        assert!(mgr.store.group(&gid).unwrap().is_none());
    }

    #[tokio::test]
    async fn close_group_keeps_non_volatile_record_unjoined() {
        let mgr = manager();
        let gid = mgr.create_group("Durable", "chat", 0, false).await.unwrap();
        mgr.close_group(&gid).await.unwrap();
        let record = mgr.store.group(&gid).unwrap().unwrap();
        assert!(!record.host_joined);
    }

    #[tokio::test]
    async fn events_subscriber_receives_message_broadcast() {
        let mgr = manager();
        let gid = mgr.create_group("Chat", "chat", 0, false).await.unwrap();
        let mut rx = mgr.subscribe_events();
        mgr.host_broadcast(&gid, serde_json::json!({"text": "hi"})).await.unwrap();
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, GroupEvent::Message { .. }));
    }

    #[tokio::test]
    async fn purge_on_new_removes_stale_realtime_records() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store
            .upsert_group(&GroupRecord {
                id: "rt-deadbeef".into(),
                name: "Stale".into(),
                app_type: "realtime".into(),
                max_members: 2,
                volatile: true,
                host_joined: true,
            })
            .unwrap();
        let mgr = GroupManager::new(node_id(1), store.clone()).unwrap();
        assert!(!mgr.is_host("rt-deadbeef")
            .await);
        assert!(store.group("rt-deadbeef").unwrap().is_none());
    }
}
