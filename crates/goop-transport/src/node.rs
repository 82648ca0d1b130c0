use crate::config::GoopNodeConfig;
use crate::connection::ConnectionPool;
use crate::identity;
use crate::path::{CircuitEvent, PathEvent};
use crate::peerstore::Peerstore;
use crate::protocol::{HandlerState, IncomingStream, TaggedProtocolHandler};
use crate::{NodeId, TransportError, ALL_PROTOCOLS};

use iroh::endpoint::{RecvStream, SendStream};
use iroh::protocol::Router;
use iroh::Endpoint;
use iroh_gossip::net::Gossip;
use n0_watcher::Watcher;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};

/// A Goop2 transport node — bind, open tagged streams, receive them,
/// monitor paths, and hold the gossip overlay used by Presence.
///
/// Wraps a single `iroh::Endpoint` and `iroh::protocol::Router` behind a
/// stable API. One endpoint serves all nine wire protocols: each is
/// registered as its own ALPN and dispatched into a shared incoming-stream
/// queue tagged by which one it arrived on.
pub struct GoopNode {
    id: NodeId,
    pool: Arc<ConnectionPool>,
    peerstore: Arc<Peerstore>,
    incoming_rx: Mutex<mpsc::Receiver<IncomingStream>>,
    path_event_tx: broadcast::Sender<PathEvent>,
    circuit_event_tx: broadcast::Sender<CircuitEvent>,
    gossip: Gossip,
    _router: Router,
    endpoint: Endpoint,
    max_message_size: usize,
    dial_timeout: std::time::Duration,
    min_addr_ttl: std::time::Duration,
}

impl GoopNode {
    /// Bind a new node: load or create the persisted identity, start
    /// listening, and register every protocol tag plus the gossip ALPN on
    /// the router.
    pub async fn bind(config: GoopNodeConfig) -> Result<Self, TransportError> {
        let secret_key = identity::load_or_create(&config.key_path)?;

        let endpoint = Endpoint::builder()
            .secret_key(secret_key)
            .discovery_local_network()
            .bind()
            .await
            .map_err(|e| TransportError::Bind(e.into()))?;

        let id = NodeId::from_endpoint_id(endpoint.id());

        let (incoming_tx, incoming_rx) = mpsc::channel(config.recv_buffer);
        let (path_event_tx, _) = broadcast::channel(64);
        let (circuit_event_tx, _) = broadcast::channel(16);

        let handler_state = Arc::new(HandlerState {
            incoming_tx,
            path_event_tx: path_event_tx.clone(),
        });

        let gossip = Gossip::builder()
            .spawn(endpoint.clone());

        let mut builder = Router::builder(endpoint.clone());
        for tag in ALL_PROTOCOLS {
            let handler = TaggedProtocolHandler {
                tag: tag.to_vec(),
                state: handler_state.clone(),
            };
            builder = builder.accept(*tag, Arc::new(handler));
        }
        builder = builder.accept(iroh_gossip::ALPN, gossip.clone());
        let router = builder.spawn();

        let pool = Arc::new(ConnectionPool::new(endpoint.clone()));
        let peerstore = Arc::new(Peerstore::new());

        let node = Self {
            id,
            pool,
            peerstore,
            incoming_rx: Mutex::new(incoming_rx),
            path_event_tx,
            circuit_event_tx,
            gossip,
            _router: router,
            endpoint,
            max_message_size: config.max_message_size,
            dial_timeout: config.dial_timeout,
            min_addr_ttl: config.min_addr_ttl,
        };

        node.spawn_circuit_watcher();

        if let Some(relay) = &config.relay {
            node.peerstore
                .add_addrs(relay.relay_id, relay.addrs.clone(), crate::CIRCUIT_ADDR_TTL);
        }

        Ok(node)
    }

    /// Watch the endpoint's home-relay state and translate gain/loss into
    /// [`CircuitEvent`]s the Relay Controller consumes.
    fn spawn_circuit_watcher(&self) {
        let mut watcher = self.endpoint.home_relay().watch();
        let tx = self.circuit_event_tx.clone();
        tokio::spawn(async move {
            let mut had_circuit = false;
            loop {
                let has_circuit = !watcher.get().is_empty();
                if has_circuit && !had_circuit {
                    let _ = tx.send(CircuitEvent::Gained);
                } else if !has_circuit && had_circuit {
                    let _ = tx.send(CircuitEvent::Lost);
                }
                had_circuit = has_circuit;
                if watcher.updated().await.is_err() {
                    break;
                }
            }
        });
    }

    /// This node's identity (Ed25519 public key).
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// This node's full address (identity + relay URL + direct addrs).
    pub fn addr(&self) -> iroh::EndpointAddr {
        self.endpoint.addr()
    }

    /// Shared TTL'd address book used by Presence, the Relay Controller
    /// and the Stream Dispatcher.
    pub fn peerstore(&self) -> &Arc<Peerstore> {
        &self.peerstore
    }

    /// Gossip overlay handle, used by Presence to subscribe/publish on
    /// the fixed presence topic.
    pub fn gossip(&self) -> &Gossip {
        &self.gossip
    }

    /// Add a known peer address (learned via Presence, relay injection,
    /// or LAN discovery).
    pub async fn add_peer_addr(&self, addr: iroh::EndpointAddr) {
        let id = NodeId::from_endpoint_id(addr.id);
        self.pool.add_addr(id, addr).await;
    }

    /// Open a bidirectional stream to `peer` on the given protocol tag.
    /// Reuses a cached connection for `(peer, tag)` if one is live.
    pub async fn open_stream(
        &self,
        peer: NodeId,
        tag: &[u8],
    ) -> Result<(SendStream, RecvStream), TransportError> {
        let conn = tokio::time::timeout(self.dial_timeout, self.pool.get_or_connect(peer, tag))
            .await
            .map_err(|_| TransportError::PeerUnreachable { node_id: peer })??;

        conn.open_bi()
            .await
            .map_err(|e| TransportError::StreamOpen {
                node_id: peer,
                source: e.into(),
            })
    }

    /// Receive the next stream accepted on any protocol tag. Blocks until
    /// one arrives. Safe to call from a single accept loop while other
    /// `Arc<GoopNode>` holders use the rest of the API concurrently.
    pub async fn accept_stream(&self) -> Result<IncomingStream, TransportError> {
        self.incoming_rx.lock().await.recv().await.ok_or(TransportError::Shutdown)
    }

    /// Maximum accepted framed message size in bytes (site/docs/avatar
    /// body cap). Protocol decoders should pass this to [`crate::read_framed`].
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Minimum TTL Presence should use when learning addresses (default
    /// 2 minutes; §4.E takes `max(configured, 2 minutes)`).
    pub fn min_addr_ttl(&self) -> std::time::Duration {
        self.min_addr_ttl
    }

    /// Subscribe to path change events (relay/direct transitions).
    pub fn path_events(&self) -> broadcast::Receiver<PathEvent> {
        self.path_event_tx.subscribe()
    }

    /// Subscribe to circuit-relay reservation gain/loss events, driving
    /// the Relay Controller's state machine.
    pub fn circuit_events(&self) -> broadcast::Receiver<CircuitEvent> {
        self.circuit_event_tx.subscribe()
    }

    /// Force-evict every cached connection to `peer` across all protocol
    /// tags. Next `open_stream` triggers a fresh dial.
    pub async fn disconnect(&self, peer: NodeId) {
        self.pool.remove_all(&peer).await;
    }

    /// Force-evict a single `(peer, tag)` cached connection.
    pub async fn disconnect_tag(&self, peer: NodeId, tag: &[u8]) {
        self.pool.remove(&peer, tag).await;
    }

    /// Whether `peer` currently has a live, non-relay (direct) connection.
    pub async fn has_direct_connection(&self, peer: &NodeId) -> bool {
        self.pool.has_direct_connection(peer).await
    }

    /// List all currently connected peers (any protocol tag).
    pub async fn connected_peers(&self) -> Vec<NodeId> {
        self.pool.connected_peers().await
    }

    /// Graceful shutdown.
    pub async fn shutdown(self) -> Result<(), TransportError> {
        self.endpoint.close().await;
        Ok(())
    }
}
