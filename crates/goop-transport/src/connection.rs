use crate::{NodeId, TransportError};

use iroh::endpoint::Connection;
use iroh::{Endpoint, EndpointAddr};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Caches QUIC connections per `(peer, protocol tag)`. A peer may hold a
/// distinct connection per protocol tag, since each tag is negotiated as
/// its own ALPN on the shared endpoint. First stream-open triggers
/// connect, subsequent opens reuse the cached connection.
pub(crate) struct ConnectionPool {
    endpoint: Endpoint,
    connections: Mutex<HashMap<(NodeId, Vec<u8>), Connection>>,
    addresses: Mutex<HashMap<NodeId, EndpointAddr>>,
}

impl ConnectionPool {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            connections: Mutex::new(HashMap::new()),
            addresses: Mutex::new(HashMap::new()),
        }
    }

    /// Store a known address for a peer, used as a fallback when no
    /// cached connection exists and discovery hasn't resolved one yet.
    pub async fn add_addr(&self, id: NodeId, addr: EndpointAddr) {
        self.addresses.lock().await.insert(id, addr);
    }

    /// Get an existing connection for `(target, tag)` or create a new one.
    pub async fn get_or_connect(
        &self,
        target: NodeId,
        tag: &[u8],
    ) -> Result<Connection, TransportError> {
        let key = (target, tag.to_vec());
        let mut conns = self.connections.lock().await;

        if let Some(conn) = conns.get(&key) {
            if conn.close_reason().is_none() {
                return Ok(conn.clone());
            }
            conns.remove(&key);
        }

        let addr = {
            let addrs = self.addresses.lock().await;
            addrs
                .get(&target)
                .cloned()
                .unwrap_or_else(|| EndpointAddr::new(*target.as_endpoint_id()))
        };
        let conn = self
            .endpoint
            .connect(addr, tag)
            .await
            .map_err(|e| TransportError::Connect {
                node_id: target,
                source: e.into(),
            })?;

        conns.insert(key, conn.clone());
        Ok(conn)
    }

    /// Remove a cached connection (e.g. after a send failure, or as part
    /// of clearing dial backoff so the next attempt is fresh).
    pub async fn remove(&self, target: &NodeId, tag: &[u8]) {
        self.connections
            .lock()
            .await
            .remove(&(*target, tag.to_vec()));
    }

    /// Remove every cached connection to `target`, across all protocol
    /// tags. Used by relay recovery (§4.D step 1: "close every existing
    /// connection to the relay peer") and by the site-fetch retry path.
    pub async fn remove_all(&self, target: &NodeId) {
        self.connections
            .lock()
            .await
            .retain(|(id, _), _| id != target);
    }

    /// List all currently connected peers (any protocol tag).
    pub async fn connected_peers(&self) -> Vec<NodeId> {
        let conns = self.connections.lock().await;
        conns
            .iter()
            .filter(|(_, conn)| conn.close_reason().is_none())
            .map(|((id, _), _)| *id)
            .collect()
    }

    /// Whether `target` currently has any live non-relay (direct)
    /// connection — used to decide whether relay-address injection
    /// should be skipped in favor of the direct path (§4.D).
    pub async fn has_direct_connection(&self, target: &NodeId) -> bool {
        let conns = self.connections.lock().await;
        conns.iter().any(|((id, _), conn)| {
            id == target && conn.close_reason().is_none() && !conn.remote_is_relay()
        })
    }
}
