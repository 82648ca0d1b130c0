use std::sync::Arc;
use std::time::Instant;

use goop_transport::{write_framed, GoopNode, IncomingStream};
use goop_relay::RelayManager;
use serde::Serialize;

use crate::error::{DispatchError, DispatchResult};

/// Best-effort diagnostics snapshot. Not a stable wire
/// schema — the admin UI (out of scope) treats every field as
/// advisory.
#[derive(Debug, Serialize)]
pub struct DiagInfo {
    pub identity: String,
    pub local_addr: String,
    pub connected_peers: Vec<ConnectedPeer>,
    pub uptime_secs: u64,
    pub relay_state: Option<String>,
    pub peer_table_size: usize,
}

#[derive(Debug, Serialize)]
pub struct ConnectedPeer {
    pub peer: String,
    pub path: &'static str,
}

/// Serve the `diag` protocol: request is empty, response is one JSON
/// object (§4.F).
pub async fn serve(
    mut incoming: IncomingStream,
    node: &GoopNode,
    started_at: Instant,
    relay: Option<&Arc<RelayManager>>,
    peer_table_size: usize,
) -> DispatchResult<()> {
    let mut connected_peers = Vec::new();
    for peer in node.connected_peers().await {
        let path = if node.has_direct_connection(&peer).await {
            "direct"
        } else {
            "relay"
        };
        connected_peers.push(ConnectedPeer {
            peer: peer.to_string(),
            path,
        });
    }

    let relay_state = relay.map(|r| if r.is_recovering() { "recovering" } else { "healthy" }.to_string());

    let info = DiagInfo {
        identity: node.id().to_string(),
        local_addr: format!("{:?}", node.addr()),
        connected_peers,
        uptime_secs: started_at.elapsed().as_secs(),
        relay_state,
        peer_table_size,
    };

    let body = serde_json::to_vec(&info).unwrap_or_default();
    write_framed(&mut incoming.send, &body)
        .await
        .map_err(|e| DispatchError::Io(e.to_string()))
}
