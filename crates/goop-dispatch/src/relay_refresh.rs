use goop_relay::RelayManager;
use goop_transport::{write_framed, IncomingStream, Peerstore};
use serde::Serialize;

use crate::error::{DispatchError, DispatchResult};

#[derive(Debug, Serialize)]
struct RelayRefreshResponse {
    ok: bool,
    has_circuit: bool,
    recovering: bool,
}

/// Serve the `relay-refresh` protocol: nudge this node's own relay
/// controller and answer immediately without waiting for the
/// background refresh it may trigger (§4.F, §4.D). Must not tear down
/// the calling stream while that refresh runs.
pub async fn serve(
    mut incoming: IncomingStream,
    relay_manager: &RelayManager,
    peerstore: &Peerstore,
    relay_id: goop_transport::NodeId,
) -> DispatchResult<()> {
    relay_manager.pulse().await;

    let response = RelayRefreshResponse {
        ok: true,
        has_circuit: peerstore.has_circuit_addr(&relay_id),
        recovering: relay_manager.is_recovering(),
    };

    let body = serde_json::to_vec(&response).unwrap_or_default();
    write_framed(&mut incoming.send, &body)
        .await
        .map_err(|e| DispatchError::Io(e.to_string()))
}
