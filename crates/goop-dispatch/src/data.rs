use std::sync::Arc;

use goop_data::{Caller, DataOpEngine, DataRequest, DataResponse};
use goop_transport::{read_framed, write_framed, IncomingStream};

use crate::error::{DispatchError, DispatchResult};

const MAX_REQUEST_SIZE: usize = 1024 * 1024;

/// Serve the `data` protocol: one JSON-line request, one JSON-line
/// response, dispatched onto the [`DataOpEngine`] with the requester's
/// verified identity as the owner-scoping caller (§4.F, §4.G).
pub async fn serve(mut incoming: IncomingStream, engine: Arc<DataOpEngine>) -> DispatchResult<()> {
    let frame = read_framed(&mut incoming.recv, MAX_REQUEST_SIZE)
        .await
        .map_err(|e| DispatchError::Io(e.to_string()))?;

    let response = match serde_json::from_slice::<DataRequest>(&frame) {
        Ok(req) => engine.dispatch(Caller::Remote(incoming.peer), req).await,
        Err(_) => DataResponse::err("invalid-json"),
    };

    let body = serde_json::to_vec(&response).unwrap_or_default();
    write_framed(&mut incoming.send, &body)
        .await
        .map_err(|e| DispatchError::Io(e.to_string()))
}
