use goop_transport::{write_framed, IncomingStream};

use crate::error::{DispatchError, DispatchResult};

/// Serve the `content` protocol: request is empty, response is one
/// UTF-8 line of self-content terminated by `\n` (§4.F).
pub async fn serve(mut incoming: IncomingStream, self_content: &str) -> DispatchResult<()> {
    let mut line = self_content.to_string();
    line.push('\n');
    write_framed(&mut incoming.send, line.as_bytes())
        .await
        .map_err(|e| DispatchError::Io(e.to_string()))
}
