use crate::path::{PathEvent, PathKind};
use crate::{NodeId, TransportError};

use iroh::endpoint::{Connection, RecvStream, SendStream};
use iroh::protocol::AcceptError;
use n0_future::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc};

/// Write a length-prefixed message to a QUIC send stream.
///
/// Used by the protocols that frame discrete messages (content, avatar,
/// docs, data, diag, relay-refresh). The site protocol streams its body
/// directly and does not use this helper.
pub async fn write_framed(send: &mut SendStream, data: &[u8]) -> Result<(), anyhow::Error> {
    let len = (data.len() as u32).to_be_bytes();
    send.write_all(&len).await?;
    send.write_all(data).await?;
    send.finish()?;
    Ok(())
}

/// Read a length-prefixed message from a QUIC receive stream.
pub async fn read_framed(recv: &mut RecvStream, max_size: usize) -> Result<Vec<u8>, TransportError> {
    let mut len_buf = [0u8; 4];
    recv.read_exact(&mut len_buf)
        .await
        .map_err(|e| TransportError::Receive(e.into()))?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_size {
        return Err(TransportError::MessageTooLarge {
            size: len,
            max: max_size,
        });
    }

    let mut buf = vec![0u8; len];
    recv.read_exact(&mut buf)
        .await
        .map_err(|e| TransportError::Receive(e.into()))?;

    Ok(buf)
}

/// A freshly accepted bidirectional stream, tagged with the ALPN
/// (protocol tag) it arrived on so the Stream Dispatcher can route it to
/// the right frame decoder without re-inspecting the connection.
pub struct IncomingStream {
    pub tag: Vec<u8>,
    pub peer: NodeId,
    pub send: SendStream,
    pub recv: RecvStream,
}

/// State shared by every per-tag protocol handler.
pub(crate) struct HandlerState {
    pub incoming_tx: mpsc::Sender<IncomingStream>,
    pub path_event_tx: broadcast::Sender<PathEvent>,
}

/// Accepts connections for a single protocol tag (ALPN) and hands every
/// bidirectional stream opened on it to the shared incoming-stream queue.
///
/// One instance is registered per entry in [`crate::ALL_PROTOCOLS`] on the
/// same [`iroh::protocol::Router`], so a single bound endpoint serves all
/// nine wire protocols while keeping their streams distinguishable.
#[derive(Clone)]
pub(crate) struct TaggedProtocolHandler {
    pub tag: Vec<u8>,
    pub state: Arc<HandlerState>,
}

impl std::fmt::Debug for TaggedProtocolHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaggedProtocolHandler")
            .field("tag", &String::from_utf8_lossy(&self.tag))
            .finish()
    }
}

impl iroh::protocol::ProtocolHandler for TaggedProtocolHandler {
    async fn accept(&self, connection: Connection) -> Result<(), AcceptError> {
        let remote = NodeId::from_endpoint_id(connection.remote_id());
        let state = self.state.clone();
        let tag = self.tag.clone();

        spawn_path_watcher(&connection, remote, state.path_event_tx.clone());

        loop {
            let (send, recv) = match connection.accept_bi().await {
                Ok(streams) => streams,
                Err(_) => break,
            };

            let incoming = IncomingStream {
                tag: tag.clone(),
                peer: remote,
                send,
                recv,
            };
            if state.incoming_tx.send(incoming).await.is_err() {
                // Node has been dropped; stop accepting new streams.
                break;
            }
        }

        Ok(())
    }
}

/// Spawn a background task that monitors path changes for a connection.
fn spawn_path_watcher(connection: &Connection, remote: NodeId, tx: broadcast::Sender<PathEvent>) {
    let paths = connection.paths();
    let mut stream = paths.stream();
    let mut last_kind = PathKind::Unknown;

    tokio::spawn(async move {
        while let Some(path_info) = stream.next().await {
            let (kind, rtt) = classify_path(&path_info);

            if kind != last_kind {
                last_kind = kind;
                let event = PathEvent {
                    kind,
                    rtt,
                    remote,
                    timestamp: Instant::now(),
                };
                let _ = tx.send(event);
            }
        }
    });
}

/// Classify the current path from iroh's `PathInfoList`.
fn classify_path(paths: &iroh::endpoint::PathInfoList) -> (PathKind, std::time::Duration) {
    for path in paths.iter() {
        if path.is_selected() {
            if path.is_relay() {
                return (PathKind::Relay, path.rtt());
            } else {
                return (PathKind::Direct, path.rtt());
            }
        }
    }
    (PathKind::Unknown, std::time::Duration::ZERO)
}
