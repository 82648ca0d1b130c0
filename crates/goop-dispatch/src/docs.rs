use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use goop_transport::{read_framed, write_framed, IncomingStream, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::{DispatchError, DispatchResult};

const MAX_REQUEST_SIZE: usize = 8 * 1024;

/// Group-membership oracle the `docs` handler consults before listing
/// or serving a group's files (§6 `GroupChecker`).
#[async_trait]
pub trait GroupChecker: Send + Sync {
    async fn is_peer_in_group(&self, peer: NodeId, group_id: &str) -> bool;
    async fn is_group_host(&self, group_id: &str) -> bool;
}

#[derive(Debug, Deserialize)]
struct DocsRequest {
    op: String,
    group_id: String,
    #[serde(default)]
    file: Option<String>,
}

#[derive(Debug, Serialize)]
struct FileEntry {
    name: String,
    size: u64,
}

fn guess_mime(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("pdf") => "application/pdf",
        Some("txt") | Some("md") => "text/plain",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Serve the `docs` protocol: list or fetch files belonging to a group,
/// gated on the requester being a member of it (§4.F).
pub async fn serve(
    mut incoming: IncomingStream,
    docs_root: &Path,
    group_checker: Arc<dyn GroupChecker>,
) -> DispatchResult<()> {
    let frame = read_framed(&mut incoming.recv, MAX_REQUEST_SIZE)
        .await
        .map_err(|e| DispatchError::Io(e.to_string()))?;
    let req: DocsRequest = match serde_json::from_slice(&frame) {
        Ok(r) => r,
        Err(_) => return respond_err(&mut incoming, "invalid-json").await,
    };

    if !group_checker.is_peer_in_group(incoming.peer, &req.group_id).await {
        return respond_err(&mut incoming, "access denied").await;
    }

    let group_dir = docs_root.join(&req.group_id);

    match req.op.as_str() {
        "list" => {
            let mut files = Vec::new();
            if let Ok(mut entries) = tokio::fs::read_dir(&group_dir).await {
                while let Ok(Some(entry)) = entries.next_entry().await {
                    if let Ok(meta) = entry.metadata().await {
                        if meta.is_file() {
                            files.push(FileEntry {
                                name: entry.file_name().to_string_lossy().into_owned(),
                                size: meta.len(),
                            });
                        }
                    }
                }
            }
            let body = serde_json::json!({ "ok": true, "files": files });
            write_framed(&mut incoming.send, &serde_json::to_vec(&body).unwrap_or_default())
                .await
                .map_err(|e| DispatchError::Io(e.to_string()))
        }
        "get" => {
            let Some(file) = req.file.as_deref() else {
                return respond_err(&mut incoming, "not found").await;
            };
            if file.contains('/') || file.contains("..") {
                return respond_err(&mut incoming, "access denied").await;
            }
            let full = group_dir.join(file);
            let body = match tokio::fs::read(&full).await {
                Ok(b) => b,
                Err(_) => return respond_err(&mut incoming, "not found").await,
            };
            let header = format!("OK {} {}\n", guess_mime(Path::new(file)), body.len());
            let mut payload = header.into_bytes();
            payload.extend_from_slice(&body);
            write_framed(&mut incoming.send, &payload)
                .await
                .map_err(|e| DispatchError::Io(e.to_string()))
        }
        _ => respond_err(&mut incoming, "unknown-op").await,
    }
}

async fn respond_err(incoming: &mut IncomingStream, error: &str) -> DispatchResult<()> {
    let body: Json = serde_json::json!({ "ok": false, "error": error });
    write_framed(&mut incoming.send, &serde_json::to_vec(&body).unwrap_or_default())
        .await
        .map_err(|e| DispatchError::Io(e.to_string()))
}
