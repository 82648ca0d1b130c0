use std::path::{Path, PathBuf};
use std::time::Duration;

use goop_transport::{GoopNode, IncomingStream, NodeId, RelayInfo, PROTOCOL_SITE};
use iroh::endpoint::RecvStream;

use crate::error::{DispatchError, DispatchResult};

/// Maximum accepted site body, both serving and fetching (§4.F).
pub const MAX_SITE_BODY: usize = 50 * 1024 * 1024;

/// Normalize a requested site path: `/` or empty becomes `index.html`,
/// `.`/`..` components are resolved against the site root, and any
/// request that would escape the root or reach into `lua/` is
/// rejected (§4.F, §8 scenario 6).
pub fn normalize_site_path(requested: &str) -> DispatchResult<PathBuf> {
    let trimmed = requested.trim();
    let stripped = trimmed.trim_start_matches('/');
    if stripped.is_empty() {
        return Ok(PathBuf::from("index.html"));
    }

    let mut components: Vec<&str> = Vec::new();
    for part in stripped.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                if components.pop().is_none() {
                    return Err(DispatchError::AccessDenied);
                }
            }
            other => components.push(other),
        }
    }

    if components.is_empty() {
        return Ok(PathBuf::from("index.html"));
    }
    if components[0] == "lua" {
        return Err(DispatchError::AccessDenied);
    }
    Ok(components.iter().collect())
}

fn guess_mime(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

async fn read_line(recv: &mut RecvStream, max_len: usize) -> DispatchResult<String> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        recv.read_exact(&mut byte)
            .await
            .map_err(|e| DispatchError::Io(e.to_string()))?;
        if byte[0] == b'\n' {
            break;
        }
        buf.push(byte[0]);
        if buf.len() > max_len {
            return Err(DispatchError::Io("request line too long".into()));
        }
    }
    String::from_utf8(buf).map_err(|_| DispatchError::Io("line not utf-8".into()))
}

async fn write_err(send: &mut iroh::endpoint::SendStream, msg: &str) -> DispatchResult<()> {
    let line = format!("ERR {msg}\n");
    send.write_all(line.as_bytes())
        .await
        .map_err(|e| DispatchError::Io(e.to_string()))?;
    send.finish().map_err(|e| DispatchError::Io(e.to_string()))?;
    Ok(())
}

/// Serve the `site` protocol against files under `site_root` (§4.F).
/// Unlike the other protocols, site speaks its request line and
/// response body directly on the stream rather than through the
/// length-prefixed frame helper.
pub async fn serve(mut incoming: IncomingStream, site_root: &Path) -> DispatchResult<()> {
    let line = match read_line(&mut incoming.recv, 4096).await {
        Ok(l) => l,
        Err(_) => return write_err(&mut incoming.send, "forbidden").await,
    };

    let Some(requested) = line.strip_prefix("GET ") else {
        return write_err(&mut incoming.send, "forbidden").await;
    };

    let rel = match normalize_site_path(requested) {
        Ok(p) => p,
        Err(_) => return write_err(&mut incoming.send, "forbidden").await,
    };

    let full = site_root.join(&rel);
    let metadata = match tokio::fs::metadata(&full).await {
        Ok(m) if m.is_file() => m,
        _ => return write_err(&mut incoming.send, "not found").await,
    };
    if metadata.len() as usize > MAX_SITE_BODY {
        return write_err(&mut incoming.send, "forbidden").await;
    }

    let body = match tokio::fs::read(&full).await {
        Ok(b) => b,
        Err(_) => return write_err(&mut incoming.send, "not found").await,
    };

    let header = format!("OK {} {}\n", guess_mime(&rel), body.len());
    incoming
        .send
        .write_all(header.as_bytes())
        .await
        .map_err(|e| DispatchError::Io(e.to_string()))?;
    incoming
        .send
        .write_all(&body)
        .await
        .map_err(|e| DispatchError::Io(e.to_string()))?;
    incoming.send.finish().map_err(|e| DispatchError::Io(e.to_string()))?;
    Ok(())
}

async fn try_fetch(node: &GoopNode, peer: NodeId, path: &str) -> DispatchResult<(String, Vec<u8>)> {
    let (mut send, mut recv) = node
        .open_stream(peer, PROTOCOL_SITE)
        .await
        .map_err(|_| DispatchError::PeerUnreachable)?;

    let line = format!("GET {path}\n");
    send.write_all(line.as_bytes())
        .await
        .map_err(|e| DispatchError::Io(e.to_string()))?;
    send.finish().map_err(|e| DispatchError::Io(e.to_string()))?;

    let header = read_line(&mut recv, 512).await?;
    if let Some(reason) = header.strip_prefix("ERR ") {
        return Err(match reason {
            "forbidden" => DispatchError::AccessDenied,
            "not found" => DispatchError::NotFound,
            other => DispatchError::Io(other.to_string()),
        });
    }

    let rest = header
        .strip_prefix("OK ")
        .ok_or_else(|| DispatchError::Io("malformed site response".into()))?;
    let (mime, len_str) = rest
        .rsplit_once(' ')
        .ok_or_else(|| DispatchError::Io("malformed site response".into()))?;
    let len: usize = len_str
        .parse()
        .map_err(|_| DispatchError::Io("malformed site response length".into()))?;
    if len > MAX_SITE_BODY {
        return Err(DispatchError::FileTooLarge);
    }

    let mut body = vec![0u8; len];
    recv.read_exact(&mut body)
        .await
        .map_err(|e| DispatchError::Io(e.to_string()))?;
    Ok((mime.to_string(), body))
}

/// Fetch a site file from `peer`, retrying once with forced relay
/// recovery on dial failure when a relay is configured (§4.F).
pub async fn fetch(
    node: &GoopNode,
    peer: NodeId,
    path: &str,
    relay: Option<&RelayInfo>,
) -> DispatchResult<(String, Vec<u8>)> {
    match try_fetch(node, peer, path).await {
        Ok(result) => Ok(result),
        Err(DispatchError::PeerUnreachable) | Err(DispatchError::ConnectFailed) if relay.is_some() => {
            let relay = relay.unwrap();
            node.disconnect(peer).await;
            node.disconnect(relay.relay_id).await;

            let forced = RelayInfo {
                poll_deadline: Duration::from_secs(30),
                ..relay.clone()
            };
            let guard = goop_relay::SingleFlight::new();
            if let Err(e) = goop_relay::run_refresh(&guard, node, node.peerstore(), &forced, None).await {
                tracing::debug!(error = %e, "forced relay refresh during site fetch failed");
            }
            node.peerstore()
                .inject_circuit_addr(peer, relay.relay_id, &relay.addrs);

            try_fetch(node, peer, path).await
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_path_becomes_index() {
        assert_eq!(normalize_site_path("").unwrap(), PathBuf::from("index.html"));
        assert_eq!(normalize_site_path("/").unwrap(), PathBuf::from("index.html"));
    }

    #[test]
    fn normal_path_passes_through() {
        assert_eq!(normalize_site_path("/css/app.css").unwrap(), PathBuf::from("css/app.css"));
    }

    #[test]
    fn lua_prefix_rejected() {
        assert!(matches!(normalize_site_path("lua/x.lua"), Err(DispatchError::AccessDenied)));
        assert!(matches!(normalize_site_path("/lua/x.lua"), Err(DispatchError::AccessDenied)));
    }

    #[test]
    fn traversal_above_root_rejected() {
        assert!(matches!(normalize_site_path("../../etc/passwd"), Err(DispatchError::AccessDenied)));
    }

    #[test]
    fn traversal_within_root_resolves() {
        assert_eq!(
            normalize_site_path("a/b/../c.html").unwrap(),
            PathBuf::from("a/c.html")
        );
    }
}
