use goop_transport::{read_framed, write_framed, GoopNode, IncomingStream, NodeId, PROTOCOL_AVATAR};

use crate::error::{DispatchError, DispatchResult};

/// Maximum avatar body size, enforced on both the serving and fetching
/// sides (§4.F).
pub const MAX_AVATAR_SIZE: usize = 512 * 1024;

/// Serve the `avatar` protocol: request is empty; reply `NONE\n` if
/// `avatar` is absent, else `OK <len>\n` followed by the raw bytes.
pub async fn serve(mut incoming: IncomingStream, avatar: Option<&[u8]>) -> DispatchResult<()> {
    let payload = match avatar {
        None => b"NONE\n".to_vec(),
        Some(bytes) => {
            let mut buf = format!("OK {}\n", bytes.len()).into_bytes();
            buf.extend_from_slice(bytes);
            buf
        }
    };
    write_framed(&mut incoming.send, &payload)
        .await
        .map_err(|e| DispatchError::Io(e.to_string()))
}

/// Fetch `peer`'s avatar. Returns `None` if the peer has none. Rejects
/// a reported length greater than [`MAX_AVATAR_SIZE`].
pub async fn fetch(node: &GoopNode, peer: NodeId) -> DispatchResult<Option<Vec<u8>>> {
    let (_send, mut recv) = node
        .open_stream(peer, PROTOCOL_AVATAR)
        .await
        .map_err(|_| DispatchError::PeerUnreachable)?;

    let frame = read_framed(&mut recv, node.max_message_size())
        .await
        .map_err(|_| DispatchError::Io("malformed avatar response".into()))?;

    parse_avatar_response(&frame)
}

fn parse_avatar_response(frame: &[u8]) -> DispatchResult<Option<Vec<u8>>> {
    if frame.starts_with(b"NONE\n") {
        return Ok(None);
    }
    let header_end = frame
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| DispatchError::Io("avatar response missing header".into()))?;
    let header = std::str::from_utf8(&frame[..header_end])
        .map_err(|_| DispatchError::Io("avatar header not utf-8".into()))?;
    let len_str = header
        .strip_prefix("OK ")
        .ok_or_else(|| DispatchError::Io("avatar response malformed".into()))?;
    let len: usize = len_str
        .parse()
        .map_err(|_| DispatchError::Io("avatar length not a number".into()))?;
    if len > MAX_AVATAR_SIZE {
        return Err(DispatchError::FileTooLarge);
    }
    let body = &frame[header_end + 1..];
    if body.len() != len {
        return Err(DispatchError::Io("avatar body length mismatch".into()));
    }
    Ok(Some(body.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_none_response() {
        assert_eq!(parse_avatar_response(b"NONE\n").unwrap(), None);
    }

    #[test]
    fn parses_ok_response() {
        let mut frame = b"OK 3\n".to_vec();
        frame.extend_from_slice(b"abc");
        assert_eq!(parse_avatar_response(&frame).unwrap(), Some(b"abc".to_vec()));
    }

    #[test]
    fn rejects_oversized_length() {
        let frame = format!("OK {}\n", MAX_AVATAR_SIZE + 1).into_bytes();
        assert!(matches!(parse_avatar_response(&frame), Err(DispatchError::FileTooLarge)));
    }
}
