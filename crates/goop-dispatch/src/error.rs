/// Errors the stream dispatcher returns. `Display` strings match the
/// stable wire error kinds in §7.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("access-denied")]
    AccessDenied,

    #[error("not-found")]
    NotFound,

    #[error("file-too-large")]
    FileTooLarge,

    #[error("peer-unreachable")]
    PeerUnreachable,

    #[error("connect-failed")]
    ConnectFailed,

    #[error("stream-open-failed")]
    StreamOpenFailed,

    #[error("{0}")]
    Io(String),
}

pub type DispatchResult<T> = Result<T, DispatchError>;
