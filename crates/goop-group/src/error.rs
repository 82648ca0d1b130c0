#[derive(Debug, thiserror::Error)]
pub enum GroupError {
    #[error("not-found")]
    NotFound,

    #[error("access-denied")]
    AccessDenied,

    #[error("group is full")]
    GroupFull,

    #[error("not group host")]
    NotHost,

    #[error("peer-unreachable")]
    PeerUnreachable,

    #[error("connect-failed")]
    ConnectFailed(#[source] anyhow::Error),

    #[error("stream-open-failed")]
    StreamOpenFailed(#[source] anyhow::Error),

    #[error("send timed out")]
    SendTimeout,

    #[error(transparent)]
    Store(#[from] goop_store::StoreError),

    #[error(transparent)]
    Transport(#[from] goop_transport::TransportError),
}

pub type GroupResult<T> = Result<T, GroupError>;
