/// Construction-time failures collected at the binary boundary
/// (EXPANSION C: "`anyhow` is used only at the binary boundary ... to
/// collect construction-time failures"). Kept as its own small enum
/// rather than bare `anyhow::Error` so config/IO failures get a
/// consistent message shape in logs before `main` gives up and exits.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Transport(#[from] goop_transport::TransportError),

    #[error(transparent)]
    Store(#[from] goop_store::StoreError),

    #[error(transparent)]
    Presence(#[from] goop_presence::PresenceError),

    #[error(transparent)]
    Group(#[from] goop_group::GroupError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
