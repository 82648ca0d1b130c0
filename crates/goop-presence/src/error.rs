#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    #[error("presence topic join failed: {0}")]
    Join(#[source] anyhow::Error),

    #[error("presence broadcast failed: {0}")]
    Broadcast(#[source] anyhow::Error),

    #[error("presence encode failed: {0}")]
    Encode(#[source] rmp_serde::encode::Error),
}
