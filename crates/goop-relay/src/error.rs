#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("recovery already in progress")]
    AlreadyRecovering,

    #[error("relay connect failed: {0}")]
    ConnectFailed(#[source] anyhow::Error),

    #[error("relay poll deadline elapsed without a circuit address")]
    PollDeadlineElapsed,
}
