/// Errors returned by [`crate::RealtimeManager`]. `Display` strings
/// match the stable wire error kinds in §7 where applicable.
#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    #[error("not-found")]
    NotFound,

    #[error(transparent)]
    Group(#[from] goop_group::GroupError),
}

pub type RealtimeResult<T> = Result<T, RealtimeError>;
