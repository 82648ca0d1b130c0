//! Group Manager (§4.H): persistent host/member streams over
//! `/goop/group/1.0.0`, membership events, invite/kick/join/leave,
//! subscription persistence. Realtime Channels (§4.I) are built directly
//! on top of this as 2-member volatile groups with app type `realtime`.

mod checker;
mod direct;
mod error;
mod manager;
mod types;

pub use checker::GroupManagerChecker;
pub use direct::DirectSender;
pub use error::{GroupError, GroupResult};
pub use manager::GroupManager;
pub use types::{Envelope, EnvelopeKind, GroupEvent, GroupInfo, Role};
