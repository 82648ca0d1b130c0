//! Realtime Channels (§4.I): a thin two-peer wrapper over the Group
//! Manager (§4.H), giving each 2-peer real-time conversation (WebRTC
//! signaling, out of scope, is a typical consumer) its own `rt-<hex>`
//! channel id, created/accepted/sent/closed without the caller touching
//! groups directly.

mod error;
mod manager;
mod types;

pub use error::{RealtimeError, RealtimeResult};
pub use manager::RealtimeManager;
pub use types::{Channel, ChannelEvent};
