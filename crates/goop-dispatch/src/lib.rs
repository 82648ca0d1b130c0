//! Stream Dispatcher (§4.F): per-protocol-tag wire handlers multiplexed
//! over the Transport Host's single bound endpoint.
//!
//! `content`/`avatar`/`site`/`docs` serve static-ish per-node facts;
//! `data` delegates to [`goop_data::DataOpEngine`]; `diag` and
//! `relay-refresh` expose operational state. `group`/`chat` streams are
//! routed by the caller directly to the Group Manager and never reach
//! [`Dispatcher::handle`].

mod avatar;
mod content;
mod data;
mod diag;
mod dispatcher;
mod docs;
mod error;
mod relay_refresh;
mod site;

pub use avatar::MAX_AVATAR_SIZE;
pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use docs::GroupChecker;
pub use error::{DispatchError, DispatchResult};
pub use site::{normalize_site_path, MAX_SITE_BODY};
