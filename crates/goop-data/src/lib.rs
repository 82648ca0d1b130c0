//! Data protocol op dispatcher (§4.G).
//!
//! Translates JSON-line requests arriving on `/goop/data/1.0.0` (or a
//! local caller's own requests) into [`goop_store::Store`] calls,
//! enforcing caller-ID scoping and per-table insert policy along the
//! way, and bridging `lua-call`/`lua-list` to a host-supplied
//! [`LuaDispatcher`].

mod engine;
mod error;
mod lua;
mod request;

pub use engine::{Caller, DataOpEngine};
pub use error::{DataOpError, DataOpResult};
pub use lua::LuaDispatcher;
pub use request::{ColumnDefReq, DataRequest, DataResponse};
