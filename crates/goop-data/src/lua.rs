use async_trait::async_trait;
use goop_transport::NodeId;
use serde_json::Value as Json;

/// Bridge to the host application's scripted `data-function` handlers
/// (§4.G `lua-call`/`lua-list`). `goop-data` only knows how to call into
/// it; it does not own the scripting runtime itself.
#[async_trait]
pub trait LuaDispatcher: Send + Sync {
    /// Invoke a named function with `params`, attributing the call to
    /// `caller_id` (the node identity on the other end of the stream, or
    /// self for a local call). Returns the function's JSON result, or a
    /// human-readable error message to surface verbatim to the caller.
    async fn call_function(&self, caller_id: NodeId, name: &str, params: Json) -> Result<Json, String>;

    /// Names of functions currently registered, for `lua-list`.
    fn list_data_functions(&self) -> Vec<String>;

    /// Re-scan the function directory for additions/removals. Called on
    /// a timer by the host; exposed here so `DataOpEngine` can expose a
    /// manual rescan op if the host wires one up.
    fn rescan_functions(&self);
}
