use std::sync::Arc;

use async_trait::async_trait;
use goop_dispatch::GroupChecker;
use goop_transport::NodeId;

use crate::manager::GroupManager;

/// Adapter wiring the live [`GroupManager`] into the Stream Dispatcher's
/// `docs` handler (§6 `GroupChecker`). Kept out of `goop-dispatch` itself
/// to avoid a crate cycle — the dispatcher only needs the trait.
pub struct GroupManagerChecker(pub Arc<GroupManager>);

#[async_trait]
impl GroupChecker for GroupManagerChecker {
    async fn is_peer_in_group(&self, peer: NodeId, group_id: &str) -> bool {
        self.0.is_member(peer, group_id).await
    }

    async fn is_group_host(&self, group_id: &str) -> bool {
        self.0.is_host(group_id).await
    }
}
