use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use goop_data::DataOpEngine;
use goop_relay::RelayManager;
use goop_transport::{
    GoopNode, IncomingStream, NodeId, Peerstore, RelayInfo, PROTOCOL_AVATAR, PROTOCOL_CONTENT,
    PROTOCOL_DATA, PROTOCOL_DIAG, PROTOCOL_DOCS, PROTOCOL_RELAY_REFRESH, PROTOCOL_SITE,
};
use tokio::sync::RwLock;

use crate::docs::GroupChecker;
use crate::error::{DispatchError, DispatchResult};
use crate::{avatar, content, data, diag, docs, relay_refresh, site};

/// Static per-node facts the dispatcher serves on `content`/`avatar`/
/// `site`/`docs` (§4.F). Content and avatar are mutable at runtime (the
/// local user can change their status line or picture), so they are
/// held behind a lock; site/docs roots are fixed at construction.
pub struct DispatcherConfig {
    pub self_content: RwLock<String>,
    pub avatar: RwLock<Option<Vec<u8>>>,
    pub site_root: Option<PathBuf>,
    pub docs_root: Option<PathBuf>,
}

impl DispatcherConfig {
    pub fn new(self_content: String, avatar: Option<Vec<u8>>) -> Self {
        Self {
            self_content: RwLock::new(self_content),
            avatar: RwLock::new(avatar),
            site_root: None,
            docs_root: None,
        }
    }

    pub fn site_root(mut self, path: PathBuf) -> Self {
        self.site_root = Some(path);
        self
    }

    pub fn docs_root(mut self, path: PathBuf) -> Self {
        self.docs_root = Some(path);
        self
    }
}

/// Routes accepted streams to the per-tag handler (§4.F). Owns
/// everything a handler needs except the live [`GoopNode`] (passed per
/// call, since `diag` needs to query connection state).
pub struct Dispatcher {
    config: DispatcherConfig,
    data_engine: Arc<DataOpEngine>,
    group_checker: Arc<dyn GroupChecker>,
    relay_manager: Option<Arc<RelayManager>>,
    peerstore: Arc<Peerstore>,
    relay: Option<RelayInfo>,
    started_at: Instant,
}

impl Dispatcher {
    pub fn new(
        config: DispatcherConfig,
        data_engine: Arc<DataOpEngine>,
        group_checker: Arc<dyn GroupChecker>,
        relay_manager: Option<Arc<RelayManager>>,
        peerstore: Arc<Peerstore>,
        relay: Option<RelayInfo>,
    ) -> Self {
        Self {
            config,
            data_engine,
            group_checker,
            relay_manager,
            peerstore,
            relay,
            started_at: Instant::now(),
        }
    }

    /// Update the self-content line served on `content` (e.g. after the
    /// local user edits their status).
    pub async fn set_self_content(&self, content: String) {
        *self.config.self_content.write().await = content;
    }

    /// Dispatch one accepted stream to its protocol handler. `group`
    /// and `chat` tags are routed by the caller directly to the Group
    /// Manager and never reach here.
    pub async fn handle(
        &self,
        incoming: IncomingStream,
        node: &GoopNode,
        peer_table_size: usize,
    ) -> DispatchResult<()> {
        let tag = incoming.tag.clone();
        if tag == PROTOCOL_CONTENT {
            let content_snapshot = self.config.self_content.read().await.clone();
            content::serve(incoming, &content_snapshot).await
        } else if tag == PROTOCOL_AVATAR {
            let avatar_snapshot = self.config.avatar.read().await.clone();
            avatar::serve(incoming, avatar_snapshot.as_deref()).await
        } else if tag == PROTOCOL_SITE {
            let Some(root) = self.config.site_root.as_ref() else {
                return Err(DispatchError::NotFound);
            };
            site::serve(incoming, root).await
        } else if tag == PROTOCOL_DOCS {
            let Some(root) = self.config.docs_root.as_ref() else {
                return Err(DispatchError::NotFound);
            };
            docs::serve(incoming, root, self.group_checker.clone()).await
        } else if tag == PROTOCOL_DATA {
            data::serve(incoming, self.data_engine.clone()).await
        } else if tag == PROTOCOL_DIAG {
            diag::serve(
                incoming,
                node,
                self.started_at,
                self.relay_manager.as_ref(),
                peer_table_size,
            )
            .await
        } else if tag == PROTOCOL_RELAY_REFRESH {
            let Some(relay_manager) = self.relay_manager.as_ref() else {
                return Err(DispatchError::NotFound);
            };
            let Some(relay) = self.relay.as_ref() else {
                return Err(DispatchError::NotFound);
            };
            relay_refresh::serve(incoming, relay_manager, &self.peerstore, relay.relay_id).await
        } else {
            Err(DispatchError::Io(format!(
                "unhandled protocol tag: {}",
                String::from_utf8_lossy(&tag)
            )))
        }
    }

    /// Fetch a remote peer's site file, with the automatic relay
    /// recovery retry (§4.F).
    pub async fn fetch_site_file(
        &self,
        node: &GoopNode,
        peer: NodeId,
        path: &str,
    ) -> DispatchResult<(String, Vec<u8>)> {
        site::fetch(node, peer, path, self.relay.as_ref()).await
    }

    /// Fetch a remote peer's avatar.
    pub async fn fetch_avatar(&self, node: &GoopNode, peer: NodeId) -> DispatchResult<Option<Vec<u8>>> {
        avatar::fetch(node, peer).await
    }
}
