use goop_transport::NodeId;

/// In-memory record of a known peer (§3 `PeerRecord`).
#[derive(Debug, Clone)]
pub struct PeerRecord {
    pub identity: NodeId,
    pub content: String,
    pub email: String,
    pub avatar_hash: String,
    pub video_disabled: bool,
    pub active_template: String,
    /// Set only by the rendezvous directory, never by presence gossip.
    pub verified: bool,
    pub last_seen: u64,
    pub reachable: bool,
    /// Cleared whenever an online/update presence arrives.
    pub offline_since: Option<u64>,
    /// Favorite records persist independently of the online cache.
    pub favorite: bool,
    pub addrs: Vec<String>,
}

impl PeerRecord {
    pub(crate) fn new(update: &PeerUpdate, verified: bool) -> Self {
        Self {
            identity: update.identity,
            content: update.content.clone(),
            email: update.email.clone(),
            avatar_hash: update.avatar_hash.clone(),
            video_disabled: update.video_disabled,
            active_template: update.active_template.clone(),
            verified,
            last_seen: update.last_seen,
            reachable: true,
            offline_since: None,
            favorite: false,
            addrs: update.addrs.clone(),
        }
    }

    /// Merge a fresh presence/directory update into this record. Clears
    /// `offline_since` and marks reachable. `verified` is only raised,
    /// never cleared, and only by a directory-sourced update.
    pub(crate) fn merge(&mut self, update: &PeerUpdate, verified_by_directory: bool) {
        self.content = update.content.clone();
        self.email = update.email.clone();
        self.avatar_hash = update.avatar_hash.clone();
        self.video_disabled = update.video_disabled;
        self.active_template = update.active_template.clone();
        self.last_seen = update.last_seen;
        self.addrs = update.addrs.clone();
        self.reachable = true;
        self.offline_since = None;
        if verified_by_directory {
            self.verified = true;
        }
    }
}

/// Fields carried by an online/update presence announcement, or a
/// directory-sourced peer listing. Does not include the bookkeeping
/// fields (`reachable`, `offline_since`, `favorite`) that only the Peer
/// Table itself manages.
#[derive(Debug, Clone)]
pub struct PeerUpdate {
    pub identity: NodeId,
    pub content: String,
    pub email: String,
    pub avatar_hash: String,
    pub video_disabled: bool,
    pub active_template: String,
    pub addrs: Vec<String>,
    pub last_seen: u64,
}
