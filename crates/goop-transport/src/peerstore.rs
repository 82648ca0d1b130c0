//! Shared, TTL'd address cache for dialing.
//!
//! This is the "peerstore" referenced throughout the spec: a process-wide
//! table of known multi-addresses per peer, with expiry, plus the
//! constructed-circuit-address injection used by both the Relay
//! Controller (§4.D) and Presence (§4.E). It is a shared resource per
//! §5 — every component that dials holds only a reference to it.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::NodeId;

/// Default TTL used for relay-address injection (§9(c) — keep the
/// 10-minute path, not the 2-minute one).
pub const CIRCUIT_ADDR_TTL: Duration = Duration::from_secs(10 * 60);

struct Entry {
    addr: String,
    expires_at: Instant,
}

/// TTL'd address book shared by Presence, the Relay Controller and the
/// Stream Dispatcher.
#[derive(Default)]
pub struct Peerstore {
    entries: Mutex<HashMap<NodeId, Vec<Entry>>>,
    /// Peers whose dial backoff was explicitly cleared since the last
    /// successful dial — observable for tests per EXPANSION D.2.
    backoff_cleared: Mutex<std::collections::HashSet<NodeId>>,
}

impl Peerstore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            backoff_cleared: Mutex::new(std::collections::HashSet::new()),
        }
    }

    /// Add or refresh addresses for a peer with the given TTL.
    pub fn add_addrs(&self, peer: NodeId, addrs: impl IntoIterator<Item = String>, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        let mut entries = self.entries.lock().unwrap();
        let slot = entries.entry(peer).or_default();
        for addr in addrs {
            if let Some(existing) = slot.iter_mut().find(|e| e.addr == addr) {
                existing.expires_at = expires_at;
            } else {
                slot.push(Entry { addr, expires_at });
            }
        }
    }

    /// Current, unexpired addresses for a peer.
    pub fn addrs(&self, peer: &NodeId) -> Vec<String> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        if let Some(slot) = entries.get_mut(peer) {
            slot.retain(|e| e.expires_at > now);
            slot.iter().map(|e| e.addr.clone()).collect()
        } else {
            Vec::new()
        }
    }

    /// Whether any current address for `peer` is a circuit address
    /// (`.../p2p-circuit` suffix).
    pub fn has_circuit_addr(&self, peer: &NodeId) -> bool {
        self.addrs(peer).iter().any(|a| a.ends_with("/p2p-circuit"))
    }

    /// Strip any trailing `/p2p/<relay-id>` suffix and encapsulate a
    /// circuit address for `relay_id`, per §4.D's injection algorithm.
    /// Skipped if `peer` already has a non-circuit (direct) connection —
    /// the caller is expected to check that before calling this.
    pub fn inject_circuit_addr(&self, peer: NodeId, relay_id: NodeId, relay_addrs: &[String]) {
        let circuit_addrs: Vec<String> = relay_addrs
            .iter()
            .map(|addr| {
                let stripped = strip_p2p_suffix(addr, &relay_id.to_string());
                format!("{stripped}/p2p/{relay_id}/p2p-circuit")
            })
            .collect();
        self.add_addrs(peer, circuit_addrs, CIRCUIT_ADDR_TTL);
    }

    /// Mark a peer's dial backoff as cleared — called whenever fresh
    /// addresses should win immediately (presence refresh, relay
    /// recovery). Idempotent and purely observational: the actual
    /// "backoff" is realized by evicting any cached dead connection in
    /// the `ConnectionPool`, which the caller does alongside this call.
    pub fn clear_backoff_hint(&self, peer: NodeId) {
        self.backoff_cleared.lock().unwrap().insert(peer);
    }

    /// Whether `clear_backoff_hint` has been called for `peer` (test hook).
    pub fn backoff_was_cleared(&self, peer: &NodeId) -> bool {
        self.backoff_cleared.lock().unwrap().contains(peer)
    }
}

fn strip_p2p_suffix(addr: &str, relay_id: &str) -> String {
    let suffix = format!("/p2p/{relay_id}");
    addr.strip_suffix(&suffix).unwrap_or(addr).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn node_id(seed: u8) -> NodeId {
        let mut rng = rand_for_test(seed);
        let secret = iroh::SecretKey::generate(&mut rng);
        NodeId::from_str(&secret.public().to_string()).unwrap()
    }

    fn rand_for_test(seed: u8) -> rand::rngs::StdRng {
        use rand::SeedableRng;
        rand::rngs::StdRng::seed_from_u64(seed as u64)
    }

    #[test]
    fn addrs_expire() {
        let store = Peerstore::new();
        let peer = node_id(1);
        store.add_addrs(peer, ["1.2.3.4:1234".to_string()], Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(store.addrs(&peer).is_empty());
    }

    #[test]
    fn inject_circuit_addr_strips_relay_p2p_suffix() {
        let store = Peerstore::new();
        let peer = node_id(1);
        let relay = node_id(2);
        let relay_addr = format!("/ip4/1.2.3.4/udp/9/quic/p2p/{relay}");
        store.inject_circuit_addr(peer, relay, &[relay_addr]);
        let addrs = store.addrs(&peer);
        assert_eq!(addrs.len(), 1);
        assert!(addrs[0].ends_with(&format!("/p2p/{relay}/p2p-circuit")));
        assert!(!addrs[0].contains(&format!("/p2p/{relay}/p2p/{relay}")));
        assert!(store.has_circuit_addr(&peer));
    }

    #[test]
    fn backoff_hint_is_observable() {
        let store = Peerstore::new();
        let peer = node_id(1);
        assert!(!store.backoff_was_cleared(&peer));
        store.clear_backoff_hint(peer);
        assert!(store.backoff_was_cleared(&peer));
    }
}
