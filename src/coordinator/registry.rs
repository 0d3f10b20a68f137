//! Storage node registry
//!
//! Tracks every known storage node by its canonical address together with the
//! instant of its last heartbeat. All access goes through the methods below;
//! the lock never escapes this module.

use crate::common::normalize_node_address;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct NodeRegistry {
    // BTreeMap so snapshots come out in a stable order
    nodes: RwLock<BTreeMap<String, Instant>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node or refresh its heartbeat.
    ///
    /// The address is normalized first, so `[::1]:6000` and `127.0.0.1:6000`
    /// are the same node. Returns the canonical address and whether the node
    /// was previously unknown.
    pub fn register(&self, address: &str, now: Instant) -> (String, bool) {
        let address = normalize_node_address(address);
        let previous = self.nodes.write().insert(address.clone(), now);
        (address, previous.is_none())
    }

    /// Snapshot of the live node addresses, sorted
    pub fn active_addresses(&self) -> Vec<String> {
        self.nodes.read().keys().cloned().collect()
    }

    /// Remove every node whose last heartbeat is more than `timeout` before `now`.
    ///
    /// Returns the evicted addresses. The write lock is released before this
    /// returns.
    pub fn evict_stale(&self, now: Instant, timeout: Duration) -> Vec<String> {
        let mut nodes = self.nodes.write();
        let stale: Vec<String> = nodes
            .iter()
            .filter(|(_, last_seen)| now.saturating_duration_since(**last_seen) > timeout)
            .map(|(address, _)| address.clone())
            .collect();
        for address in &stale {
            nodes.remove(address);
        }
        stale
    }

    pub fn contains(&self, address: &str) -> bool {
        self.nodes
            .read()
            .contains_key(&normalize_node_address(address))
    }

    /// Time since the node's last heartbeat, if it is registered
    pub fn last_seen_ago(&self, address: &str, now: Instant) -> Option<Duration> {
        self.nodes
            .read()
            .get(&normalize_node_address(address))
            .map(|last_seen| now.saturating_duration_since(*last_seen))
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}
