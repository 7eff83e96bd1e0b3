//! Holds the current agent graph snapshot.

use std::sync::Arc;

use wws_comms_protocol::{Node, Topology};

use crate::backend::CommsBackend;
use crate::update::{UpdateSender, ViewUpdate};
use crate::ViewError;

/// Current topology snapshot. Always replaced wholesale, never patched.
#[derive(Debug, Default)]
pub struct TopologyStore {
    current: Arc<Topology>,
    /// Number of snapshots applied since creation.
    revision: u64,
    /// Sequence number of the last background refresh issued.
    issued: u64,
    /// Refreshes numbered at or below this are older than the current
    /// snapshot.
    applied: u64,
}

impl TopologyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the current snapshot.
    pub fn snapshot(&self) -> Arc<Topology> {
        Arc::clone(&self.current)
    }

    pub fn topology(&self) -> &Topology {
        &self.current
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Install `topology`. Refreshes still in flight are older than it and
    /// will be dropped when they land.
    pub fn replace(&mut self, topology: Topology) {
        self.install(topology);
        self.applied = self.issued;
    }

    fn install(&mut self, topology: Topology) {
        self.current = Arc::new(topology);
        self.revision += 1;
    }

    pub fn clear(&mut self) {
        self.replace(Topology::default());
    }

    /// Fetch and install a snapshot. The caller surfaces any error.
    pub async fn load(&mut self, backend: &dyn CommsBackend) -> Result<Arc<Topology>, ViewError> {
        let topology = backend.fetch_topology().await?;
        self.replace(topology);
        Ok(self.snapshot())
    }

    /// Best-effort background refresh. The fetch runs as its own task and
    /// reports back as [`ViewUpdate::TopologyFetched`] tagged with `session`
    /// and the returned sequence number.
    pub fn refresh(
        &mut self,
        backend: Arc<dyn CommsBackend>,
        session: u64,
        updates: UpdateSender,
    ) -> u64 {
        let seq = self.next_seq();
        tokio::spawn(async move {
            let result = backend.fetch_topology().await;
            // The receiver is gone once the view is dropped; nothing to do.
            let _ = updates.send(ViewUpdate::TopologyFetched {
                session,
                seq,
                result,
            });
        });
        seq
    }

    fn next_seq(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Apply the outcome of refresh `seq`. Results older than the current
    /// snapshot are dropped. Failures are swallowed and the previous snapshot
    /// stays authoritative. Returns whether the snapshot changed.
    pub fn apply_refresh(&mut self, seq: u64, result: Result<Topology, ViewError>) -> bool {
        if seq <= self.applied {
            tracing::debug!(seq, applied = self.applied, "Dropping out-of-order topology refresh");
            return false;
        }
        match result {
            Ok(topology) => {
                self.install(topology);
                self.applied = seq;
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "Topology refresh failed; keeping last snapshot");
                false
            }
        }
    }

    pub fn roots(&self) -> Vec<&Node> {
        self.current.roots()
    }

    pub fn children_of(&self, id: &str) -> Vec<&Node> {
        self.current.children_of(id)
    }

    pub fn peers_of(&self, id: &str) -> Vec<&Node> {
        self.current.peers_of(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wws_comms_protocol::{Edge, NodeState};

    fn two_level() -> Topology {
        Topology::new(
            vec![
                Node::new("p", "parent", NodeState::Running),
                Node::new("c", "child", NodeState::Running),
            ],
            vec![Edge::parent_child("p", "c")],
        )
    }

    #[test]
    fn replace_swaps_the_whole_snapshot() {
        let mut store = TopologyStore::new();
        let before = store.snapshot();
        store.replace(two_level());
        assert!(before.is_empty());
        assert_eq!(store.topology().nodes.len(), 2);
        assert_eq!(store.revision(), 1);
        assert_eq!(store.roots().len(), 1);
        assert_eq!(store.children_of("p")[0].id, "c");
    }

    #[test]
    fn failed_refresh_keeps_last_snapshot() {
        let mut store = TopologyStore::new();
        store.replace(two_level());
        let seq = store.next_seq();
        let changed = store.apply_refresh(seq, Err(ViewError::Http("connection refused".into())));
        assert!(!changed);
        assert_eq!(store.topology(), &two_level());
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn successful_refresh_replaces() {
        let mut store = TopologyStore::new();
        store.replace(two_level());
        let seq = store.next_seq();
        assert!(store.apply_refresh(seq, Ok(Topology::default())));
        assert!(store.topology().is_empty());
        assert!(store.peers_of("p").is_empty());
    }

    #[test]
    fn older_refresh_landing_last_is_dropped() {
        let mut store = TopologyStore::new();
        let first = store.next_seq();
        let second = store.next_seq();

        assert!(store.apply_refresh(second, Ok(two_level())));
        assert!(!store.apply_refresh(first, Ok(Topology::default())));
        assert_eq!(store.topology(), &two_level());
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn failed_newer_refresh_does_not_block_older_result() {
        let mut store = TopologyStore::new();
        let first = store.next_seq();
        let second = store.next_seq();

        assert!(!store.apply_refresh(second, Err(ViewError::Http("reset".into()))));
        assert!(store.apply_refresh(first, Ok(two_level())));
        assert_eq!(store.topology().nodes.len(), 2);
    }

    #[test]
    fn replace_supersedes_refreshes_in_flight() {
        let mut store = TopologyStore::new();
        let pending = store.next_seq();
        store.replace(two_level());

        assert!(!store.apply_refresh(pending, Ok(Topology::default())));
        assert_eq!(store.topology(), &two_level());
    }
}
