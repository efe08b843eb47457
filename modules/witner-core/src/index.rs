use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use witner_common::Incident;

use crate::traits::IncidentStore;

/// A change to the incident collection, keyed by incident id.
#[derive(Debug, Clone, PartialEq)]
pub enum IncidentChange {
    Added(Incident),
    Changed(Incident),
    Removed(String),
}

/// In-memory view of every known incident, kept current from the store's
/// change feed. Reads are lock-free snapshots; a snapshot stays consistent
/// even if changes land while it is being scanned.
pub struct IncidentIndex {
    inner: ArcSwap<HashMap<String, Incident>>,
}

impl Default for IncidentIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl IncidentIndex {
    pub fn new() -> Self {
        Self {
            inner: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    pub fn from_incidents(incidents: impl IntoIterator<Item = Incident>) -> Self {
        let map = incidents.into_iter().map(|i| (i.id.clone(), i)).collect();
        Self {
            inner: ArcSwap::from_pointee(map),
        }
    }

    /// Populate from the store's current contents.
    pub async fn load(store: &dyn IncidentStore) -> anyhow::Result<Self> {
        let incidents = store.incidents().await?;
        info!(incidents = incidents.len(), "Incident index loaded");
        Ok(Self::from_incidents(incidents))
    }

    pub fn snapshot(&self) -> Arc<HashMap<String, Incident>> {
        self.inner.load_full()
    }

    pub fn get(&self, id: &str) -> Option<Incident> {
        self.inner.load().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.load().is_empty()
    }

    pub fn apply(&self, change: IncidentChange) {
        self.inner.rcu(|current| {
            let mut next = HashMap::clone(current);
            match &change {
                IncidentChange::Added(incident) | IncidentChange::Changed(incident) => {
                    next.insert(incident.id.clone(), incident.clone());
                }
                IncidentChange::Removed(id) => {
                    next.remove(id);
                }
            }
            next
        });
    }

    /// Apply every change already queued on `rx` without waiting. Returns how many were applied.
    pub fn catch_up(&self, rx: &mut broadcast::Receiver<IncidentChange>) -> usize {
        let mut applied = 0;
        loop {
            match rx.try_recv() {
                Ok(change) => {
                    self.apply(change);
                    applied += 1;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Incident index lagged behind change feed");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return applied,
            }
        }
    }

    /// Spawn a task that applies changes from `rx` until the feed closes.
    pub fn spawn_follow(self: &Arc<Self>, mut rx: broadcast::Receiver<IncidentChange>) -> JoinHandle<()> {
        let index = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(change) => {
                        debug!(?change, "Applying incident change");
                        index.apply(change);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Incident index lagged behind change feed");
                    }
                    Err(RecvError::Closed) => {
                        info!("Incident change feed closed, index follow loop exiting");
                        return;
                    }
                }
            }
        });
        info!("Incident index follow loop started");
        handle
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use witner_common::{Coordinate, ReplyStats, UserRef};

    use super::*;

    fn incident(id: &str) -> Incident {
        Incident {
            id: id.to_string(),
            coordinate: Coordinate::new(40.98, 29.06),
            created_at: Utc::now(),
            text: format!("incident {id}"),
            user: UserRef::new("u1", "reporter"),
            reply_stats: ReplyStats::default(),
        }
    }

    #[test]
    fn apply_tracks_add_change_remove() {
        let index = IncidentIndex::new();
        index.apply(IncidentChange::Added(incident("a")));
        index.apply(IncidentChange::Added(incident("b")));
        assert_eq!(index.len(), 2);

        let mut changed = incident("a");
        changed.text = "updated".to_string();
        index.apply(IncidentChange::Changed(changed));
        assert_eq!(index.get("a").unwrap().text, "updated");

        index.apply(IncidentChange::Removed("b".to_string()));
        assert_eq!(index.len(), 1);
        assert!(index.get("b").is_none());
    }

    #[test]
    fn snapshot_is_stable_across_later_changes() {
        let index = IncidentIndex::from_incidents(vec![incident("a")]);
        let snapshot = index.snapshot();
        index.apply(IncidentChange::Removed("a".to_string()));

        assert!(snapshot.contains_key("a"));
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn catch_up_drains_queued_changes() {
        let (tx, mut rx) = broadcast::channel(16);
        let index = IncidentIndex::new();

        tx.send(IncidentChange::Added(incident("a"))).unwrap();
        tx.send(IncidentChange::Added(incident("b"))).unwrap();

        assert_eq!(index.catch_up(&mut rx), 2);
        assert_eq!(index.catch_up(&mut rx), 0);
        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn follow_loop_applies_until_closed() {
        let (tx, rx) = broadcast::channel(16);
        let index = Arc::new(IncidentIndex::new());
        let handle = index.spawn_follow(rx);

        tx.send(IncidentChange::Added(incident("a"))).unwrap();
        drop(tx);
        handle.await.unwrap();

        assert!(index.get("a").is_some());
    }
}
