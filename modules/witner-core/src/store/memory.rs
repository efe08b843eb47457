//! Process-local synchronized store.
//!
//! Every incident node carries a version. Reply-stats transactions read a
//! node, run the edit on a copy outside the lock, and commit only if the
//! version is unchanged; a lost race re-runs the edit against the winner's
//! state. Each commit is published on the change feed.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

use witner_common::{Incident, Response};

use crate::index::IncidentChange;
use crate::traits::{IncidentStore, ReplyStatsEdit, TxOutcome};

/// Attempts before a contended transaction gives up.
pub const MAX_TRANSACTION_ATTEMPTS: usize = 25;

const CHANGE_FEED_CAPACITY: usize = 1024;

#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("transaction on {incident_id} lost {attempts} consecutive races")]
    RetriesExhausted { incident_id: String, attempts: usize },
}

struct VersionedIncident {
    version: u64,
    incident: Incident,
}

#[derive(Default)]
struct Inner {
    incidents: HashMap<String, VersionedIncident>,
    responses: HashMap<String, Vec<Response>>,
}

pub struct MemoryIncidentStore {
    inner: Mutex<Inner>,
    changes: broadcast::Sender<IncidentChange>,
}

impl Default for MemoryIncidentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIncidentStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            inner: Mutex::new(Inner::default()),
            changes,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Writes replace whole nodes, so a poisoned lock still holds consistent data.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, change: IncidentChange) {
        // No subscribers is fine.
        let _ = self.changes.send(change);
    }

    /// Insert or replace an incident, bumping its version.
    pub fn put_incident(&self, incident: Incident) {
        let change = {
            let mut inner = self.lock();
            match inner.incidents.get_mut(&incident.id) {
                Some(node) => {
                    node.version += 1;
                    node.incident = incident.clone();
                    IncidentChange::Changed(incident)
                }
                None => {
                    inner.incidents.insert(
                        incident.id.clone(),
                        VersionedIncident {
                            version: 0,
                            incident: incident.clone(),
                        },
                    );
                    IncidentChange::Added(incident)
                }
            }
        };
        self.publish(change);
    }

    pub fn remove_incident(&self, id: &str) -> Option<Incident> {
        let removed = self.lock().incidents.remove(id).map(|node| node.incident);
        if removed.is_some() {
            self.publish(IncidentChange::Removed(id.to_string()));
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<Incident> {
        self.lock().incidents.get(id).map(|node| node.incident.clone())
    }

    /// Every response recorded against `incident_id`, oldest first.
    pub fn responses_for(&self, incident_id: &str) -> Vec<Response> {
        self.lock()
            .responses
            .get(incident_id)
            .cloned()
            .unwrap_or_default()
    }

    fn transact(&self, incident_id: &str, edit: &ReplyStatsEdit<'_>) -> Result<Option<TxOutcome>> {
        for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
            let (version, mut stats) = {
                let inner = self.lock();
                match inner.incidents.get(incident_id) {
                    Some(node) => (node.version, node.incident.reply_stats.clone()),
                    None => return Ok(None),
                }
            };

            if !edit(&mut stats) {
                return Ok(Some(TxOutcome {
                    committed: false,
                    stats,
                }));
            }

            let committed = {
                let mut inner = self.lock();
                match inner.incidents.get_mut(incident_id) {
                    Some(node) if node.version == version => {
                        node.version += 1;
                        node.incident.reply_stats = stats.clone();
                        Some(node.incident.clone())
                    }
                    Some(_) => None,
                    None => return Ok(None),
                }
            };

            match committed {
                Some(incident) => {
                    self.publish(IncidentChange::Changed(incident));
                    return Ok(Some(TxOutcome {
                        committed: true,
                        stats,
                    }));
                }
                None => {
                    debug!(incident_id, attempt, "Reply stats write conflict, retrying");
                }
            }
        }

        Err(TransactionError::RetriesExhausted {
            incident_id: incident_id.to_string(),
            attempts: MAX_TRANSACTION_ATTEMPTS,
        }
        .into())
    }
}

#[async_trait]
impl IncidentStore for MemoryIncidentStore {
    async fn incident(&self, id: &str) -> Result<Option<Incident>> {
        Ok(self.get(id))
    }

    async fn incidents(&self) -> Result<Vec<Incident>> {
        Ok(self
            .lock()
            .incidents
            .values()
            .map(|node| node.incident.clone())
            .collect())
    }

    async fn upsert_incident(&self, incident: &Incident) -> Result<()> {
        self.put_incident(incident.clone());
        Ok(())
    }

    async fn record_response(&self, incident_id: &str, response: &Response) -> Result<()> {
        self.lock()
            .responses
            .entry(incident_id.to_string())
            .or_default()
            .push(response.clone());
        Ok(())
    }

    async fn update_reply_stats(
        &self,
        incident_id: &str,
        edit: &ReplyStatsEdit<'_>,
    ) -> Result<Option<TxOutcome>> {
        self.transact(incident_id, edit)
    }

    fn subscribe(&self) -> broadcast::Receiver<IncidentChange> {
        self.changes.subscribe()
    }
}
