//! Claim arbitration for incidents.
//!
//! Every response carrying a configured track is appended to the incident's
//! qualified-reply ledger. It then becomes the incident's current claim when
//! there is none, when it is strictly more urgent, or when its author already
//! holds the claim (self-correction). Taking a non-resolved claim releases the
//! author's claims on other incidents, and a successful claim with a location
//! triggers a search for a cheaper incident to attend instead.
//!
//! The per-incident write is one retryable read-check-write transaction. The
//! release of claims elsewhere is a series of independent per-incident
//! transactions and is not atomic with it: a crash in between can leave a
//! stale claim, which the author's next claim releases.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use tracing::{debug, info, warn};

use witner_common::{
    Incident, QualifiedReplyRecord, QualifiedStatus, ReplyStats, Response, TrackRegistry, UserRef,
};

use crate::index::IncidentIndex;
use crate::notify;
use crate::ranking::{CostRanker, CostResult};
use crate::traits::{IncidentStore, Poster, ReplyTarget};

/// What happened to the incident's claim.
#[derive(Debug, Clone, PartialEq)]
pub enum Arbitration {
    /// No configured track matched; recorded as a plain reply.
    Unqualified,
    /// The response is now the current claim, replacing `previous` if any.
    Qualified { previous: Option<QualifiedStatus> },
    /// An equally or more urgent claim by another user stands.
    Rejected { current: QualifiedStatus },
}

#[derive(Debug, Clone)]
pub struct HandledResponse {
    pub incident_id: String,
    pub arbitration: Arbitration,
    /// Incidents whose claim by the same author was released.
    pub cleared_claims: Vec<String>,
    /// Users told that the claim changed hands.
    pub notified_users: Vec<String>,
    /// Cheaper incident suggested to the responder.
    pub suggestion: Option<CostResult>,
}

impl HandledResponse {
    fn new(incident_id: &str, arbitration: Arbitration) -> Self {
        Self {
            incident_id: incident_id.to_string(),
            arbitration,
            cleared_claims: Vec::new(),
            notified_users: Vec::new(),
            suggestion: None,
        }
    }
}

/// Whether `candidate` takes over from `current`.
pub fn supersedes(current: Option<&QualifiedStatus>, candidate: &QualifiedStatus) -> bool {
    match current {
        None => true,
        Some(current) => {
            candidate.priority < current.priority || candidate.user.same_user(&current.user)
        }
    }
}

/// Distinct ledger authors to tell about a claim change, most recent first.
/// Only records that precede the new claim's own entry count; its author is
/// skipped.
pub fn broadcast_targets<'a>(
    ledger: &'a [QualifiedReplyRecord],
    response: &Response,
) -> Vec<&'a QualifiedReplyRecord> {
    let own = ledger
        .iter()
        .position(|record| record.response_id == response.id)
        .unwrap_or(ledger.len());
    let mut seen = HashSet::new();
    ledger[..own]
        .iter()
        .rev()
        .filter(|record| !record.user.same_user(&response.user))
        .filter(|record| seen.insert(record.user.user_id.clone()))
        .collect()
}

pub struct StatusArbiter {
    store: Arc<dyn IncidentStore>,
    index: Arc<IncidentIndex>,
    poster: Arc<dyn Poster>,
    ranker: CostRanker,
    tracks: TrackRegistry,
}

impl StatusArbiter {
    pub fn new(
        store: Arc<dyn IncidentStore>,
        index: Arc<IncidentIndex>,
        poster: Arc<dyn Poster>,
        ranker: CostRanker,
        tracks: TrackRegistry,
    ) -> Self {
        Self {
            store,
            index,
            poster,
            ranker,
            tracks,
        }
    }

    /// Look up the replied incident and arbitrate. `None` if it is unknown.
    pub async fn handle_response(&self, response: &Response) -> Result<Option<HandledResponse>> {
        let Some(incident) = self.store.incident(&response.in_reply_to).await? else {
            debug!(
                response = %response.id,
                in_reply_to = %response.in_reply_to,
                "Reply to unknown incident, ignoring"
            );
            return Ok(None);
        };
        self.handle_qualifying_response(&incident, response).await.map(Some)
    }

    pub async fn handle_qualifying_response(
        &self,
        incident: &Incident,
        response: &Response,
    ) -> Result<HandledResponse> {
        self.store.record_response(&incident.id, response).await?;

        let Some(track) = self.tracks.resolve(&response.hashtags).cloned() else {
            self.record_unqualified(incident, response).await?;
            return Ok(HandledResponse::new(&incident.id, Arbitration::Unqualified));
        };

        let status = QualifiedStatus::new(&track, response);
        let record = QualifiedReplyRecord::from(&status);
        let releases_others = !status.is_resolved();

        let ledger = self
            .store
            .update_reply_stats(&incident.id, &|stats: &mut ReplyStats| {
                stats.qualified_replies.push(record.clone());
                true
            })
            .await?
            .ok_or_else(|| anyhow!("incident {} disappeared", incident.id))?;

        let mut cleared_claims = Vec::new();
        let mut released = false;
        if releases_others && supersedes(ledger.stats.current_qualified_status.as_ref(), &status) {
            cleared_claims = self.clear_other_claims(&incident.id, &status.user).await?;
            released = true;
        }

        let previous: Mutex<Option<QualifiedStatus>> = Mutex::new(None);
        let outcome = self
            .store
            .update_reply_stats(&incident.id, &|stats: &mut ReplyStats| {
                if !supersedes(stats.current_qualified_status.as_ref(), &status) {
                    return false;
                }
                let replaced = stats.current_qualified_status.replace(status.clone());
                *previous.lock().unwrap_or_else(|p| p.into_inner()) = replaced;
                true
            })
            .await?
            .ok_or_else(|| anyhow!("incident {} disappeared", incident.id))?;

        if !outcome.committed {
            let Some(current) = outcome.stats.current_qualified_status else {
                bail!("claim on {} rejected with no current claim", incident.id);
            };
            info!(
                incident = %incident.id,
                response = %response.id,
                priority = status.priority,
                current_priority = current.priority,
                current_user = %current.user.screen_name,
                "Claim rejected"
            );
            self.post(notify::cannot_override(&current), ReplyTarget::from(response))
                .await;
            return Ok(HandledResponse::new(&incident.id, Arbitration::Rejected { current }));
        }

        // The commit-time check can disagree with the early read under contention.
        if releases_others && !released {
            match self.clear_other_claims(&incident.id, &status.user).await {
                Ok(cleared) => cleared_claims = cleared,
                Err(e) => warn!(
                    incident = %incident.id,
                    user = %status.user.screen_name,
                    error = %e,
                    "Failed to list incidents for claim release"
                ),
            }
        }

        let previous = previous.into_inner().unwrap_or_else(|p| p.into_inner());
        info!(
            incident = %incident.id,
            response = %response.id,
            tag = %status.tag,
            priority = status.priority,
            user = %status.user.screen_name,
            previous_priority = previous.as_ref().map(|p| p.priority),
            cleared = cleared_claims.len(),
            "Claim qualified"
        );

        let mut handled = HandledResponse::new(&incident.id, Arbitration::Qualified { previous });
        handled.cleared_claims = cleared_claims;
        handled.notified_users = self
            .broadcast_change(&outcome.stats.qualified_replies, response)
            .await;

        if releases_others {
            handled.suggestion = self.suggest_alternative(incident, response, &status).await;
        }

        Ok(handled)
    }

    async fn record_unqualified(&self, incident: &Incident, response: &Response) -> Result<()> {
        self.store
            .update_reply_stats(&incident.id, &|stats: &mut ReplyStats| {
                stats.replies.push(response.id.clone());
                true
            })
            .await?;
        debug!(incident = %incident.id, response = %response.id, "Unqualified reply recorded");
        Ok(())
    }

    /// Release `user`'s non-resolved claims on every other incident. Scans the
    /// store rather than the index, which may not have caught up with the
    /// author's latest commit. Each release re-checks its node inside its own
    /// transaction; failed releases are logged and skipped. Returns the ids of
    /// incidents released.
    async fn clear_other_claims(&self, incident_id: &str, user: &UserRef) -> Result<Vec<String>> {
        let incidents = self.store.incidents().await?;
        let mut cleared = Vec::new();

        for other in &incidents {
            if other.id == incident_id {
                continue;
            }
            let held = other
                .current_status()
                .is_some_and(|s| s.user.same_user(user) && !s.is_resolved());
            if !held {
                continue;
            }

            let result = self
                .store
                .update_reply_stats(&other.id, &|stats: &mut ReplyStats| {
                    let still_held = stats
                        .current_qualified_status
                        .as_ref()
                        .is_some_and(|s| s.user.same_user(user) && !s.is_resolved());
                    if still_held {
                        stats.current_qualified_status = None;
                    }
                    still_held
                })
                .await;

            match result {
                Ok(Some(outcome)) if outcome.committed => {
                    info!(incident = %other.id, user = %user.screen_name, "Released prior claim");
                    cleared.push(other.id.clone());
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(incident = %other.id, error = %e, "Failed to release prior claim");
                }
            }
        }

        Ok(cleared)
    }

    async fn broadcast_change(
        &self,
        ledger: &[QualifiedReplyRecord],
        response: &Response,
    ) -> Vec<String> {
        let body = notify::priority_changed(response);
        let mut notified = Vec::new();

        for record in broadcast_targets(ledger, response) {
            if self.post(body.clone(), ReplyTarget::from(record)).await {
                notified.push(record.user.user_id.clone());
            }
        }
        notified
    }

    async fn suggest_alternative(
        &self,
        incident: &Incident,
        response: &Response,
        status: &QualifiedStatus,
    ) -> Option<CostResult> {
        let origin = response.coordinate?;
        let snapshot = self.index.snapshot();

        match self
            .ranker
            .rank_cost(origin, incident, response, status, snapshot.values())
            .await
        {
            Ok(Some(alternative)) => {
                self.post(
                    notify::cheaper_alternative(&alternative.incident),
                    ReplyTarget::from(response),
                )
                .await;
                Some(alternative)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(
                    incident = %incident.id,
                    response = %response.id,
                    error = %e,
                    "Cost ranking failed, no suggestion"
                );
                None
            }
        }
    }

    /// Best-effort delivery. Returns whether the post went out.
    async fn post(&self, body: String, target: ReplyTarget) -> bool {
        match self.poster.post(&body, Some(&target)).await {
            Ok(_) => true,
            Err(e) => {
                warn!(to = %target.screen_name, error = %e, "Failed to deliver post");
                false
            }
        }
    }
}
