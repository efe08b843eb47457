// Trait abstractions for the collaborators the core talks to.
//
// RouteProvider wraps the directions service, BufferQuery the polyline buffer
// service, IncidentStore the synchronized store, Poster outbound delivery.
// Mocks for all four live in `testing` so ranking and arbitration run with
// no network and no database.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

use witner_common::{
    Coordinate, Directions, Incident, ReplyStats, Response, Route, RouteLeg, RouteSection,
    RouteStep, SectionMatch,
};

use crate::index::IncidentChange;

// ---------------------------------------------------------------------------
// RouteProvider
// ---------------------------------------------------------------------------

#[async_trait]
pub trait RouteProvider: Send + Sync {
    /// Route from `origin` to `destination`, departing `departure_offset_minutes` from now.
    async fn get_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        departure_offset_minutes: u32,
    ) -> Result<Directions>;
}

#[async_trait]
impl RouteProvider for directions_client::DirectionsClient {
    async fn get_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        departure_offset_minutes: u32,
    ) -> Result<Directions> {
        let request = directions_client::DirectionsRequest::driving(
            origin.to_string(),
            destination.to_string(),
            chrono::Utc::now().timestamp(),
            departure_offset_minutes,
        );
        let routes = self.directions(&request).await?;

        Ok(Directions {
            routes: routes
                .into_iter()
                .map(|route| Route {
                    legs: route
                        .legs
                        .into_iter()
                        .map(|leg| RouteLeg {
                            steps: leg
                                .steps
                                .into_iter()
                                .map(|step| RouteStep {
                                    distance_meters: step.distance_meters,
                                    polyline: step
                                        .points
                                        .into_iter()
                                        .map(|(lat, lng)| Coordinate::new(lat, lng))
                                        .collect(),
                                })
                                .collect(),
                        })
                        .collect(),
                })
                .collect(),
        })
    }
}

// ---------------------------------------------------------------------------
// BufferQuery
// ---------------------------------------------------------------------------

#[async_trait]
pub trait BufferQuery: Send + Sync {
    /// One result per input section, in input order.
    async fn query(&self, sections: &[RouteSection], radius_meters: f64)
        -> Result<Vec<SectionMatch>>;
}

#[async_trait]
impl BufferQuery for buffer_client::BufferClient {
    async fn query(
        &self,
        sections: &[RouteSection],
        radius_meters: f64,
    ) -> Result<Vec<SectionMatch>> {
        let wire: Vec<buffer_client::BufferSection> = sections
            .iter()
            .map(|s| buffer_client::BufferSection {
                distance: s.distance,
                polyline: s.polyline.iter().map(|c| [c.lat, c.lng]).collect(),
            })
            .collect();

        let results = buffer_client::BufferClient::query(self, &wire, radius_meters).await?;

        Ok(sections
            .iter()
            .zip(results)
            .map(|(section, matches)| SectionMatch {
                section: section.clone(),
                matched_ids: matches.matched_ids.into_iter().collect::<HashSet<_>>(),
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// IncidentStore
// ---------------------------------------------------------------------------

/// Result of a reply-stats transaction.
#[derive(Debug, Clone)]
pub struct TxOutcome {
    /// Whether the edit was written.
    pub committed: bool,
    /// Stats after the edit if committed, otherwise as last read.
    pub stats: ReplyStats,
}

/// A reply-stats edit. Returns `true` to commit, `false` to abort without writing.
/// May be invoked more than once when the commit loses a race, so it must not
/// have side effects beyond the stats it is given.
pub type ReplyStatsEdit<'a> = dyn Fn(&mut ReplyStats) -> bool + Send + Sync + 'a;

#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Fetch one incident.
    async fn incident(&self, id: &str) -> Result<Option<Incident>>;

    /// All incidents, used to populate the in-memory index at startup.
    async fn incidents(&self) -> Result<Vec<Incident>>;

    /// Create or replace an incident.
    async fn upsert_incident(&self, incident: &Incident) -> Result<()>;

    /// Append a response to the incident's response ledger.
    async fn record_response(&self, incident_id: &str, response: &Response) -> Result<()>;

    /// Read-modify-write one incident's reply stats, retrying on write conflict.
    /// Returns `None` if the incident does not exist.
    async fn update_reply_stats(
        &self,
        incident_id: &str,
        edit: &ReplyStatsEdit<'_>,
    ) -> Result<Option<TxOutcome>>;

    /// Change feed for the incident collection.
    fn subscribe(&self) -> broadcast::Receiver<IncidentChange>;
}

// ---------------------------------------------------------------------------
// Poster
// ---------------------------------------------------------------------------

/// The post an outbound message replies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTarget {
    pub screen_name: String,
    pub post_id: String,
}

#[async_trait]
pub trait Poster: Send + Sync {
    /// Publish `body`, optionally as a reply. Returns the id of the new post.
    async fn post(&self, body: &str, reply_to: Option<&ReplyTarget>) -> Result<String>;
}
