// Test mocks for ranking and arbitration.
//
// Three mocks matching the outbound trait boundaries:
// - MockRouter (RouteProvider): destination → fixed Directions
// - MockBuffer (BufferQuery): section end point → matched incident ids
// - RecordingPoster (Poster): captures every post
//
// The store needs no mock; MemoryIncidentStore is used directly. YieldingStore
// wraps it to suspend before each transaction so concurrent arbitrations
// interleave at the points where they read and commit.
// Plus fixture builders for users, incidents, responses and routes.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use witner_common::{
    Coordinate, Directions, Incident, PriorityTrack, ReplyStats, Response, Route, RouteLeg,
    RouteSection, RouteStep, SectionMatch, TrackRegistry, UserRef,
};

use tokio::sync::broadcast;

use crate::index::IncidentChange;
use crate::store::memory::MemoryIncidentStore;
use crate::traits::{
    BufferQuery, IncidentStore, Poster, ReplyStatsEdit, ReplyTarget, RouteProvider, TxOutcome,
};

// ---------------------------------------------------------------------------
// Test constants
// ---------------------------------------------------------------------------

/// Kadikoy, Istanbul.
pub const KADIKOY: (f64, f64) = (40.9903, 29.0290);
/// Moda, Istanbul.
pub const MODA: (f64, f64) = (40.9786, 29.0255);
/// Uskudar, Istanbul.
pub const USKUDAR: (f64, f64) = (41.0234, 29.0152);

// ---------------------------------------------------------------------------
// MockRouter
// ---------------------------------------------------------------------------

/// Returns a fixed route per destination. Unregistered destinations are an error.
/// Builder pattern: `.on_route()`, `.failing()`.
pub struct MockRouter {
    routes: HashMap<String, Directions>,
    fail: bool,
    calls: AtomicUsize,
}

impl MockRouter {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// A router whose every request fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn on_route(mut self, destination: Coordinate, directions: Directions) -> Self {
        self.routes.insert(destination.to_string(), directions);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RouteProvider for MockRouter {
    async fn get_route(
        &self,
        _origin: Coordinate,
        destination: Coordinate,
        _departure_offset_minutes: u32,
    ) -> Result<Directions> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("MockRouter: routing service unavailable");
        }
        match self.routes.get(&destination.to_string()) {
            Some(directions) => Ok(directions.clone()),
            None => bail!("MockRouter: no route registered to {destination}"),
        }
    }
}

// ---------------------------------------------------------------------------
// MockBuffer
// ---------------------------------------------------------------------------

/// Matches incident ids per section, keyed by the section's last point.
/// Sections with nothing registered match nothing.
pub struct MockBuffer {
    matches: HashMap<String, HashSet<String>>,
    fail: bool,
}

impl MockBuffer {
    pub fn new() -> Self {
        Self {
            matches: HashMap::new(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn on_section(mut self, section_end: Coordinate, ids: &[&str]) -> Self {
        self.matches
            .entry(section_end.to_string())
            .or_default()
            .extend(ids.iter().map(|id| id.to_string()));
        self
    }
}

impl Default for MockBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BufferQuery for MockBuffer {
    async fn query(
        &self,
        sections: &[RouteSection],
        _radius_meters: f64,
    ) -> Result<Vec<SectionMatch>> {
        if self.fail {
            bail!("MockBuffer: buffer service unavailable");
        }
        Ok(sections
            .iter()
            .map(|section| SectionMatch {
                section: section.clone(),
                matched_ids: section
                    .polyline
                    .last()
                    .and_then(|end| self.matches.get(&end.to_string()))
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// RecordingPoster
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPost {
    pub body: String,
    pub reply_to: Option<ReplyTarget>,
}

/// Captures posts instead of publishing them.
#[derive(Default)]
pub struct RecordingPoster {
    posts: Mutex<Vec<RecordedPost>>,
    fail: bool,
}

impl RecordingPoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// A poster whose every post fails. Nothing is recorded.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn posts(&self) -> Vec<RecordedPost> {
        self.posts.lock().unwrap().clone()
    }

    /// Posts whose body starts with `lead`.
    pub fn posts_starting_with(&self, lead: &str) -> Vec<RecordedPost> {
        self.posts()
            .into_iter()
            .filter(|p| p.body.starts_with(lead))
            .collect()
    }
}

#[async_trait]
impl Poster for RecordingPoster {
    async fn post(&self, body: &str, reply_to: Option<&ReplyTarget>) -> Result<String> {
        if self.fail {
            bail!("RecordingPoster: delivery failed");
        }
        let mut posts = self.posts.lock().unwrap();
        posts.push(RecordedPost {
            body: body.to_string(),
            reply_to: reply_to.cloned(),
        });
        Ok(format!("post-{}", posts.len()))
    }
}

// ---------------------------------------------------------------------------
// YieldingStore
// ---------------------------------------------------------------------------

/// Delegates to a `MemoryIncidentStore`, yielding to the runtime before every
/// `update_reply_stats`. Driven with `futures::join!`, two arbitrations then
/// alternate transaction by transaction in a fixed order.
pub struct YieldingStore {
    inner: Arc<MemoryIncidentStore>,
}

impl YieldingStore {
    pub fn new(inner: Arc<MemoryIncidentStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl IncidentStore for YieldingStore {
    async fn incident(&self, id: &str) -> Result<Option<Incident>> {
        self.inner.incident(id).await
    }

    async fn incidents(&self) -> Result<Vec<Incident>> {
        self.inner.incidents().await
    }

    async fn upsert_incident(&self, incident: &Incident) -> Result<()> {
        self.inner.upsert_incident(incident).await
    }

    async fn record_response(&self, incident_id: &str, response: &Response) -> Result<()> {
        self.inner.record_response(incident_id, response).await
    }

    async fn update_reply_stats(
        &self,
        incident_id: &str,
        edit: &ReplyStatsEdit<'_>,
    ) -> Result<Option<TxOutcome>> {
        tokio::task::yield_now().await;
        self.inner.update_reply_stats(incident_id, edit).await
    }

    fn subscribe(&self) -> broadcast::Receiver<IncidentChange> {
        self.inner.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Fixed reference time so elapsed-time costs are reproducible.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 2, 6, 4, 17, 0).unwrap()
}

pub fn coord(point: (f64, f64)) -> Coordinate {
    Coordinate::new(point.0, point.1)
}

/// A user whose id and screen name are both `name`.
pub fn user(name: &str) -> UserRef {
    UserRef::new(name, name)
}

/// An unclaimed incident reported at `t0()`.
pub fn incident(id: &str, at: Coordinate) -> Incident {
    Incident {
        id: id.to_string(),
        coordinate: at,
        created_at: t0(),
        text: format!("enkaz altindayiz {id}"),
        user: user(&format!("reporter_{id}")),
        reply_stats: ReplyStats::default(),
    }
}

/// A reply to `incident_id` by `author`, one hour after `t0()`, with no location.
pub fn response(id: &str, author: &str, incident_id: &str, hashtags: &[&str]) -> Response {
    Response {
        id: id.to_string(),
        user: user(author),
        coordinate: None,
        text: hashtags
            .iter()
            .map(|t| format!("#{t}"))
            .collect::<Vec<_>>()
            .join(" "),
        hashtags: hashtags.iter().map(|t| t.to_string()).collect(),
        in_reply_to: incident_id.to_string(),
        created_at: t0() + chrono::Duration::hours(1),
    }
}

pub fn located(mut response: Response, at: Coordinate) -> Response {
    response.coordinate = Some(at);
    response
}

/// A single-leg route through `points`, one step per consecutive pair, with
/// great-circle step distances.
pub fn route_through(points: &[Coordinate]) -> Directions {
    let steps = points
        .windows(2)
        .map(|pair| RouteStep {
            distance_meters: pair[0].distance_to(&pair[1]),
            polyline: pair.to_vec(),
        })
        .collect();
    Directions {
        routes: vec![Route {
            legs: vec![RouteLeg { steps }],
        }],
    }
}

/// Straight one-step route.
pub fn straight_route(from: Coordinate, to: Coordinate) -> Directions {
    route_through(&[from, to])
}

/// completed=0, critical=1, urgent=2, onmyway=3, seen=5.
pub fn tracks() -> TrackRegistry {
    TrackRegistry::new(vec![
        PriorityTrack::new("completed", 0),
        PriorityTrack::new("critical", 1),
        PriorityTrack::new("urgent", 2),
        PriorityTrack::new("onmyway", 3),
        PriorityTrack::new("seen", 5),
    ])
}
