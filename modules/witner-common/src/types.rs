use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Geo Types ---

/// Mean equatorial radius used by the map tooling the posts are plotted with.
pub const EARTH_RADIUS_METERS: f64 = 6_378_137.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle distance to `other` in meters.
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        haversine_meters(self.lat, self.lng, other.lat, other.lng)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

/// Haversine great-circle distance between two lat/lng points in meters.
pub fn haversine_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let lat1_r = lat1.to_radians();
    let lat2_r = lat2.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1_r.cos() * lat2_r.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_METERS * c
}

// --- Users ---

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRef {
    pub user_id: String,
    pub screen_name: String,
}

impl UserRef {
    pub fn new(user_id: impl Into<String>, screen_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            screen_name: screen_name.into(),
        }
    }

    pub fn same_user(&self, other: &UserRef) -> bool {
        self.user_id == other.user_id
    }
}

/// Public link to a post, used when quoting it in an outbound message.
pub fn status_url(screen_name: &str, post_id: &str) -> String {
    format!("https://twitter.com/{screen_name}/status/{post_id}")
}

// --- Priority tracks ---

/// A configured hashtag with an urgency rank. Lower numbers are more urgent;
/// priority 0 is the resolved/completed track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityTrack {
    pub tag: String,
    pub priority: u32,
}

impl PriorityTrack {
    pub const RESOLVED_PRIORITY: u32 = 0;

    pub fn new(tag: impl Into<String>, priority: u32) -> Self {
        Self {
            tag: tag.into(),
            priority,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.priority == Self::RESOLVED_PRIORITY
    }
}

// --- Claims ---

/// The single current authoritative claim on an incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualifiedStatus {
    pub tag: String,
    pub priority: u32,
    pub response_id: String,
    pub user: UserRef,
}

impl QualifiedStatus {
    pub fn new(track: &PriorityTrack, response: &Response) -> Self {
        Self {
            tag: track.tag.clone(),
            priority: track.priority,
            response_id: response.id.clone(),
            user: response.user.clone(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.priority == PriorityTrack::RESOLVED_PRIORITY
    }

    pub fn url(&self) -> String {
        status_url(&self.user.screen_name, &self.response_id)
    }
}

/// Append-only ledger entry for every response that carried a recognized track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualifiedReplyRecord {
    pub tag: String,
    pub priority: u32,
    pub response_id: String,
    pub user: UserRef,
}

impl From<&QualifiedStatus> for QualifiedReplyRecord {
    fn from(status: &QualifiedStatus) -> Self {
        Self {
            tag: status.tag.clone(),
            priority: status.priority,
            response_id: status.response_id.clone(),
            user: status.user.clone(),
        }
    }
}

/// Mutable reply bookkeeping attached to an incident.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplyStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_qualified_status: Option<QualifiedStatus>,
    #[serde(default)]
    pub qualified_replies: Vec<QualifiedReplyRecord>,
    /// Ids of responses that matched no configured track.
    #[serde(default)]
    pub replies: Vec<String>,
}

// --- Posts ---

/// A located post reporting a hazard or a call for help ("witneet").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub coordinate: Coordinate,
    pub created_at: DateTime<Utc>,
    pub text: String,
    pub user: UserRef,
    #[serde(default)]
    pub reply_stats: ReplyStats,
}

impl Incident {
    pub fn current_status(&self) -> Option<&QualifiedStatus> {
        self.reply_stats.current_qualified_status.as_ref()
    }

    pub fn url(&self) -> String {
        status_url(&self.user.screen_name, &self.id)
    }
}

/// A post replying to an incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub user: UserRef,
    #[serde(default)]
    pub coordinate: Option<Coordinate>,
    pub text: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    pub in_reply_to: String,
    pub created_at: DateTime<Utc>,
}

impl Response {
    pub fn url(&self) -> String {
        status_url(&self.user.screen_name, &self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_istanbul_short_hop() {
        // Two points on the same street in Kadikoy, roughly 620m apart.
        let d = haversine_meters(40.97827, 29.06840, 40.974855, 29.074265);
        assert!(d > 500.0 && d < 700.0, "Expected ~620m, got {d}m");
    }

    #[test]
    fn distance_is_symmetric_and_zero_on_self() {
        let a = Coordinate::new(40.93117, 28.91240);
        let b = Coordinate::new(40.98243, 29.06198);
        assert_eq!(a.distance_to(&a), 0.0);
        assert!((a.distance_to(&b) - b.distance_to(&a)).abs() < 1e-6);
    }

    #[test]
    fn coordinate_displays_as_lat_lng_pair() {
        assert_eq!(Coordinate::new(40.5, 29.25).to_string(), "40.5,29.25");
    }

    #[test]
    fn reply_stats_tolerate_missing_fields() {
        let stats: ReplyStats = serde_json::from_str("{}").unwrap();
        assert!(stats.current_qualified_status.is_none());
        assert!(stats.qualified_replies.is_empty());
    }
}
