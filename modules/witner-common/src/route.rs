use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::Coordinate;

// --- Route shapes returned by the routing collaborator ---

/// A routing answer: zero or more alternative routes, best first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Directions {
    pub routes: Vec<Route>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub legs: Vec<RouteLeg>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteLeg {
    pub steps: Vec<RouteStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    pub distance_meters: f64,
    pub polyline: Vec<Coordinate>,
}

// --- Decomposed route pieces ---

/// A distance-annotated polyline; the unit handed to the buffer query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSection {
    pub distance: f64,
    pub polyline: Vec<Coordinate>,
}

/// One travel leg flattened into a single polyline, keeping its step sections.
#[derive(Debug, Clone, PartialEq)]
pub struct LegPath {
    pub total_distance: f64,
    pub polyline: Vec<Coordinate>,
    pub step_sections: Vec<RouteSection>,
}

/// Buffer-query answer for one section: ids of tracked points within the radius.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionMatch {
    pub section: RouteSection,
    pub matched_ids: HashSet<String>,
}
