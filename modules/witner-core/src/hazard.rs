//! Hazard along the route from a responder to a candidate incident.
//!
//! Hazard is the distance-weighted density of other open incidents within the
//! buffer radius of each route section: a short section crowded with reports
//! weighs only its share of the route, so it cannot outweigh a long section
//! carrying the same absolute count.

use std::sync::Arc;

use tracing::debug;

use directions_client::polyline;
use witner_common::{AnalysisConfig, Coordinate, Incident, SectionMatch};

use crate::error::AnalysisError;
use crate::route;
use crate::traits::{BufferQuery, RouteProvider};

/// Route length and hazard for one candidate incident.
#[derive(Debug, Clone, PartialEq)]
pub struct HazardReport {
    pub incident: Incident,
    pub total_distance: f64,
    pub total_hazard: f64,
}

pub struct HazardEvaluator {
    router: Arc<dyn RouteProvider>,
    buffer: Arc<dyn BufferQuery>,
    departure_offset_minutes: u32,
    buffer_radius_meters: f64,
}

impl HazardEvaluator {
    pub fn new(
        router: Arc<dyn RouteProvider>,
        buffer: Arc<dyn BufferQuery>,
        config: &AnalysisConfig,
    ) -> Self {
        Self {
            router,
            buffer,
            departure_offset_minutes: config.departure_offset_minutes,
            buffer_radius_meters: config.buffer_radius_meters,
        }
    }

    /// Route from `origin` to `candidate`, buffer-query each step section and
    /// aggregate the hazard. Collaborator failures propagate; there is no local retry.
    /// A candidate the router cannot reach (no route, or a route with no steps)
    /// is `NoRoute`.
    pub async fn evaluate(
        &self,
        origin: Coordinate,
        candidate: &Incident,
    ) -> Result<HazardReport, AnalysisError> {
        let directions = self
            .router
            .get_route(origin, candidate.coordinate, self.departure_offset_minutes)
            .await
            .map_err(AnalysisError::RoutingUnavailable)?;

        let sections = route::sections(&directions)?;
        if sections.is_empty() {
            return Err(AnalysisError::NoRoute(candidate.id.clone()));
        }

        let matches = self
            .buffer
            .query(&sections, self.buffer_radius_meters)
            .await
            .map_err(AnalysisError::BufferQueryFailed)?;

        let (total_distance, total_hazard) = aggregate(&candidate.id, matches);

        debug!(
            incident = %candidate.id,
            text = %candidate.text,
            sections = sections.len(),
            total_distance,
            total_hazard,
            "Hazard evaluated"
        );

        Ok(HazardReport {
            incident: candidate.clone(),
            total_distance,
            total_hazard,
        })
    }
}

/// Sum section distances, then weight each section's match count by its share
/// of the total. The candidate never counts as a hazard on its own route.
/// Returns `(total_distance, total_hazard)`; a zero-length route has zero hazard.
pub fn aggregate(candidate_id: &str, matches: Vec<SectionMatch>) -> (f64, f64) {
    let total_distance: f64 = matches.iter().map(|m| m.section.distance).sum();

    let total_hazard = matches
        .into_iter()
        .map(|mut m| {
            m.matched_ids.remove(candidate_id);

            let multiplier = if total_distance > 0.0 {
                m.section.distance / total_distance
            } else {
                0.0
            };
            let hazard = multiplier * m.matched_ids.len() as f64;

            debug!(
                section_distance = m.section.distance,
                multiplier,
                hazard_count = m.matched_ids.len(),
                section_hazard = hazard,
                section = %polyline::encode(
                    &m.section.polyline.iter().map(|c| (c.lat, c.lng)).collect::<Vec<_>>()
                ),
                "Section hazard"
            );
            hazard
        })
        .sum();

    (total_distance, total_hazard)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use witner_common::RouteSection;

    use super::*;

    fn section(distance: f64, ids: &[&str]) -> SectionMatch {
        SectionMatch {
            section: RouteSection {
                distance,
                polyline: vec![Coordinate::new(40.0, 29.0), Coordinate::new(40.001, 29.0)],
            },
            matched_ids: ids.iter().map(|s| s.to_string()).collect::<HashSet<_>>(),
        }
    }

    #[test]
    fn hazard_is_distance_weighted() {
        // 300m with two reports, 100m with four: 0.75 * 2 + 0.25 * 4.
        let (distance, hazard) =
            aggregate("cand", vec![section(300.0, &["a", "b"]), section(100.0, &["c", "d", "e", "f"])]);
        assert_eq!(distance, 400.0);
        assert!((hazard - 2.5).abs() < 1e-12);
    }

    #[test]
    fn candidate_is_not_its_own_hazard() {
        let (_, with_self) = aggregate("cand", vec![section(100.0, &["cand", "a"])]);
        let (_, without_self) = aggregate("cand", vec![section(100.0, &["a"])]);
        assert_eq!(with_self, without_self);
        assert_eq!(with_self, 1.0);
    }

    #[test]
    fn no_matches_means_zero_hazard() {
        let (distance, hazard) = aggregate("cand", vec![section(120.0, &[]), section(80.0, &["cand"])]);
        assert_eq!(distance, 200.0);
        assert_eq!(hazard, 0.0);

        assert_eq!(aggregate("cand", Vec::new()), (0.0, 0.0));
    }

    #[test]
    fn zero_length_route_has_zero_hazard() {
        let (distance, hazard) = aggregate("cand", vec![section(0.0, &["a", "b"])]);
        assert_eq!(distance, 0.0);
        assert_eq!(hazard, 0.0);
    }
}
