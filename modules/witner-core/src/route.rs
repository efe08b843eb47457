//! Route decomposition.
//!
//! Turns a routing answer into distance-annotated polylines: one merged
//! polyline per leg, plus the per-step sections the buffer query runs on.

use witner_common::{Directions, LegPath, RouteLeg, RouteSection, RouteStep};

use crate::error::AnalysisError;

fn step_section(step: &RouteStep) -> Result<RouteSection, AnalysisError> {
    if step.polyline.is_empty() {
        return Err(AnalysisError::MalformedRoute(
            "route step has an empty polyline".to_string(),
        ));
    }
    Ok(RouteSection {
        distance: step.distance_meters,
        polyline: step.polyline.clone(),
    })
}

/// Flatten one leg. Consecutive steps share an endpoint, so each step
/// contributes all but its last point; the final step's last point closes
/// the polyline.
pub fn leg_path(leg: &RouteLeg) -> Result<LegPath, AnalysisError> {
    let step_sections = leg
        .steps
        .iter()
        .map(step_section)
        .collect::<Result<Vec<_>, _>>()?;

    let last_point = step_sections
        .last()
        .and_then(|s| s.polyline.last())
        .copied()
        .ok_or_else(|| AnalysisError::MalformedRoute("route leg has no steps".to_string()))?;

    let total_distance = step_sections.iter().map(|s| s.distance).sum();

    let mut polyline = Vec::with_capacity(step_sections.iter().map(|s| s.polyline.len()).sum());
    for section in &step_sections {
        polyline.extend_from_slice(&section.polyline[..section.polyline.len() - 1]);
    }
    polyline.push(last_point);

    Ok(LegPath {
        total_distance,
        polyline,
        step_sections,
    })
}

/// Leg paths of the first (best) route. `None` when there is no route.
pub fn leg_paths(directions: &Directions) -> Result<Option<Vec<LegPath>>, AnalysisError> {
    let Some(route) = directions.routes.first() else {
        return Ok(None);
    };
    route.legs.iter().map(leg_path).collect::<Result<Vec<_>, _>>().map(Some)
}

/// All step sections of the first route's legs, in travel order.
/// Empty when there is no route; this is not an error.
pub fn sections(directions: &Directions) -> Result<Vec<RouteSection>, AnalysisError> {
    Ok(leg_paths(directions)?
        .unwrap_or_default()
        .into_iter()
        .flat_map(|leg| leg.step_sections)
        .collect())
}

#[cfg(test)]
mod tests {
    use witner_common::{Coordinate, Route};

    use super::*;

    fn c(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng)
    }

    fn step(distance: f64, points: &[(f64, f64)]) -> RouteStep {
        RouteStep {
            distance_meters: distance,
            polyline: points.iter().map(|&(lat, lng)| c(lat, lng)).collect(),
        }
    }

    fn three_step_leg() -> RouteLeg {
        RouteLeg {
            steps: vec![
                step(100.0, &[(1.0, 1.0), (1.0, 2.0), (1.0, 3.0)]),
                step(50.0, &[(1.0, 3.0), (2.0, 3.0)]),
                step(25.0, &[(2.0, 3.0), (2.0, 4.0), (3.0, 4.0), (4.0, 4.0)]),
            ],
        }
    }

    #[test]
    fn merged_polyline_drops_shared_endpoints() {
        let leg = three_step_leg();
        let path = leg_path(&leg).unwrap();

        let raw_points: usize = leg.steps.iter().map(|s| s.polyline.len()).sum();
        assert_eq!(path.polyline.len(), raw_points - (leg.steps.len() - 1));
        assert_eq!(
            path.polyline,
            vec![
                c(1.0, 1.0),
                c(1.0, 2.0),
                c(1.0, 3.0),
                c(2.0, 3.0),
                c(2.0, 4.0),
                c(3.0, 4.0),
                c(4.0, 4.0),
            ]
        );
        assert_eq!(path.polyline.last(), Some(&c(4.0, 4.0)));
        assert_eq!(path.total_distance, 175.0);
        assert_eq!(path.step_sections.len(), 3);
    }

    #[test]
    fn single_point_step_is_accepted() {
        let leg = RouteLeg {
            steps: vec![step(0.0, &[(5.0, 5.0)])],
        };
        let path = leg_path(&leg).unwrap();
        assert_eq!(path.polyline, vec![c(5.0, 5.0)]);
    }

    #[test]
    fn leg_without_steps_is_malformed() {
        let err = leg_path(&RouteLeg { steps: vec![] }).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedRoute(_)));
    }

    #[test]
    fn step_without_points_is_malformed() {
        let leg = RouteLeg {
            steps: vec![step(10.0, &[(1.0, 1.0), (1.0, 2.0)]), step(10.0, &[])],
        };
        assert!(matches!(leg_path(&leg), Err(AnalysisError::MalformedRoute(_))));
    }

    #[test]
    fn sections_flatten_first_route_only() {
        let directions = Directions {
            routes: vec![
                Route {
                    legs: vec![three_step_leg(), RouteLeg { steps: vec![step(5.0, &[(4.0, 4.0), (4.0, 5.0)])] }],
                },
                Route {
                    legs: vec![RouteLeg { steps: vec![step(999.0, &[(9.0, 9.0)])] }],
                },
            ],
        };

        let sections = sections(&directions).unwrap();
        let distances: Vec<f64> = sections.iter().map(|s| s.distance).collect();
        assert_eq!(distances, vec![100.0, 50.0, 25.0, 5.0]);
    }

    #[test]
    fn no_routes_means_no_sections() {
        assert!(sections(&Directions::default()).unwrap().is_empty());

        let no_legs = Directions {
            routes: vec![Route { legs: vec![] }],
        };
        assert!(sections(&no_legs).unwrap().is_empty());
    }
}
