//! Multi-criteria cost ranking of candidate incidents.
//!
//! Length and elapsed time are normalized against the largest value among
//! the candidates and scaled onto `0..=likert_scale`; hazard is already a
//! density and is used as is. Each term is multiplied by its weight share
//! and the cheapest candidate wins.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use tracing::{debug, info};

use witner_common::{AnalysisConfig, Coordinate, CostWeights, Incident, QualifiedStatus, Response};

use crate::candidates::CandidateSelector;
use crate::error::AnalysisError;
use crate::hazard::{HazardEvaluator, HazardReport};

const MILLIS_PER_HOUR: f64 = 1000.0 * 60.0 * 60.0;

/// Raw criteria for one candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostInputs {
    pub total_distance: f64,
    /// Hours since the incident was reported.
    pub total_time: f64,
    pub total_hazard: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostBreakdown {
    pub length_cost: f64,
    pub time_cost: f64,
    pub hazard_cost: f64,
    pub total: f64,
}

/// The cheapest alternative found by a ranking pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CostResult {
    pub incident: Incident,
    pub total_distance: f64,
    pub total_hazard: f64,
    pub total_time: f64,
    pub cost: CostBreakdown,
}

/// Hours from `reported_at` to `at`, never negative.
pub fn elapsed_hours(reported_at: DateTime<Utc>, at: DateTime<Utc>) -> f64 {
    ((at - reported_at).num_milliseconds() as f64 / MILLIS_PER_HOUR).max(0.0)
}

fn ratio(value: f64, max: f64) -> f64 {
    if max > 0.0 {
        value / max
    } else {
        0.0
    }
}

/// Score every candidate. A zero maximum distance or time makes that ratio zero.
pub fn score_all(inputs: &[CostInputs], weights: &CostWeights, likert_scale: f64) -> Vec<CostBreakdown> {
    let max_distance = inputs.iter().map(|i| i.total_distance).fold(0.0, f64::max);
    let max_time = inputs.iter().map(|i| i.total_time).fold(0.0, f64::max);

    debug!(
        length_weight = weights.length,
        time_weight = weights.time,
        hazard_weight = weights.hazard,
        max_distance_meters = max_distance,
        max_time_hours = max_time,
        "Cost reference parameters"
    );

    inputs
        .iter()
        .map(|input| {
            let length_cost = ratio(input.total_distance, max_distance) * likert_scale * weights.length;
            let time_cost = ratio(input.total_time, max_time) * likert_scale * weights.time;
            let hazard_cost = input.total_hazard * weights.hazard;
            CostBreakdown {
                length_cost,
                time_cost,
                hazard_cost,
                total: length_cost + time_cost + hazard_cost,
            }
        })
        .collect()
}

/// Index of the cheapest breakdown; the first one wins ties.
pub fn cheapest(breakdowns: &[CostBreakdown]) -> Option<usize> {
    breakdowns
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, b)| match best {
            Some((_, min)) if b.total >= min => best,
            _ => Some((i, b.total)),
        })
        .map(|(i, _)| i)
}

pub struct CostRanker {
    selector: CandidateSelector,
    evaluator: HazardEvaluator,
    weights: CostWeights,
    likert_scale: f64,
}

impl CostRanker {
    pub fn new(evaluator: HazardEvaluator, config: &AnalysisConfig) -> Self {
        Self {
            selector: CandidateSelector::new(config),
            evaluator,
            weights: config.weights(),
            likert_scale: config.likert_scale,
        }
    }

    /// Find an incident cheaper for the responder to attend than `incident`.
    ///
    /// `Ok(None)` when there are no candidates or when `incident` itself is the
    /// cheapest. Every candidate's hazard is evaluated concurrently and all must
    /// succeed; one failure fails the whole pass.
    pub async fn rank_cost<'a>(
        &self,
        origin: Coordinate,
        incident: &Incident,
        response: &Response,
        status: &QualifiedStatus,
        known: impl IntoIterator<Item = &'a Incident>,
    ) -> Result<Option<CostResult>, AnalysisError> {
        let mut candidates =
            self.selector
                .evaluate_candidates(origin, incident, status.priority, known);
        if candidates.is_empty() {
            debug!(incident = %incident.id, "No candidates to rank against");
            return Ok(None);
        }

        // Baseline: the replied incident is always costed too.
        candidates.push(incident.clone());

        info!(
            incident = %incident.id,
            response = %response.id,
            candidates = candidates.len(),
            "Starting cost ranking"
        );

        let reports: Vec<HazardReport> = try_join_all(
            candidates
                .iter()
                .map(|candidate| self.evaluator.evaluate(origin, candidate)),
        )
        .await?;

        let inputs: Vec<CostInputs> = reports
            .iter()
            .map(|r| CostInputs {
                total_distance: r.total_distance,
                total_time: elapsed_hours(r.incident.created_at, response.created_at),
                total_hazard: r.total_hazard,
            })
            .collect();

        let breakdowns = score_all(&inputs, &self.weights, self.likert_scale);

        for ((report, input), cost) in reports.iter().zip(&inputs).zip(&breakdowns) {
            debug!(
                incident = %report.incident.id,
                total_distance = input.total_distance,
                total_time = input.total_time,
                total_hazard = input.total_hazard,
                length_cost = cost.length_cost,
                time_cost = cost.time_cost,
                hazard_cost = cost.hazard_cost,
                total_cost = cost.total,
                "Candidate cost"
            );
        }

        let Some(best) = cheapest(&breakdowns) else {
            return Ok(None);
        };
        let winner = &reports[best];

        if winner.incident.id == incident.id {
            info!(incident = %incident.id, cost = breakdowns[best].total, "Replied incident is already the cheapest");
            return Ok(None);
        }

        info!(
            incident = %incident.id,
            alternative = %winner.incident.id,
            cost = breakdowns[best].total,
            "Found a cheaper alternative"
        );

        Ok(Some(CostResult {
            incident: winner.incident.clone(),
            total_distance: winner.total_distance,
            total_hazard: winner.total_hazard,
            total_time: inputs[best].total_time,
            cost: breakdowns[best],
        }))
    }
}
