use tracing::debug;

use witner_common::{AnalysisConfig, Coordinate, Incident};

/// Picks the open incidents worth comparing against the one a responder replied to.
#[derive(Debug, Clone)]
pub struct CandidateSelector {
    analysis_range_factor: f64,
    enable_range_constraint: bool,
}

impl CandidateSelector {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            analysis_range_factor: config.analysis_range_factor,
            enable_range_constraint: config.enable_range_constraint,
        }
    }

    /// Other incidents eligible as cheaper alternatives to `target` for a
    /// responder at `origin` claiming with `priority`.
    ///
    /// Excluded: `target` itself; incidents already claimed at the same or a
    /// less urgent priority; and, with the range constraint on, incidents at
    /// or beyond `analysis_range_factor` times the responder's distance to `target`.
    ///
    /// Results are ordered by report time, then id, so ranking ties resolve
    /// the same way on every run.
    pub fn evaluate_candidates<'a>(
        &self,
        origin: Coordinate,
        target: &Incident,
        priority: u32,
        incidents: impl IntoIterator<Item = &'a Incident>,
    ) -> Vec<Incident> {
        let range = origin.distance_to(&target.coordinate) * self.analysis_range_factor;

        let mut candidates: Vec<Incident> = incidents
            .into_iter()
            .filter(|candidate| candidate.id != target.id)
            .filter(|candidate| {
                // Someone already owns it at equal or lower urgency.
                candidate
                    .current_status()
                    .map_or(true, |status| status.priority < priority)
            })
            .filter(|candidate| {
                !self.enable_range_constraint || origin.distance_to(&candidate.coordinate) < range
            })
            .cloned()
            .collect();

        candidates.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        debug!(
            target = %target.id,
            priority,
            range_meters = range,
            range_constraint = self.enable_range_constraint,
            candidates = candidates.len(),
            "Candidates selected"
        );
        candidates
    }
}
