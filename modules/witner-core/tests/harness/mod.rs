//! Shared wiring for arbiter and ranking integration tests.
//!
//! Builds a `StatusArbiter` over a `MemoryIncidentStore`, an index following
//! the store's change feed, and the mocks from `witner_core::testing`.

#![allow(dead_code)]

use std::sync::Arc;

use tokio::sync::broadcast;

use witner_common::{AnalysisConfig, Incident, QualifiedStatus, Response};
use witner_core::testing::{tracks, MockBuffer, MockRouter, RecordingPoster, YieldingStore};
use witner_core::{
    CostRanker, HandledResponse, HazardEvaluator, IncidentChange, IncidentIndex, IncidentStore,
    MemoryIncidentStore, StatusArbiter,
};

pub struct Harness {
    pub store: Arc<MemoryIncidentStore>,
    pub index: Arc<IncidentIndex>,
    pub router: Arc<MockRouter>,
    pub poster: Arc<RecordingPoster>,
    pub arbiter: StatusArbiter,
    changes: broadcast::Receiver<IncidentChange>,
}

impl Harness {
    /// Default config, no routes, no buffer matches.
    pub async fn new(incidents: Vec<Incident>) -> Self {
        Self::build(
            incidents,
            MockRouter::new(),
            MockBuffer::new(),
            RecordingPoster::new(),
            AnalysisConfig::default(),
        )
        .await
    }

    pub async fn build(
        incidents: Vec<Incident>,
        router: MockRouter,
        buffer: MockBuffer,
        poster: RecordingPoster,
        config: AnalysisConfig,
    ) -> Self {
        let store = Arc::new(MemoryIncidentStore::new());
        for incident in incidents {
            store.put_incident(incident);
        }

        let changes = store.subscribe();
        let index = Arc::new(IncidentIndex::load(store.as_ref()).await.unwrap());

        let router = Arc::new(router);
        let poster = Arc::new(poster);
        let evaluator = HazardEvaluator::new(router.clone(), Arc::new(buffer), &config);
        let ranker = CostRanker::new(evaluator, &config);

        let arbiter = StatusArbiter::new(
            store.clone(),
            index.clone(),
            poster.clone(),
            ranker,
            tracks(),
        );

        Self {
            store,
            index,
            router,
            poster,
            arbiter,
            changes,
        }
    }

    /// Like `new`, but the arbiter's store yields before each transaction so
    /// arbitrations joined with `futures::join!` interleave deterministically.
    /// `store` still reads the shared state directly.
    pub async fn interleaved(incidents: Vec<Incident>) -> Self {
        let mut h = Self::new(incidents).await;
        let config = AnalysisConfig::default();
        let evaluator = HazardEvaluator::new(h.router.clone(), Arc::new(MockBuffer::new()), &config);
        h.arbiter = StatusArbiter::new(
            Arc::new(YieldingStore::new(h.store.clone())),
            h.index.clone(),
            h.poster.clone(),
            CostRanker::new(evaluator, &config),
            tracks(),
        );
        h
    }

    /// Arbitrate a reply to a known incident, then bring the index up to date.
    pub async fn respond(&mut self, response: &Response) -> HandledResponse {
        let handled = self
            .arbiter
            .handle_response(response)
            .await
            .expect("arbitration failed")
            .expect("reply to unknown incident");
        self.sync();
        handled
    }

    pub fn sync(&mut self) -> usize {
        self.index.catch_up(&mut self.changes)
    }

    pub fn status(&self, incident_id: &str) -> Option<QualifiedStatus> {
        self.store
            .get(incident_id)
            .and_then(|i| i.reply_stats.current_qualified_status)
    }
}
