pub mod arbiter;
pub mod candidates;
pub mod error;
pub mod hazard;
pub mod index;
pub mod notify;
pub mod ranking;
pub mod route;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use arbiter::{Arbitration, HandledResponse, StatusArbiter};
pub use candidates::CandidateSelector;
pub use error::AnalysisError;
pub use hazard::{HazardEvaluator, HazardReport};
pub use index::{IncidentChange, IncidentIndex};
pub use ranking::{CostBreakdown, CostInputs, CostRanker, CostResult};
pub use store::memory::MemoryIncidentStore;
pub use traits::{BufferQuery, IncidentStore, Poster, ReplyTarget, RouteProvider, TxOutcome};
