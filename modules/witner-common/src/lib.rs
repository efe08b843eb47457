pub mod config;
pub mod error;
pub mod route;
pub mod types;

pub use config::{AnalysisConfig, Config, CostWeights, TrackRegistry};
pub use error::WitnerError;
pub use route::*;
pub use types::*;
