use thiserror::Error;

/// Failures of a single evaluation or ranking pass.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Malformed route: {0}")]
    MalformedRoute(String),

    #[error("No route to incident {0}")]
    NoRoute(String),

    #[error("Routing unavailable: {0}")]
    RoutingUnavailable(#[source] anyhow::Error),

    #[error("Buffer query failed: {0}")]
    BufferQueryFailed(#[source] anyhow::Error),
}
