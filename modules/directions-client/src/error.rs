use thiserror::Error;

pub type Result<T> = std::result::Result<T, DirectionsError>;

#[derive(Debug, Error)]
pub enum DirectionsError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Directions status {0}")]
    Status(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Polyline error: {0}")]
    Polyline(String),
}

impl From<reqwest::Error> for DirectionsError {
    fn from(err: reqwest::Error) -> Self {
        DirectionsError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for DirectionsError {
    fn from(err: serde_json::Error) -> Self {
        DirectionsError::Parse(err.to_string())
    }
}
