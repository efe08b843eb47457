use thiserror::Error;

pub type Result<T> = std::result::Result<T, BufferError>;

#[derive(Debug, Error)]
pub enum BufferError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Expected {expected} section results, got {actual}")]
    ResultCount { expected: usize, actual: usize },
}

impl From<reqwest::Error> for BufferError {
    fn from(err: reqwest::Error) -> Self {
        BufferError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for BufferError {
    fn from(err: serde_json::Error) -> Self {
        BufferError::Parse(err.to_string())
    }
}
