pub mod error;

pub use error::{BufferError, Result};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One polyline to search around, with its travel distance in meters.
#[derive(Debug, Clone, Serialize)]
pub struct BufferSection {
    pub distance: f64,
    /// `[lat, lng]` pairs.
    pub polyline: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Serialize)]
struct BufferQuery<'a> {
    radius_meters: f64,
    sections: &'a [BufferSection],
}

#[derive(Debug, Clone, Deserialize)]
struct BufferResponse {
    results: Vec<SectionMatches>,
}

/// Ids of tracked points found within the radius of one section.
#[derive(Debug, Clone, Deserialize)]
pub struct SectionMatches {
    #[serde(default)]
    pub matched_ids: Vec<String>,
}

pub struct BufferClient {
    client: reqwest::Client,
    base_url: String,
}

impl BufferClient {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Query every section in one round trip. Results come back in section order.
    pub async fn query(
        &self,
        sections: &[BufferSection],
        radius_meters: f64,
    ) -> Result<Vec<SectionMatches>> {
        let endpoint = format!("{}/buffer", self.base_url);
        let body = BufferQuery {
            radius_meters,
            sections,
        };

        let resp = self.client.post(&endpoint).json(&body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BufferError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: BufferResponse = resp.json().await?;
        if parsed.results.len() != sections.len() {
            return Err(BufferError::ResultCount {
                expected: sections.len(),
                actual: parsed.results.len(),
            });
        }

        tracing::debug!(
            sections = sections.len(),
            radius_meters,
            matched = parsed.results.iter().map(|r| r.matched_ids.len()).sum::<usize>(),
            "Buffer query complete"
        );
        Ok(parsed.results)
    }
}
