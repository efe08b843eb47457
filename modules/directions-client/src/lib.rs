pub mod error;
pub mod polyline;
pub mod types;

pub use error::{DirectionsError, Result};
pub use types::{DecodedLeg, DecodedRoute, DecodedStep, DirectionsRequest, DirectionsResponse};

use std::time::Duration;

const BASE_URL: &str = "https://maps.googleapis.com/maps/api/directions/json";

pub struct DirectionsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl DirectionsClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(BASE_URL, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Request directions and decode every step polyline.
    /// `ZERO_RESULTS` is an empty route list, not an error.
    pub async fn directions(&self, request: &DirectionsRequest) -> Result<Vec<DecodedRoute>> {
        let mut params = request.query_pairs();
        params.push(("key", self.api_key.clone()));

        let resp = self.client.get(&self.base_url).query(&params).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(DirectionsError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: DirectionsResponse = resp.json().await?;
        match body.status.as_str() {
            "OK" => {}
            "ZERO_RESULTS" => {
                tracing::debug!(
                    origin = %request.origin,
                    destination = %request.destination,
                    "No route between points"
                );
                return Ok(Vec::new());
            }
            other => {
                let detail = body.error_message.unwrap_or_default();
                return Err(DirectionsError::Status(format!("{other} {detail}").trim().to_string()));
            }
        }

        let routes = body.decode_routes()?;
        tracing::debug!(
            origin = %request.origin,
            destination = %request.destination,
            routes = routes.len(),
            "Directions fetched"
        );
        Ok(routes)
    }
}
