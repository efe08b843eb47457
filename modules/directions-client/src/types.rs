use serde::Deserialize;

use crate::error::Result;
use crate::polyline;

// --- Request ---

/// Parameters for a traffic-aware driving directions request.
#[derive(Debug, Clone)]
pub struct DirectionsRequest {
    /// `lat,lng` or a place name.
    pub origin: String,
    pub destination: String,
    /// Unix seconds. Required by the API for `traffic_model` to apply.
    pub departure_time: i64,
    pub mode: &'static str,
    pub avoid: Vec<&'static str>,
    pub traffic_model: &'static str,
}

impl DirectionsRequest {
    /// Driving request departing `departure_offset_minutes` after `now_unix`,
    /// avoiding tolls and ferries, with pessimistic traffic.
    pub fn driving(
        origin: impl Into<String>,
        destination: impl Into<String>,
        now_unix: i64,
        departure_offset_minutes: u32,
    ) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            departure_time: now_unix + i64::from(departure_offset_minutes) * 60,
            mode: "driving",
            avoid: vec!["tolls", "ferries"],
            traffic_model: "pessimistic",
        }
    }

    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("origin", self.origin.clone()),
            ("destination", self.destination.clone()),
            ("departure_time", self.departure_time.to_string()),
            ("mode", self.mode.to_string()),
            ("avoid", self.avoid.join("|")),
            ("traffic_model", self.traffic_model.to_string()),
        ]
    }
}

// --- Raw API response ---

#[derive(Debug, Clone, Deserialize)]
pub struct DirectionsResponse {
    pub status: String,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub routes: Vec<ApiRoute>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiRoute {
    #[serde(default)]
    pub legs: Vec<ApiLeg>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiLeg {
    #[serde(default)]
    pub steps: Vec<ApiStep>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiStep {
    pub distance: TextValue,
    pub polyline: EncodedPolyline,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextValue {
    pub value: f64,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncodedPolyline {
    pub points: String,
}

// --- Decoded shapes ---

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRoute {
    pub legs: Vec<DecodedLeg>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedLeg {
    pub steps: Vec<DecodedStep>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedStep {
    pub distance_meters: f64,
    /// `(lat, lng)` pairs.
    pub points: Vec<(f64, f64)>,
}

impl DirectionsResponse {
    /// Decode every step polyline of every route.
    pub fn decode_routes(&self) -> Result<Vec<DecodedRoute>> {
        self.routes
            .iter()
            .map(|route| {
                let legs = route
                    .legs
                    .iter()
                    .map(|leg| {
                        let steps = leg
                            .steps
                            .iter()
                            .map(|step| {
                                Ok(DecodedStep {
                                    distance_meters: step.distance.value,
                                    points: polyline::decode(&step.polyline.points)?,
                                })
                            })
                            .collect::<Result<Vec<_>>>()?;
                        Ok(DecodedLeg { steps })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(DecodedRoute { legs })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_departs_after_offset() {
        let req = DirectionsRequest::driving("40.9,29.0", "41.0,29.1", 1_700_000_000, 60);
        assert_eq!(req.departure_time, 1_700_003_600);

        let pairs = req.query_pairs();
        assert!(pairs.contains(&("avoid", "tolls|ferries".to_string())));
        assert!(pairs.contains(&("traffic_model", "pessimistic".to_string())));
    }

    #[test]
    fn decodes_api_payload() {
        let body = r#"{
            "status": "OK",
            "routes": [{
                "legs": [{
                    "steps": [
                        {"distance": {"value": 120, "text": "0.1 km"}, "polyline": {"points": "_p~iF~ps|U_ulLnnqC"}},
                        {"distance": {"value": 80, "text": "80 m"}, "polyline": {"points": "_p~iF~ps|U"}}
                    ]
                }]
            }]
        }"#;

        let resp: DirectionsResponse = serde_json::from_str(body).unwrap();
        let routes = resp.decode_routes().unwrap();

        assert_eq!(routes.len(), 1);
        let steps = &routes[0].legs[0].steps;
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].distance_meters, 120.0);
        assert_eq!(steps[0].points, vec![(38.5, -120.2), (40.7, -120.95)]);
        assert_eq!(steps[1].points, vec![(38.5, -120.2)]);
    }
}
