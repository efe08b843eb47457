use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::WitnerError;
use crate::types::PriorityTrack;

/// Service configuration loaded from environment variables.
/// Analysis tuning and reply tracks live in the TOML `AnalysisConfig`.
#[derive(Debug, Clone)]
pub struct Config {
    // Routing
    pub google_maps_api_key: String,

    // Buffer query service
    pub buffer_service_url: String,

    // Optional analysis file; defaults apply when unset
    pub analysis_config_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables (and a `.env` file if present).
    pub fn from_env() -> Result<Self, WitnerError> {
        dotenvy::dotenv().ok();

        let config = Self {
            google_maps_api_key: required_env("GOOGLE_MAPS_API_KEY")?,
            buffer_service_url: required_env("BUFFER_SERVICE_URL")?,
            analysis_config_path: env::var("WITNER_CONFIG").ok().map(PathBuf::from),
        };

        config.log_redacted();
        Ok(config)
    }

    /// Load the analysis file named by `WITNER_CONFIG`, or the defaults.
    pub fn analysis(&self) -> Result<AnalysisConfig, WitnerError> {
        match &self.analysis_config_path {
            Some(path) => AnalysisConfig::load(path),
            None => Ok(AnalysisConfig::default()),
        }
    }

    fn log_redacted(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  GOOGLE_MAPS_API_KEY: {}", preview(&self.google_maps_api_key));
        tracing::info!("  BUFFER_SERVICE_URL: {}", self.buffer_service_url);
        match &self.analysis_config_path {
            Some(path) => tracing::info!("  WITNER_CONFIG: {}", path.display()),
            None => tracing::info!("  WITNER_CONFIG: <not set, using defaults>"),
        }
    }
}

/// First five characters of a secret and its length in characters.
fn preview(val: &str) -> String {
    format!(
        "{}...({} chars)",
        val.chars().take(5).collect::<String>(),
        val.chars().count()
    )
}

fn required_env(key: &str) -> Result<String, WitnerError> {
    env::var(key).map_err(|_| WitnerError::Config(format!("{key} environment variable is required")))
}

// ---------------------------------------------------------------------------
// AnalysisConfig
// ---------------------------------------------------------------------------

/// Tuning for candidate selection, hazard evaluation and cost ranking.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Minutes into the future the route is requested for (traffic-aware routing).
    pub departure_offset_minutes: u32,
    /// Radius in meters around each route section searched for other incidents.
    pub buffer_radius_meters: f64,
    /// Candidates farther than this many times the responder's distance to the
    /// replied incident are dropped when the range constraint is on.
    pub analysis_range_factor: f64,
    pub enable_range_constraint: bool,
    /// Top of the normalized cost scale.
    pub likert_scale: f64,
    pub length_importance: f64,
    pub time_importance: f64,
    pub hazard_importance: f64,
    pub reply_tracks: Vec<PriorityTrack>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            departure_offset_minutes: 60,
            buffer_radius_meters: 100.0,
            analysis_range_factor: 3.0,
            enable_range_constraint: false,
            likert_scale: 5.0,
            length_importance: 1.0,
            time_importance: 1.0,
            hazard_importance: 4.0,
            reply_tracks: Vec::new(),
        }
    }
}

impl AnalysisConfig {
    /// Load and parse a TOML analysis file.
    pub fn load(path: &Path) -> Result<Self, WitnerError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            WitnerError::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, WitnerError> {
        let config: AnalysisConfig = toml::from_str(content)
            .map_err(|e| WitnerError::Config(format!("Failed to parse analysis config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), WitnerError> {
        if self.buffer_radius_meters <= 0.0 {
            return Err(WitnerError::Validation(
                "buffer_radius_meters must be positive".to_string(),
            ));
        }
        if self.analysis_range_factor <= 0.0 {
            return Err(WitnerError::Validation(
                "analysis_range_factor must be positive".to_string(),
            ));
        }
        let importances = [
            self.length_importance,
            self.time_importance,
            self.hazard_importance,
        ];
        if importances.iter().any(|i| *i < 0.0) || importances.iter().sum::<f64>() <= 0.0 {
            return Err(WitnerError::Validation(
                "importances must be non-negative with a positive sum".to_string(),
            ));
        }
        Ok(())
    }

    pub fn weights(&self) -> CostWeights {
        CostWeights::from_importance(
            self.length_importance,
            self.time_importance,
            self.hazard_importance,
        )
    }

    pub fn tracks(&self) -> TrackRegistry {
        TrackRegistry::new(self.reply_tracks.clone())
    }
}

/// Normalized shares of the length/time/hazard importances; they sum to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostWeights {
    pub length: f64,
    pub time: f64,
    pub hazard: f64,
}

impl CostWeights {
    pub fn from_importance(length: f64, time: f64, hazard: f64) -> Self {
        let total = length + time + hazard;
        Self {
            length: length / total,
            time: time / total,
            hazard: hazard / total,
        }
    }
}

// ---------------------------------------------------------------------------
// TrackRegistry
// ---------------------------------------------------------------------------

/// Hashtag → priority track lookup.
#[derive(Debug, Clone, Default)]
pub struct TrackRegistry {
    by_tag: HashMap<String, PriorityTrack>,
}

impl TrackRegistry {
    pub fn new(tracks: impl IntoIterator<Item = PriorityTrack>) -> Self {
        Self {
            by_tag: tracks.into_iter().map(|t| (t.tag.clone(), t)).collect(),
        }
    }

    pub fn get(&self, tag: &str) -> Option<&PriorityTrack> {
        self.by_tag.get(tag)
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }

    /// The most urgent configured track among `hashtags`, if any matches.
    /// On equal priority the first hashtag wins.
    pub fn resolve<S: AsRef<str>>(&self, hashtags: &[S]) -> Option<&PriorityTrack> {
        let mut top: Option<&PriorityTrack> = None;
        for tag in hashtags {
            if let Some(track) = self.by_tag.get(tag.as_ref()) {
                if top.map_or(true, |t| track.priority < t.priority) {
                    top = Some(track);
                }
            }
        }
        top
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_counts_characters_not_bytes() {
        assert_eq!(preview("AIzaSyExample"), "AIzaS...(13 chars)");
        // Each of these is two bytes in UTF-8.
        assert_eq!(preview("şğüçöı"), "şğüçö...(6 chars)");
        assert_eq!(preview("ab"), "ab...(2 chars)");
    }

    #[test]
    fn default_weights_favor_hazard() {
        let w = AnalysisConfig::default().weights();
        assert!((w.length - 1.0 / 6.0).abs() < 1e-12);
        assert!((w.time - 1.0 / 6.0).abs() < 1e-12);
        assert!((w.hazard - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn toml_overrides_keep_remaining_defaults() {
        let config = AnalysisConfig::from_toml(
            r#"
            enable_range_constraint = true
            hazard_importance = 2.0

            [[reply_tracks]]
            tag = "completed"
            priority = 0

            [[reply_tracks]]
            tag = "onmyway"
            priority = 2
            "#,
        )
        .unwrap();

        assert!(config.enable_range_constraint);
        assert_eq!(config.departure_offset_minutes, 60);
        assert_eq!(config.buffer_radius_meters, 100.0);
        assert_eq!(config.reply_tracks.len(), 2);
        assert!((config.weights().hazard - 0.5).abs() < 1e-12);
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        assert!(AnalysisConfig::from_toml("bogus = 1").is_err());
        assert!(AnalysisConfig::from_toml("buffer_radius_meters = 0.0").is_err());
    }

    #[test]
    fn resolve_picks_most_urgent_match() {
        let tracks = TrackRegistry::new(vec![
            PriorityTrack::new("completed", 0),
            PriorityTrack::new("critical", 1),
            PriorityTrack::new("onmyway", 3),
        ]);

        let picked = tracks.resolve(&["onmyway", "unrelated", "critical"]).unwrap();
        assert_eq!(picked.tag, "critical");
        assert!(tracks.resolve(&["unrelated"]).is_none());
        assert!(tracks.resolve::<&str>(&[]).is_none());
    }
}
