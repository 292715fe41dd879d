use std::env;
use std::time::Duration;

use url::Url;

use crate::error::GigfeedError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Geocoding
    pub nominatim_base_url: String,
    pub geocoder_user_agent: String,

    // IP geolocation
    pub ip_lookup_base_url: String,

    // AI-derived listings
    pub listings_dir: String,
}

impl Config {
    /// Load configuration from environment variables, with public-service
    /// defaults for the providers. A malformed provider URL is rejected up
    /// front rather than surfacing as a request failure later.
    pub fn from_env() -> Result<Self, GigfeedError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, GigfeedError> {
        let config = Self {
            nominatim_base_url: get("NOMINATIM_BASE_URL")
                .unwrap_or_else(|| "https://nominatim.openstreetmap.org".to_string()),
            geocoder_user_agent: get("GEOCODER_USER_AGENT")
                .unwrap_or_else(|| "gigfeed/0.1 (event aggregation)".to_string()),
            ip_lookup_base_url: get("IP_LOOKUP_BASE_URL")
                .unwrap_or_else(|| "http://ip-api.com/json".to_string()),
            listings_dir: get("LISTINGS_DIR").unwrap_or_else(|| "./listings".to_string()),
        };

        for (key, value) in [
            ("NOMINATIM_BASE_URL", &config.nominatim_base_url),
            ("IP_LOOKUP_BASE_URL", &config.ip_lookup_base_url),
        ] {
            Url::parse(value).map_err(|e| GigfeedError::Config(format!("{key}: {e}")))?;
        }
        Ok(config)
    }
}

/// Empirically-chosen constants for dedup, curation, and scheduling.
/// These are starting defaults, not derived from any provable property;
/// deployments are expected to tune them.
#[derive(Debug, Clone)]
pub struct Tuning {
    /// Token-overlap similarity above which same-city, same-date records
    /// merge even when their fingerprints differ.
    pub title_similarity_threshold: f64,
    /// Nearby-city enrichment cap (primary city excluded).
    pub max_nearby_cities: usize,
    /// Budget for one adapter call. Must not exceed the global deadline.
    pub per_adapter_timeout: Duration,
    /// Wall-clock budget for a whole run.
    pub global_deadline: Duration,
    /// Search radius handed to adapters.
    pub radius_km: f64,
    /// Per-adapter result cap.
    pub result_limit: usize,

    // Quality score weights
    pub venue_weight: f32,
    pub date_weight: f32,
    pub corroboration_weight: f32,
    pub recency_weight: f32,
    /// Days ahead beyond which an event no longer counts as near future.
    pub recency_horizon_days: i64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            title_similarity_threshold: 0.85,
            max_nearby_cities: 4,
            per_adapter_timeout: Duration::from_secs(12),
            global_deadline: Duration::from_secs(20),
            radius_km: 25.0,
            result_limit: 50,
            venue_weight: 0.25,
            date_weight: 0.25,
            corroboration_weight: 0.2,
            recency_weight: 0.3,
            recency_horizon_days: 60,
        }
    }
}

impl Tuning {
    /// Clamp the per-adapter budget so one producer can never consume the
    /// whole run.
    pub fn effective_adapter_timeout(&self) -> Duration {
        self.per_adapter_timeout.min(self.global_deadline)
    }
}
