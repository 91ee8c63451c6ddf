use serde::Deserialize;
use std::fs;

use crate::matcher::MatchProfiles;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_calls_per_window: u32,
    pub cooldown_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls_per_window: 10,
            cooldown_seconds: 120,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub db_path: String,
    /// JSON array of candidate records produced by the extraction stage.
    pub input_path: String,
    pub heartbeat_interval_seconds: u64,
    pub rate_limit: RateLimitConfig,
    pub matching: MatchProfiles,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: "offers.db".to_string(),
            input_path: "extraction_results.json".to_string(),
            heartbeat_interval_seconds: 120,
            rate_limit: RateLimitConfig::default(),
            matching: MatchProfiles::default(),
        }
    }
}

pub fn load_config(path: &str) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}
