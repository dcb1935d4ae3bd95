use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub collaborators: CollaboratorConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

/// Endpoints for the two outbound HTTP collaborators.
#[derive(Debug, Deserialize, Clone)]
pub struct CollaboratorConfig {
    pub chat_model_url: String,
    pub policy_search_url: String,
    pub api_key: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// Window after booking creation inside which the 24-hour rule applies.
    pub refund_window_hours: i64,
    /// Minimum days until departure for the 24-hour rule to apply.
    pub refund_min_days_out: i64,
    /// Hard cap on flight results returned by a search.
    pub search_result_cap: usize,
    /// Fee charged for a paid cabin upgrade during a seat change.
    pub upgrade_fee_cents: i32,
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            refund_window_hours: 24,
            refund_min_days_out: 7,
            search_result_cap: 5,
            upgrade_fee_cents: 7500,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Environment-specific overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `MERIDIAN__SERVER__PORT=8080`
            .add_source(config::Environment::with_prefix("MERIDIAN").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
