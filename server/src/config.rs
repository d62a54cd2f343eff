use once_cell::sync::Lazy;
use serde::Deserialize;

/// Runtime configuration, read once from `WEATHERLOG_*` environment
/// variables (a `.env` file is loaded in main before first access).
///
/// Every field has a default so the service boots with no environment at
/// all: local SQLite file, Budapest as the default location, hourly
/// ingestion, email in dev mode.
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_app_env")]
    pub app_env: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_lat")]
    pub default_lat: f64,
    #[serde(default = "default_lon")]
    pub default_lon: f64,
    #[serde(default = "default_scheduler_enabled")]
    pub scheduler_enabled: bool,
    #[serde(default = "default_scheduler_interval_min")]
    pub scheduler_interval_min: u64,
    /// Resend API key. Empty means dev mode: reports are logged, not sent.
    #[serde(default)]
    pub resend_api_key: String,
    #[serde(default = "default_email_from")]
    pub email_from: String,
    #[serde(default)]
    pub email_to: String,
}

fn default_app_env() -> String {
    "dev".to_string()
}

fn default_database_url() -> String {
    "weather.db".to_string()
}

fn default_lat() -> f64 {
    47.4979
}

fn default_lon() -> f64 {
    19.0402
}

fn default_scheduler_enabled() -> bool {
    true
}

fn default_scheduler_interval_min() -> u64 {
    60
}

fn default_email_from() -> String {
    "weatherlog@localhost".to_string()
}

pub static CONFIG: Lazy<Config> = Lazy::new(|| {
    envy::prefixed("WEATHERLOG_")
        .from_env::<Config>()
        .expect("Invalid WEATHERLOG_* environment configuration")
});

pub fn config() -> &'static Config {
    &CONFIG
}
