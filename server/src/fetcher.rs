//! Open-Meteo client for current weather conditions.
//!
//! One request per call, bounded by a 10 second timeout, no retries.
//! Callers decide what a failure means: the HTTP layer surfaces it, the
//! scheduler logs and moves on to the next city.

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::time::Duration;

use crate::config::config;

const OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1/forecast";

static HTTP: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("Failed to create HTTP client")
});

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Network failure or timeout before any HTTP response arrived.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    /// Non-2xx response from the provider.
    #[error("upstream returned HTTP {0}")]
    UpstreamHttp(u16),
    /// Body was not parseable or the expected fields were absent.
    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),
}

/// A parsed observation, echoing the coordinates it was requested for.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentWeather {
    pub temperature_c: f64,
    pub windspeed_kmh: f64,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentBlock,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    temperature_2m: f64,
    wind_speed_10m: f64,
}

/// Resolve an optional coordinate against the configured default.
///
/// A coordinate that is absent *or exactly 0.0* falls back to the default.
/// The zero branch reproduces long-standing falsy-as-missing behavior and
/// is deliberate: a real 0.0 coordinate is unreachable through this path.
pub fn resolve_coord(value: Option<f64>, default: f64) -> f64 {
    match value {
        Some(v) if v != 0.0 => v,
        _ => default,
    }
}

pub fn build_url(lat: f64, lon: f64) -> String {
    format!(
        "{}?current=temperature_2m,wind_speed_10m&latitude={}&longitude={}",
        OPEN_METEO_URL, lat, lon
    )
}

/// Parse an Open-Meteo forecast body into a `CurrentWeather`.
pub fn parse_current_body(body: &str, lat: f64, lon: f64) -> Result<CurrentWeather, FetchError> {
    let parsed: ForecastResponse =
        serde_json::from_str(body).map_err(|e| FetchError::MalformedResponse(e.to_string()))?;

    Ok(CurrentWeather {
        temperature_c: parsed.current.temperature_2m,
        windspeed_kmh: parsed.current.wind_speed_10m,
        latitude: lat,
        longitude: lon,
    })
}

/// Fetch current conditions, falling back to the configured default
/// location for missing (or zero, see `resolve_coord`) coordinates.
pub async fn fetch_current(
    lat: Option<f64>,
    lon: Option<f64>,
) -> Result<CurrentWeather, FetchError> {
    let cfg = config();
    let lat = resolve_coord(lat, cfg.default_lat);
    let lon = resolve_coord(lon, cfg.default_lon);
    fetch_at(lat, lon).await
}

/// Fetch current conditions for an exact coordinate pair.
pub async fn fetch_at(lat: f64, lon: f64) -> Result<CurrentWeather, FetchError> {
    let url = build_url(lat, lon);
    log::info!("Fetching weather from Open-Meteo: {}", url);

    let response = HTTP
        .get(&url)
        .send()
        .await
        .map_err(|e| FetchError::UpstreamUnavailable(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::UpstreamHttp(status.as_u16()));
    }

    let body = response
        .text()
        .await
        .map_err(|e| FetchError::UpstreamUnavailable(e.to_string()))?;

    parse_current_body(&body, lat, lon)
}
