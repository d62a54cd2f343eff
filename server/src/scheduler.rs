//! Scheduled ingestion: one timer, one batch over the city registry per
//! tick. Ticks run inside a single task, so they can never overlap.

use std::future::Future;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::cities::CITY_REGISTRY;
use crate::config::config;
use crate::db;
use crate::email;
use crate::fetcher::{self, CurrentWeather, FetchError};
use crate::readings::{self, Reading, StoreError};

/// How long `stop` waits for an in-flight tick before abandoning it.
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Owned handle for the ingestion timer. Returned by `start` and stopped
/// explicitly by the caller; there is no process-wide scheduler singleton.
pub struct Scheduler {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl Scheduler {
    /// Start the ingestion timer. Returns `None` when ingestion is
    /// disabled by configuration, in which case nothing is spawned.
    pub fn start() -> Option<Scheduler> {
        let cfg = config();
        if !cfg.scheduler_enabled {
            log::info!("Scheduler disabled by config.");
            return None;
        }

        let (shutdown, mut rx) = oneshot::channel();
        let interval_min = cfg.scheduler_interval_min;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick_period(interval_min));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // An interval fires immediately; consume that so the first
            // batch runs a full period after boot.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = &mut rx => {
                        log::info!("Scheduler stopping, no further ticks.");
                        break;
                    }
                    _ = ticker.tick() => {
                        run_tick().await;
                    }
                }
            }
        });

        log::info!("Scheduler started (interval={} min)", interval_min);
        Some(Scheduler { shutdown, handle })
    }

    /// Stop the timer. An in-flight tick is never interrupted: we wait for
    /// it up to `STOP_GRACE` and then abandon it, only future ticks are
    /// prevented.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        if tokio::time::timeout(STOP_GRACE, self.handle).await.is_err() {
            log::warn!(
                "Scheduler did not stop within {:?}, abandoning in-flight tick",
                STOP_GRACE
            );
        }
    }
}

/// Period between ticks. A misconfigured zero interval is clamped to one
/// minute; `tokio::time::interval` panics on a zero period.
fn tick_period(interval_min: u64) -> Duration {
    if interval_min == 0 {
        log::warn!("scheduler_interval_min=0 is invalid, using 1 minute");
    }
    Duration::from_secs(interval_min.max(1) * 60)
}

/// Result of one ingestion batch: a report line per persisted city, and
/// how many cities were skipped on failure.
pub struct BatchOutcome {
    pub lines: Vec<String>,
    pub failed: usize,
}

/// Run one ingestion batch over the city registry.
///
/// Failure isolation is per city: a failed fetch or save is logged,
/// counted, and skipped, never aborting the rest of the batch. Generic
/// over the fetch and persist steps so the isolation property is testable
/// without network access.
pub async fn run_ingest_batch<F, Fut, P>(fetch: F, mut persist: P) -> BatchOutcome
where
    F: Fn(f64, f64) -> Fut,
    Fut: Future<Output = Result<CurrentWeather, FetchError>>,
    P: FnMut(&CurrentWeather) -> Result<Reading, StoreError>,
{
    let mut lines = Vec::new();
    let mut failed = 0;

    for city in CITY_REGISTRY {
        let weather = match fetch(city.latitude, city.longitude).await {
            Ok(weather) => weather,
            Err(e) => {
                log::warn!("Fetch failed for {}: {}", city.name, e);
                failed += 1;
                continue;
            }
        };

        match persist(&weather) {
            Ok(reading) => lines.push(format!(
                "{}: {:.1} °C, wind {:.1} km/h",
                city.name, reading.temperature_c, reading.windspeed_kmh
            )),
            Err(e) => {
                log::error!("Failed to save reading for {}: {}", city.name, e);
                failed += 1;
            }
        }
    }

    BatchOutcome { lines, failed }
}

async fn run_tick() {
    log::info!(
        "Scheduler tick: fetching weather for {} cities",
        CITY_REGISTRY.len()
    );

    let outcome = run_ingest_batch(
        |lat, lon| fetcher::fetch_at(lat, lon),
        |weather| {
            db::with_connection(|conn| {
                readings::insert(
                    conn,
                    weather.temperature_c,
                    weather.windspeed_kmh,
                    weather.latitude,
                    weather.longitude,
                    None,
                )
            })
        },
    )
    .await;

    log::info!(
        "Tick done: {} saved, {} failed",
        outcome.lines.len(),
        outcome.failed
    );

    if outcome.lines.is_empty() {
        return;
    }

    let subject = format!("Weather update for {} cities", outcome.lines.len());
    if let Err(e) = email::send(&subject, &outcome.lines.join("\n")).await {
        // Readings are already committed; a lost report is only worth a log line.
        log::error!("Failed to send weather report: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_tick_period_clamps_zero_to_one_minute() {
        assert_eq!(tick_period(0), Duration::from_secs(60));
        assert_eq!(tick_period(1), Duration::from_secs(60));
        assert_eq!(tick_period(60), Duration::from_secs(3600));
    }

    fn stub_weather(lat: f64, lon: f64) -> CurrentWeather {
        CurrentWeather {
            temperature_c: 11.5,
            windspeed_kmh: 4.0,
            latitude: lat,
            longitude: lon,
        }
    }

    #[tokio::test]
    async fn test_batch_isolates_single_city_failure() {
        let conn = Connection::open_in_memory().unwrap();
        readings::init_tables(&conn).unwrap();

        let bad_lat = CITY_REGISTRY[1].latitude;
        let outcome = run_ingest_batch(
            |lat, lon| async move {
                if lat == bad_lat {
                    Err(FetchError::UpstreamUnavailable("connection refused".into()))
                } else {
                    Ok(stub_weather(lat, lon))
                }
            },
            |w| readings::insert(&conn, w.temperature_c, w.windspeed_kmh, w.latitude, w.longitude, None),
        )
        .await;

        // One city failed, the other four were persisted.
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.lines.len(), 4);
        assert_eq!(readings::list_recent(&conn, 50).unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_batch_with_all_failures_reports_no_lines() {
        let conn = Connection::open_in_memory().unwrap();
        readings::init_tables(&conn).unwrap();

        let outcome = run_ingest_batch(
            |_lat, _lon| async { Err(FetchError::UpstreamHttp(503)) },
            |w| readings::insert(&conn, w.temperature_c, w.windspeed_kmh, w.latitude, w.longitude, None),
        )
        .await;

        assert_eq!(outcome.failed, CITY_REGISTRY.len());
        assert!(outcome.lines.is_empty());
        assert!(readings::list_recent(&conn, 50).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_isolates_persist_failure() {
        let conn = Connection::open_in_memory().unwrap();
        readings::init_tables(&conn).unwrap();

        let bad_lat = CITY_REGISTRY[0].latitude;
        let outcome = run_ingest_batch(
            |lat, lon| async move { Ok(stub_weather(lat, lon)) },
            |w| {
                if w.latitude == bad_lat {
                    Err(StoreError::NotFound)
                } else {
                    readings::insert(&conn, w.temperature_c, w.windspeed_kmh, w.latitude, w.longitude, None)
                }
            },
        )
        .await;

        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.lines.len(), 4);
    }

    #[tokio::test]
    async fn test_batch_report_lines_name_each_city() {
        let conn = Connection::open_in_memory().unwrap();
        readings::init_tables(&conn).unwrap();

        let outcome = run_ingest_batch(
            |lat, lon| async move { Ok(stub_weather(lat, lon)) },
            |w| readings::insert(&conn, w.temperature_c, w.windspeed_kmh, w.latitude, w.longitude, None),
        )
        .await;

        assert_eq!(outcome.lines.len(), CITY_REGISTRY.len());
        for (line, city) in outcome.lines.iter().zip(CITY_REGISTRY) {
            assert!(line.starts_with(city.name), "line '{}' should start with '{}'", line, city.name);
            assert!(line.contains("11.5 °C"));
        }
    }
}
