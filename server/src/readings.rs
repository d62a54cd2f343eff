use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;

/// One persisted weather observation. Append-only: rows are never updated,
/// and deleted only in bulk through `reset`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub id: i64,
    pub temperature_c: f64,
    pub windspeed_kmh: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub fetched_at: DateTime<Utc>,
}

/// Aggregate view over all readings. Every float is rounded to 2 decimal
/// places; an empty table yields zeros rather than an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub count: i64,
    pub avg_temp: f64,
    pub min_temp: f64,
    pub max_temp: f64,
    pub avg_wind: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),
}

/// Initialize the readings table (idempotent, no schema versioning).
pub fn init_tables(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS readings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            temperature_c REAL NOT NULL,
            windspeed_kmh REAL NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            fetched_at INTEGER NOT NULL
        );
        ",
    )?;

    Ok(())
}

/// Insert one reading and return the stored row with its assigned id.
///
/// `fetched_at` defaults to the insertion time when not supplied. The
/// single-row insert either commits fully or fails with no partial row.
pub fn insert(
    conn: &Connection,
    temperature_c: f64,
    windspeed_kmh: f64,
    latitude: f64,
    longitude: f64,
    fetched_at: Option<DateTime<Utc>>,
) -> Result<Reading, StoreError> {
    let fetched_at_ms = fetched_at.unwrap_or_else(Utc::now).timestamp_millis();

    conn.execute(
        "INSERT INTO readings (temperature_c, windspeed_kmh, latitude, longitude, fetched_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![temperature_c, windspeed_kmh, latitude, longitude, fetched_at_ms],
    )?;

    Ok(Reading {
        id: conn.last_insert_rowid(),
        temperature_c,
        windspeed_kmh,
        latitude,
        longitude,
        fetched_at: from_millis(fetched_at_ms),
    })
}

/// The most recent `limit` readings, returned oldest-to-newest for display.
pub fn list_recent(conn: &Connection, limit: i64) -> Result<Vec<Reading>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, temperature_c, windspeed_kmh, latitude, longitude, fetched_at
         FROM readings ORDER BY id DESC LIMIT ?1",
    )?;

    let mut rows = stmt
        .query_map(params![limit], row_to_reading)?
        .collect::<Result<Vec<_>, _>>()?;

    rows.reverse();
    Ok(rows)
}

pub fn get_by_id(conn: &Connection, id: i64) -> Result<Reading, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, temperature_c, windspeed_kmh, latitude, longitude, fetched_at
         FROM readings WHERE id = ?1",
    )?;

    stmt.query_row(params![id], row_to_reading).map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        e => StoreError::Persistence(e),
    })
}

pub fn stats(conn: &Connection) -> Result<Stats, StoreError> {
    let stats = conn.query_row(
        "SELECT COUNT(id), AVG(temperature_c), MIN(temperature_c), MAX(temperature_c),
                AVG(windspeed_kmh)
         FROM readings",
        [],
        |row| {
            Ok(Stats {
                count: row.get(0)?,
                avg_temp: round2(row.get::<_, Option<f64>>(1)?.unwrap_or(0.0)),
                min_temp: round2(row.get::<_, Option<f64>>(2)?.unwrap_or(0.0)),
                max_temp: round2(row.get::<_, Option<f64>>(3)?.unwrap_or(0.0)),
                avg_wind: round2(row.get::<_, Option<f64>>(4)?.unwrap_or(0.0)),
            })
        },
    )?;

    Ok(stats)
}

/// Delete all readings and return how many were removed.
pub fn reset(conn: &Connection) -> Result<u64, StoreError> {
    let deleted = conn.execute("DELETE FROM readings", [])?;
    Ok(deleted as u64)
}

fn row_to_reading(row: &rusqlite::Row) -> rusqlite::Result<Reading> {
    let fetched_at_ms: i64 = row.get(5)?;
    Ok(Reading {
        id: row.get(0)?,
        temperature_c: row.get(1)?,
        windspeed_kmh: row.get(2)?,
        latitude: row.get(3)?,
        longitude: row.get(4)?,
        fetched_at: from_millis(fetched_at_ms),
    })
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::UNIX_EPOCH)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_tables(&conn).unwrap();
        conn
    }

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let conn = setup_test_db();

        let first = insert(&conn, 10.0, 5.0, 47.4979, 19.0402, None).unwrap();
        let second = insert(&conn, 11.0, 6.0, 47.4979, 19.0402, None).unwrap();
        let third = insert(&conn, 12.0, 7.0, 47.4979, 19.0402, None).unwrap();

        assert!(first.id < second.id);
        assert!(second.id < third.id);
    }

    #[test]
    fn test_insert_then_get_by_id_round_trips() {
        let conn = setup_test_db();

        let fetched_at = DateTime::from_timestamp_millis(1_714_560_000_000).unwrap();
        let stored = insert(&conn, 20.5, 10.25, 47.4979, 19.0402, Some(fetched_at)).unwrap();
        let loaded = get_by_id(&conn, stored.id).unwrap();

        assert_eq!(loaded, stored);
        assert_eq!(loaded.temperature_c, 20.5);
        assert_eq!(loaded.windspeed_kmh, 10.25);
        assert_eq!(loaded.latitude, 47.4979);
        assert_eq!(loaded.longitude, 19.0402);
        assert_eq!(loaded.fetched_at, fetched_at);
    }

    #[test]
    fn test_insert_defaults_fetched_at_to_now() {
        let conn = setup_test_db();

        let before = Utc::now();
        let stored = insert(&conn, 1.0, 2.0, 3.0, 4.0, None).unwrap();
        let after = Utc::now();

        // Stored with millisecond precision, so compare at that granularity.
        assert!(stored.fetched_at.timestamp_millis() >= before.timestamp_millis());
        assert!(stored.fetched_at.timestamp_millis() <= after.timestamp_millis());
    }

    #[test]
    fn test_get_by_id_missing_is_not_found() {
        let conn = setup_test_db();

        match get_by_id(&conn, 42) {
            Err(StoreError::NotFound) => (),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_list_recent_caps_at_limit_in_ascending_order() {
        let conn = setup_test_db();

        for i in 0..5 {
            insert(&conn, i as f64, 0.0, 1.0, 1.0, None).unwrap();
        }

        let rows = list_recent(&conn, 3).unwrap();

        assert_eq!(rows.len(), 3);
        // The 3 most recent, oldest first.
        assert_eq!(rows[0].temperature_c, 2.0);
        assert_eq!(rows[1].temperature_c, 3.0);
        assert_eq!(rows[2].temperature_c, 4.0);
        assert!(rows[0].id < rows[1].id && rows[1].id < rows[2].id);
    }

    #[test]
    fn test_list_recent_returns_all_when_under_limit() {
        let conn = setup_test_db();

        insert(&conn, 1.0, 0.0, 1.0, 1.0, None).unwrap();
        insert(&conn, 2.0, 0.0, 1.0, 1.0, None).unwrap();

        let rows = list_recent(&conn, 50).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_stats_over_empty_table_is_all_zeros() {
        let conn = setup_test_db();

        let s = stats(&conn).unwrap();

        assert_eq!(
            s,
            Stats {
                count: 0,
                avg_temp: 0.0,
                min_temp: 0.0,
                max_temp: 0.0,
                avg_wind: 0.0,
            }
        );
    }

    #[test]
    fn test_stats_matches_reference_computation() {
        let conn = setup_test_db();

        // Budapest and Pécs sample readings.
        insert(&conn, 20.0, 10.0, 47.4979, 19.0402, None).unwrap();
        insert(&conn, 5.0, 30.0, 46.0727, 18.2323, None).unwrap();

        let s = stats(&conn).unwrap();

        assert_eq!(s.count, 2);
        assert_eq!(s.avg_temp, 12.5);
        assert_eq!(s.min_temp, 5.0);
        assert_eq!(s.max_temp, 20.0);
        assert_eq!(s.avg_wind, 20.0);
    }

    #[test]
    fn test_stats_rounds_to_two_decimals() {
        let conn = setup_test_db();

        insert(&conn, 10.0, 1.0, 1.0, 1.0, None).unwrap();
        insert(&conn, 10.0, 1.0, 1.0, 1.0, None).unwrap();
        insert(&conn, 11.0, 2.0, 1.0, 1.0, None).unwrap();

        let s = stats(&conn).unwrap();

        // 31 / 3 = 10.333..., 4 / 3 = 1.333...
        assert_eq!(s.avg_temp, 10.33);
        assert_eq!(s.avg_wind, 1.33);
    }

    #[test]
    fn test_reset_deletes_everything_and_reports_count() {
        let conn = setup_test_db();

        for _ in 0..4 {
            insert(&conn, 1.0, 1.0, 1.0, 1.0, None).unwrap();
        }

        let deleted = reset(&conn).unwrap();
        assert_eq!(deleted, 4);

        assert!(list_recent(&conn, 50).unwrap().is_empty());
        assert_eq!(stats(&conn).unwrap().count, 0);
    }

    #[test]
    fn test_reset_on_empty_table_deletes_nothing() {
        let conn = setup_test_db();
        assert_eq!(reset(&conn).unwrap(), 0);
    }
}
