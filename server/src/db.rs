use anyhow::Result;
use once_cell::sync::OnceCell;
use rusqlite::Connection;
use std::sync::Mutex;

use crate::readings::{self, StoreError};

static DB: OnceCell<Mutex<Connection>> = OnceCell::new();

/// Open the database at the given path and create the schema if needed.
pub fn init(path: &str) -> Result<()> {
    let conn = Connection::open(path)?;
    readings::init_tables(&conn)?;
    DB.set(Mutex::new(conn))
        .map_err(|_| anyhow::anyhow!("Database already initialized"))?;
    Ok(())
}

/// Scoped access to the global connection. The lock is released on every
/// exit path, including errors, when the guard drops.
pub fn with_connection<T>(
    f: impl FnOnce(&Connection) -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    let conn = DB
        .get()
        .expect("Database not initialized - call db::init() first")
        .lock()
        .expect("Database lock poisoned");
    f(&conn)
}

#[cfg(test)]
pub fn init_test() {
    if DB.get().is_none() {
        let conn = Connection::open_in_memory().expect("Failed to open in-memory database");
        readings::init_tables(&conn).expect("Failed to create schema");
        // A concurrent test may have won the race; its connection is as
        // good as ours.
        let _ = DB.set(Mutex::new(conn));
    }
}
