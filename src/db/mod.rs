// Database module

pub mod migrations;
pub mod presets;
pub mod query;
pub mod schema;

use rusqlite::Connection;
use std::path::Path;
use anyhow::{Context, Result};

use crate::constants::BUSY_TIMEOUT_MS;

/// Open or create a database at the given path
pub fn open_db(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create database directory {}", parent.display()))?;
    }

    let conn = Connection::open(db_path)?;

    // Enable foreign keys (must be done per connection)
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    // WAL keeps readers unblocked while an import is writing
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
    conn.execute_batch(&format!("PRAGMA busy_timeout = {};", BUSY_TIMEOUT_MS))?;

    migrations::run_migrations(&conn)?;

    Ok(conn)
}

/// Open a private in-memory database with the full schema applied
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    migrations::run_migrations(&conn)?;
    Ok(conn)
}
