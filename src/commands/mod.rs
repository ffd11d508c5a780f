// Loadbook - Commands Module
// Application operations organized by domain, over one store connection

pub mod import;
pub mod loads;

pub use import::ImportStatus;

use std::path::Path;
use rusqlite::Connection;

use crate::db::{open_db, open_in_memory};
use crate::error::Result;

/// The load store. Owns a single connection; every operation is synchronous.
pub struct LoadBook {
    conn: Connection,
}

impl LoadBook {
    /// Open (creating if needed) the store at `path` and bring its schema up to date.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = open_db(path)?;
        log::info!("Opened load store at {}", path.display());
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self { conn: open_in_memory()? })
    }
}
