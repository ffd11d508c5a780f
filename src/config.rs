// Loadbook configuration
// Resolved from .env, the process environment, then platform defaults.

use std::path::PathBuf;
use anyhow::{Context, Result};

use crate::constants::{APP_DIR_NAME, DB_FILENAME, DEFAULT_PAGE_LIMIT, ENV_DATABASE_PATH, ENV_PAGE_LIMIT};

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub page_limit: i64,
}

impl AppConfig {
    /// Load configuration. A `.env` file in the working directory is applied first
    /// but never overrides variables already set in the environment.
    pub fn load() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                log::warn!("Ignoring unreadable .env file: {}", e);
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_path = match lookup(ENV_DATABASE_PATH).filter(|v| !v.trim().is_empty()) {
            Some(path) => PathBuf::from(path),
            None => default_db_path()?,
        };

        let page_limit = match lookup(ENV_PAGE_LIMIT) {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|v| *v > 0)
                .with_context(|| format!("{} must be a positive integer, got {:?}", ENV_PAGE_LIMIT, raw))?,
            None => DEFAULT_PAGE_LIMIT,
        };

        Ok(Self { database_path, page_limit })
    }

    /// Replace the database path (CLI `--database` flag).
    pub fn with_database_path(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.database_path = path;
        }
        self
    }
}

/// Platform data directory, e.g. ~/.local/share/loadbook/loadbook.db
pub fn default_db_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", APP_DIR_NAME)
        .ok_or_else(|| anyhow::anyhow!("Could not determine a data directory for {}", APP_DIR_NAME))?;
    Ok(dirs.data_dir().join(DB_FILENAME))
}
