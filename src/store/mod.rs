mod bootstrap;
mod hierarchy;
mod models;
mod queries;

pub use bootstrap::write_template;
pub use models::*;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::config;

pub struct Store {
    pub conn: Connection,
}

impl Store {
    /// Open the store at the configured location. Bootstraps the writable
    /// database from a template and patches its schema before the first
    /// query runs.
    pub fn open() -> Result<Self> {
        let cfg = config::load()?;
        let db_path = config::db_path()?;
        let candidates = config::template_candidates(&cfg);
        Self::open_at(&db_path, &candidates)
    }

    /// Open the store at an explicit path with explicit template candidates.
    pub fn open_at(db_path: &Path, template_candidates: &[PathBuf]) -> Result<Self> {
        bootstrap::ensure_database(db_path, template_candidates)?;
        let conn = Connection::open(db_path)
            .with_context(|| format!("failed to open database at {}", db_path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        bootstrap::migrate(&conn)?;
        Ok(Store { conn })
    }

    /// Scratch store with the full current schema, no file behind it.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(bootstrap::TEMPLATE_SCHEMA)?;
        Ok(Store { conn })
    }
}
