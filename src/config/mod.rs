use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    /// Explicit template database location, tried before the packaged
    /// search locations.
    #[serde(default)]
    pub template_path: Option<String>,
}

/// Returns the base tempo data directory: ~/.tempo/
pub fn base_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    Ok(home.join(".tempo"))
}

/// Returns the path to the writable `SQLite` database
pub fn db_path() -> Result<PathBuf> {
    Ok(base_dir()?.join("tempo.db"))
}

/// Ensure all required directories exist
pub fn ensure_dirs() -> Result<()> {
    let base = base_dir()?;
    fs::create_dir_all(&base).context("failed to create ~/.tempo/")?;
    Ok(())
}

/// Load config from ~/.tempo/config.toml (or return defaults if it doesn't exist)
pub fn load() -> Result<Config> {
    let path = base_dir()?.join("config.toml");
    if path.exists() {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    } else {
        Ok(Config::default())
    }
}

/// Ordered search locations for the read-only template database.
///
/// Covers the layouts an installed copy may use: an explicit `TEMPO_TEMPLATE`
/// override, a `template_path` from config.toml, the data directory itself
/// (written by `tempo init`), the executable's own directory, a share/
/// directory next to it, and finally the working directory for development
/// runs.
pub fn template_candidates(config: &Config) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(path) = std::env::var("TEMPO_TEMPLATE") {
        candidates.push(PathBuf::from(path));
    }
    if let Some(ref path) = config.template_path {
        candidates.push(PathBuf::from(path));
    }
    if let Ok(base) = base_dir() {
        candidates.push(base.join("template.db"));
    }
    if let Ok(exe) = std::env::current_exe()
        && let Some(dir) = exe.parent()
    {
        candidates.push(dir.join("template.db"));
        candidates.push(dir.join("../share/tempo/template.db"));
    }
    candidates.push(PathBuf::from("template.db"));
    candidates
}
