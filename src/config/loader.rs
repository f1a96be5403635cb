//! Configuration file loading and parsing.

use crate::errors::Error;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration loaded from TOML file. Absent keys keep the layer below.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default)]
    pub database_dir: Option<PathBuf>,

    #[serde(default)]
    pub database_name: Option<String>,

    #[serde(default)]
    pub pool: Option<PoolSection>,

    #[serde(default)]
    pub default_top_k: Option<usize>,

    #[serde(default)]
    pub log_level: Option<String>,
}

/// The `[pool]` table.
#[derive(Debug, Default, Deserialize)]
pub struct PoolSection {
    pub min_size: Option<usize>,
    pub max_size: Option<usize>,
    pub acquire_timeout_ms: Option<u64>,
    pub statement_timeout_ms: Option<u64>,
    pub close_grace_ms: Option<u64>,
}

/// `$MEMORIA_CONFIG`, else `<config dir>/memoria/config.toml`.
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("MEMORIA_CONFIG") {
        if !path.trim().is_empty() {
            return Some(super::paths::expand_tilde_path(Path::new(&path)));
        }
    }
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let config_dir = dirs::config_dir().unwrap_or_else(|| home.join(".config"));
    Some(config_dir.join("memoria/config.toml"))
}

/// Load configuration from a TOML file. A missing file is not an error.
pub fn load_from_file(config_path: &Path) -> Result<Option<ConfigFile>, Error> {
    if !config_path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(config_path).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file {}: {e}",
            config_path.display()
        ))
    })?;

    let config: ConfigFile = toml::from_str(&content).map_err(|e| {
        Error::Config(format!(
            "Failed to parse config file {}: {e}",
            config_path.display()
        ))
    })?;

    tracing::debug!(path = %config_path.display(), "loaded config file");
    Ok(Some(config))
}
