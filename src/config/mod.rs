//! Configuration system for memoria.

mod env_parser;
mod loader;
mod overrides;
mod paths;
mod validation;

#[cfg(test)]
mod tests_utils;

use crate::errors::Error;
use crate::memory::store::DEFAULT_TOP_K;
use crate::pool::{ConnectionTarget, PoolConfig, PoolOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use loader::ConfigFile;

/// Configuration values with priority: defaults < config file < env vars.
///
/// There is no default database location: either `database_url` or both
/// `database_dir` and `database_name` must be set.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Combined connection string (`sqlite://...`, `sqlite:...`, `file:...`).
    pub database_url: Option<String>,
    /// Directory holding the database file.
    pub database_dir: Option<PathBuf>,
    /// Database name inside `database_dir`.
    pub database_name: Option<String>,
    pub pool_min_size: usize,
    pub pool_max_size: usize,
    pub acquire_timeout_ms: u64,
    pub statement_timeout_ms: u64,
    pub close_grace_ms: u64,
    /// Result count for searches that do not ask for one.
    pub default_top_k: usize,
    /// Fallback log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        let pool = PoolOptions::default();
        Self {
            database_url: None,
            database_dir: None,
            database_name: None,
            pool_min_size: pool.min_size,
            pool_max_size: pool.max_size,
            acquire_timeout_ms: pool.acquire_timeout.as_millis() as u64,
            statement_timeout_ms: pool.statement_timeout.as_millis() as u64,
            close_grace_ms: pool.close_grace.as_millis() as u64,
            default_top_k: DEFAULT_TOP_K,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration with defaults, file values, and environment overrides.
    ///
    /// The file is `$MEMORIA_CONFIG` if set, else `<config dir>/memoria/config.toml`.
    pub fn load() -> Result<Self, Error> {
        let path = loader::config_file_path();
        Self::load_from(path.as_deref())
    }

    /// Like `load`, reading the given file (if any) instead of the default location.
    pub fn load_from(path: Option<&Path>) -> Result<Self, Error> {
        let mut config = Config::default();

        if let Some(path) = path {
            if let Some(mut file) = loader::load_from_file(path)? {
                if let Some(dir) = file.database_dir.as_mut() {
                    paths::expand_tilde(dir);
                }
                config.merge_from_file(file);
            }
        }

        overrides::apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(config)
    }

    /// Merge configuration from a file into this config.
    fn merge_from_file(&mut self, file: ConfigFile) {
        if let Some(url) = file.database_url {
            self.database_url = Some(url);
        }
        if let Some(dir) = file.database_dir {
            self.database_dir = Some(dir);
        }
        if let Some(name) = file.database_name {
            self.database_name = Some(name);
        }
        if let Some(pool) = file.pool {
            if let Some(min) = pool.min_size {
                self.pool_min_size = min;
            }
            if let Some(max) = pool.max_size {
                self.pool_max_size = max;
            }
            if let Some(ms) = pool.acquire_timeout_ms {
                self.acquire_timeout_ms = ms;
            }
            if let Some(ms) = pool.statement_timeout_ms {
                self.statement_timeout_ms = ms;
            }
            if let Some(ms) = pool.close_grace_ms {
                self.close_grace_ms = ms;
            }
        }
        if let Some(top_k) = file.default_top_k {
            self.default_top_k = top_k;
        }
        if let Some(level) = file.log_level {
            self.log_level = level;
        }
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<(), Error> {
        validation::ConfigValidator { config: self }.validate()
    }

    /// Where the pool connects. A URL wins over directory + name.
    pub fn connection_target(&self) -> Result<ConnectionTarget, Error> {
        if let Some(url) = &self.database_url {
            return Ok(ConnectionTarget::Url(url.clone()));
        }
        match (&self.database_dir, &self.database_name) {
            (Some(directory), Some(database)) => Ok(ConnectionTarget::Descriptor {
                directory: directory.clone(),
                database: database.clone(),
            }),
            _ => Err(Error::Config(
                "No database configured: set MEMORIA_DATABASE_URL, or MEMORIA_DB_DIR and MEMORIA_DB_NAME"
                    .to_string(),
            )),
        }
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            min_size: self.pool_min_size,
            max_size: self.pool_max_size,
            acquire_timeout: Duration::from_millis(self.acquire_timeout_ms),
            statement_timeout: Duration::from_millis(self.statement_timeout_ms),
            close_grace: Duration::from_millis(self.close_grace_ms),
        }
    }

    /// Everything `ConnectionPool::initialize` needs.
    pub fn pool_config(&self) -> Result<PoolConfig, Error> {
        Ok(PoolConfig::new(self.connection_target()?).with_options(self.pool_options()))
    }
}
