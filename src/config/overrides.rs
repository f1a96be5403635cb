//! Environment variable overrides for configuration.

use crate::errors::Error;

use super::env_parser::{apply, parse_env_number, parse_env_path, parse_env_string};
use super::Config;

/// Every variable read by `apply_env_overrides`.
#[cfg(test)]
pub(super) const ENV_VARS: &[&str] = &[
    "MEMORIA_DATABASE_URL",
    "MEMORIA_DB_DIR",
    "MEMORIA_DB_NAME",
    "MEMORIA_POOL_MIN",
    "MEMORIA_POOL_MAX",
    "MEMORIA_ACQUIRE_TIMEOUT_MS",
    "MEMORIA_STATEMENT_TIMEOUT_MS",
    "MEMORIA_CLOSE_GRACE_MS",
    "MEMORIA_DEFAULT_TOP_K",
    "MEMORIA_LOG_LEVEL",
];

/// Apply environment variable overrides to configuration.
///
/// A variable that is set but empty is an error, not "unset".
pub fn apply_env_overrides(config: &mut Config) -> Result<(), Error> {
    if let Ok(val) = std::env::var("MEMORIA_DATABASE_URL") {
        config.database_url = Some(parse_env_string("MEMORIA_DATABASE_URL", &val)?);
    }
    if let Ok(val) = std::env::var("MEMORIA_DB_DIR") {
        config.database_dir = Some(parse_env_path("MEMORIA_DB_DIR", &val)?);
    }
    if let Ok(val) = std::env::var("MEMORIA_DB_NAME") {
        config.database_name = Some(parse_env_string("MEMORIA_DB_NAME", &val)?);
    }

    apply("MEMORIA_POOL_MIN", &mut config.pool_min_size, parse_env_number)?;
    apply("MEMORIA_POOL_MAX", &mut config.pool_max_size, parse_env_number)?;
    apply(
        "MEMORIA_ACQUIRE_TIMEOUT_MS",
        &mut config.acquire_timeout_ms,
        parse_env_number,
    )?;
    apply(
        "MEMORIA_STATEMENT_TIMEOUT_MS",
        &mut config.statement_timeout_ms,
        parse_env_number,
    )?;
    apply(
        "MEMORIA_CLOSE_GRACE_MS",
        &mut config.close_grace_ms,
        parse_env_number,
    )?;
    apply(
        "MEMORIA_DEFAULT_TOP_K",
        &mut config.default_top_k,
        parse_env_number,
    )?;
    apply("MEMORIA_LOG_LEVEL", &mut config.log_level, parse_env_string)?;
    Ok(())
}
