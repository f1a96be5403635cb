//! Configuration validation logic.

use crate::errors::Error;
use crate::memory::store::MAX_SEARCH_LIMIT;

use super::Config;

/// Validates configuration values.
pub struct ConfigValidator<'a> {
    pub config: &'a Config,
}

impl ConfigValidator<'_> {
    /// Validate all configuration values for correctness and constraints.
    ///
    /// Checks that:
    /// - A database is configured (URL, or directory plus name)
    /// - Pool bounds satisfy `1 <= min <= max` and timeouts are positive
    /// - The default result count is within the search limit
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if any validation check fails.
    pub fn validate(&self) -> Result<(), Error> {
        self.validate_database()?;
        self.config.pool_options().validate()?;
        self.validate_default_top_k()?;
        self.validate_log_level()?;

        Ok(())
    }

    fn validate_database(&self) -> Result<(), Error> {
        let target = self.config.connection_target()?;
        target.resolve()?;
        Ok(())
    }

    fn validate_default_top_k(&self) -> Result<(), Error> {
        if self.config.default_top_k == 0 || self.config.default_top_k > MAX_SEARCH_LIMIT {
            return Err(Error::Config(format!(
                "Invalid default_top_k: {} (must be between 1 and {MAX_SEARCH_LIMIT})",
                self.config.default_top_k
            )));
        }
        Ok(())
    }

    fn validate_log_level(&self) -> Result<(), Error> {
        if self.config.log_level.trim().is_empty() {
            return Err(Error::Config("Log level cannot be empty".to_string()));
        }
        Ok(())
    }
}
