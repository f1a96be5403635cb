//! Shared test utilities for config module tests.

use std::sync::Mutex;

/// Mutex to serialize environment variable tests and prevent race conditions.
pub static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Set an environment variable. Callers must hold `ENV_MUTEX`.
pub fn set_env(name: &str, value: &str) {
    #[allow(clippy::disallowed_methods)]
    unsafe {
        std::env::set_var(name, value);
    }
}

/// Clean up environment variables used by memoria config.
pub fn cleanup_env_vars() {
    for var in super::overrides::ENV_VARS.iter().chain(["MEMORIA_CONFIG"].iter()) {
        #[allow(clippy::disallowed_methods)]
        unsafe {
            std::env::remove_var(var);
        }
    }
}
