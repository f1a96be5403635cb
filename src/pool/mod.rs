//! Bounded connection pool with an explicit `Uninitialized → Ready → Closed` lifecycle.
//!
//! The pool is a handle: the process entry point builds one, initializes it,
//! and passes clones down to the memory store. Clones share the same state.

mod connection;
mod target;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::errors::{Error, Operation};

use self::connection::{open_connection, Slots};

pub use self::connection::PooledConnection;
pub use self::target::ConnectionTarget;

/// Upper bound for `max_size`.
pub const MAX_POOL_SIZE: usize = 1_024;

/// Pool sizing and timing knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolOptions {
    /// Connections opened eagerly by `initialize`.
    pub min_size: usize,
    /// Most connections ever open at the same time.
    pub max_size: usize,
    /// How long `acquire` waits for a free connection.
    pub acquire_timeout: Duration,
    /// How long a single statement may run.
    pub statement_timeout: Duration,
    /// How long `close` waits for checked-out connections.
    pub close_grace: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: 10,
            acquire_timeout: Duration::from_secs(5),
            statement_timeout: Duration::from_secs(30),
            close_grace: Duration::from_secs(5),
        }
    }
}

impl PoolOptions {
    /// Check `1 <= min_size <= max_size <= MAX_POOL_SIZE` and non-zero timeouts.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` describing the first violated bound.
    pub fn validate(&self) -> Result<(), Error> {
        if self.min_size == 0 {
            return Err(Error::Config("Pool min_size must be at least 1".to_string()));
        }
        if self.min_size > self.max_size {
            return Err(Error::Config(format!(
                "Pool min_size {} exceeds max_size {}",
                self.min_size, self.max_size
            )));
        }
        if self.max_size > MAX_POOL_SIZE {
            return Err(Error::Config(format!(
                "Pool max_size {} exceeds maximum allowed ({})",
                self.max_size, MAX_POOL_SIZE
            )));
        }
        if self.acquire_timeout.is_zero() || self.statement_timeout.is_zero() {
            return Err(Error::Config(
                "Pool timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Everything `initialize` needs.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub target: ConnectionTarget,
    pub options: PoolOptions,
}

impl PoolConfig {
    pub fn new(target: ConnectionTarget) -> Self {
        Self {
            target,
            options: PoolOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PoolOptions) -> Self {
        self.options = options;
        self
    }
}

/// Lifecycle state as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolState {
    Uninitialized,
    Ready,
    Closed,
}

/// Point-in-time pool occupancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub state: PoolState,
    pub open: usize,
    pub idle: usize,
    pub max_size: usize,
}

enum State {
    Uninitialized,
    Ready(Arc<Slots>),
    Closed,
}

/// Shared handle to the process's connection pool.
#[derive(Clone)]
pub struct ConnectionPool {
    state: Arc<Mutex<State>>,
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionPool {
    /// Create a pool in the `Uninitialized` state. No connections are opened.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::Uninitialized)),
        }
    }

    /// Open `min_size` connections and move to `Ready`.
    ///
    /// Allowed from `Uninitialized` and `Closed`. On failure the pool keeps
    /// its previous state and the call may be retried.
    ///
    /// # Errors
    ///
    /// - `Error::AlreadyInitialized` if the pool is `Ready` (the pool is left untouched)
    /// - `Error::Config` for invalid options or an unusable target
    /// - `Error::ConnectionFailed` if any eager connection cannot be opened
    pub async fn initialize(&self, config: PoolConfig) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        if matches!(*state, State::Ready(_)) {
            return Err(Error::AlreadyInitialized);
        }

        config.options.validate()?;
        let filename = config.target.resolve()?;
        let target = config.target.to_string();

        let min_size = config.options.min_size;
        let busy = config.options.statement_timeout;
        let open_target = filename.clone();
        let warm = tokio::task::spawn_blocking(move || {
            (0..min_size)
                .map(|_| open_connection(&open_target, busy))
                .collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
        .map_err(|e| Error::TaskFailed(e.to_string()))?
        .map_err(|source| {
            tracing::error!(database = %target, error = %source, "failed to initialize connection pool");
            Error::ConnectionFailed {
                target: target.clone(),
                source,
            }
        })?;

        tracing::info!(
            database = %target,
            min_size,
            max_size = config.options.max_size,
            "connection pool initialized"
        );
        *state = State::Ready(Arc::new(Slots::new(filename, target, config.options, warm)));
        Ok(())
    }

    /// Check out a connection for one unit of work.
    ///
    /// Waits up to the acquire timeout when every connection is in use. Outside
    /// the crate the returned lease only holds a slot; it cannot run statements.
    ///
    /// # Errors
    ///
    /// - `Error::NotInitialized` before `initialize` or after `close`
    /// - `Error::PoolExhausted` when the acquire timeout elapses
    /// - `Error::ConnectionFailed` when a lazily opened connection fails
    pub async fn acquire(&self) -> Result<PooledConnection, Error> {
        let slots = self.slots().await?;
        slots.checkout().await
    }

    /// Fail with `Error::NotInitialized` unless the pool is `Ready`.
    pub(crate) async fn ensure_ready(&self) -> Result<(), Error> {
        self.slots().await.map(|_| ())
    }

    /// Run `SELECT 1` on a pooled connection.
    pub async fn ping(&self) -> Result<(), Error> {
        let conn = self.acquire().await?;
        conn.run(Operation::HealthCheck, |conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
        })
        .await
        .map(|_| ())
    }

    /// Wait for checked-out connections (bounded by the close grace period),
    /// then close every connection and move to `Closed`.
    ///
    /// A no-op unless the pool is `Ready`. `initialize` may be called again afterwards.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        let slots = match std::mem::replace(&mut *state, State::Closed) {
            State::Ready(slots) => slots,
            previous => {
                *state = previous;
                return;
            }
        };

        let grace = slots.options.close_grace;
        if !slots.drain(grace).await {
            tracing::warn!(
                database = %slots.target,
                ?grace,
                still_open = slots.open_count().saturating_sub(slots.idle_count()),
                "closing pool with connections still checked out"
            );
        }

        let idle = slots.take_idle();
        let closed = idle.len();
        let result = tokio::task::spawn_blocking(move || {
            for conn in idle {
                if let Err((_, e)) = conn.close() {
                    tracing::warn!(error = %e, "failed to close pooled connection");
                }
            }
        })
        .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "connection close task failed");
        }

        tracing::info!(database = %slots.target, closed, "connection pool closed");
    }

    /// Current lifecycle state and occupancy.
    pub async fn status(&self) -> PoolStatus {
        match &*self.state.lock().await {
            State::Uninitialized => PoolStatus {
                state: PoolState::Uninitialized,
                open: 0,
                idle: 0,
                max_size: 0,
            },
            State::Closed => PoolStatus {
                state: PoolState::Closed,
                open: 0,
                idle: 0,
                max_size: 0,
            },
            State::Ready(slots) => PoolStatus {
                state: PoolState::Ready,
                open: slots.open_count(),
                idle: slots.idle_count(),
                max_size: slots.options.max_size,
            },
        }
    }

    async fn slots(&self) -> Result<Arc<Slots>, Error> {
        match &*self.state.lock().await {
            State::Ready(slots) => Ok(Arc::clone(slots)),
            State::Uninitialized | State::Closed => Err(Error::NotInitialized),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir, min_size: usize, max_size: usize) -> PoolConfig {
        PoolConfig::new(ConnectionTarget::Descriptor {
            directory: dir.path().to_path_buf(),
            database: "pool_test".to_string(),
        })
        .with_options(PoolOptions {
            min_size,
            max_size,
            acquire_timeout: Duration::from_millis(200),
            statement_timeout: Duration::from_secs(5),
            close_grace: Duration::from_millis(200),
        })
    }

    #[tokio::test]
    async fn test_acquire_before_initialize_fails() {
        let pool = ConnectionPool::new();
        assert!(matches!(pool.acquire().await, Err(Error::NotInitialized)));
        assert_eq!(pool.status().await.state, PoolState::Uninitialized);
    }

    #[tokio::test]
    async fn test_initialize_opens_min_size_eagerly() {
        let dir = TempDir::new().unwrap();
        let pool = ConnectionPool::new();
        pool.initialize(test_config(&dir, 2, 4)).await.unwrap();

        let status = pool.status().await;
        assert_eq!(status.state, PoolState::Ready);
        assert_eq!(status.open, 2);
        assert_eq!(status.idle, 2);
        assert_eq!(status.max_size, 4);
        pool.close().await;
    }

    #[tokio::test]
    async fn test_double_initialize_leaves_pool_untouched() {
        let dir = TempDir::new().unwrap();
        let pool = ConnectionPool::new();
        pool.initialize(test_config(&dir, 2, 4)).await.unwrap();
        let before = pool.status().await;

        let other = TempDir::new().unwrap();
        let result = pool.initialize(test_config(&other, 1, 1)).await;
        assert!(matches!(result, Err(Error::AlreadyInitialized)));
        assert_eq!(pool.status().await, before);
        pool.ping().await.unwrap();
        pool.close().await;
    }

    #[tokio::test]
    async fn test_failed_initialize_stays_uninitialized() {
        let dir = TempDir::new().unwrap();
        let pool = ConnectionPool::new();
        let missing = PoolConfig::new(ConnectionTarget::Descriptor {
            directory: dir.path().join("does/not/exist"),
            database: "memories".to_string(),
        });

        let result = pool.initialize(missing).await;
        assert!(matches!(result, Err(Error::ConnectionFailed { .. })));
        assert_eq!(pool.status().await.state, PoolState::Uninitialized);

        pool.initialize(test_config(&dir, 1, 2)).await.unwrap();
        assert_eq!(pool.status().await.state, PoolState::Ready);
        pool.close().await;
    }

    #[tokio::test]
    async fn test_invalid_options_rejected() {
        let dir = TempDir::new().unwrap();
        let pool = ConnectionPool::new();
        let result = pool.initialize(test_config(&dir, 3, 2)).await;
        assert!(matches!(result, Err(Error::Config(_))));
        let result = pool.initialize(test_config(&dir, 0, 2)).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_connections_open_lazily_up_to_max() {
        let dir = TempDir::new().unwrap();
        let pool = ConnectionPool::new();
        pool.initialize(test_config(&dir, 1, 3)).await.unwrap();

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        let c = pool.acquire().await.unwrap();
        assert_eq!(pool.status().await.open, 3);
        assert!(matches!(
            pool.acquire().await,
            Err(Error::PoolExhausted { .. })
        ));

        drop((a, b, c));
        let status = pool.status().await;
        assert_eq!(status.open, 3);
        assert_eq!(status.idle, 3);
        pool.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_second_acquire_waits_for_release() {
        let dir = TempDir::new().unwrap();
        let pool = ConnectionPool::new();
        pool.initialize(test_config(&dir, 1, 1)).await.unwrap();

        let first = pool.acquire().await.unwrap();
        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(first);
        waiter.await.unwrap().unwrap();
        pool.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_second_acquire_times_out_when_held() {
        let dir = TempDir::new().unwrap();
        let pool = ConnectionPool::new();
        pool.initialize(test_config(&dir, 1, 1)).await.unwrap();

        let _held = pool.acquire().await.unwrap();
        let result = pool.acquire().await;
        assert!(matches!(result, Err(Error::PoolExhausted { .. })));
    }

    #[tokio::test]
    async fn test_connection_returned_after_statement_error() {
        let dir = TempDir::new().unwrap();
        let pool = ConnectionPool::new();
        pool.initialize(test_config(&dir, 1, 1)).await.unwrap();

        let conn = pool.acquire().await.unwrap();
        let result = conn
            .run(Operation::Lookup, |conn| {
                conn.execute("SELECT * FROM no_such_table", []).map(|_| ())
            })
            .await;
        assert!(matches!(
            result,
            Err(Error::Statement {
                operation: Operation::Lookup,
                ..
            })
        ));

        // max_size is 1, so this only succeeds if the connection came back.
        pool.ping().await.unwrap();
        pool.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_statement_timeout_interrupts() {
        let dir = TempDir::new().unwrap();
        let pool = ConnectionPool::new();
        let mut config = test_config(&dir, 1, 1);
        config.options.statement_timeout = Duration::from_millis(100);
        config.options.acquire_timeout = Duration::from_secs(5);
        pool.initialize(config).await.unwrap();

        let conn = pool.acquire().await.unwrap();
        let result = conn
            .run(Operation::Search, |conn| {
                conn.query_row(
                    "WITH RECURSIVE spin(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM spin)
                     SELECT count(*) FROM spin",
                    [],
                    |row| row.get::<_, i64>(0),
                )
            })
            .await;
        assert!(matches!(
            result,
            Err(Error::Timeout {
                operation: Operation::Search,
                ..
            })
        ));

        // The interrupted statement unwinds and the connection is reusable.
        pool.ping().await.unwrap();
        pool.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timeout_after_work_finished_spares_next_holder() {
        let dir = TempDir::new().unwrap();
        let pool = ConnectionPool::new();
        let mut config = test_config(&dir, 1, 1);
        config.options.statement_timeout = Duration::from_millis(50);
        config.options.acquire_timeout = Duration::from_secs(5);
        pool.initialize(config).await.unwrap();

        // The statement completes; only the closure outlives the timeout.
        let conn = pool.acquire().await.unwrap();
        let result = conn
            .run(Operation::Add, |conn| {
                let one = conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
                std::thread::sleep(Duration::from_millis(150));
                Ok(one)
            })
            .await;
        assert!(matches!(result, Err(Error::Timeout { .. })));

        // max_size is 1: this waits for the same connection, which must not
        // carry the interrupt into its next statement.
        let conn = pool.acquire().await.unwrap();
        let count = conn
            .run(Operation::Lookup, |conn| {
                conn.query_row(
                    "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 1000)
                     SELECT count(*) FROM n",
                    [],
                    |row| row.get::<_, i64>(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(count, 1000);
        pool.close().await;
    }

    #[tokio::test]
    async fn test_close_then_reinitialize() {
        let dir = TempDir::new().unwrap();
        let pool = ConnectionPool::new();
        pool.initialize(test_config(&dir, 1, 2)).await.unwrap();
        pool.close().await;

        assert_eq!(pool.status().await.state, PoolState::Closed);
        assert!(matches!(pool.acquire().await, Err(Error::NotInitialized)));

        pool.initialize(test_config(&dir, 1, 2)).await.unwrap();
        pool.ping().await.unwrap();
        pool.close().await;
    }

    #[tokio::test]
    async fn test_close_uninitialized_is_noop() {
        let pool = ConnectionPool::new();
        pool.close().await;
        assert_eq!(pool.status().await.state, PoolState::Uninitialized);
    }

    #[tokio::test]
    async fn test_close_waits_for_checked_out_connection() {
        let dir = TempDir::new().unwrap();
        let pool = ConnectionPool::new();
        let mut config = test_config(&dir, 1, 1);
        config.options.close_grace = Duration::from_secs(5);
        pool.initialize(config).await.unwrap();

        let held = pool.acquire().await.unwrap();
        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(held);
        });
        pool.close().await;
        release.await.unwrap();
        assert_eq!(pool.status().await.state, PoolState::Closed);
    }
}
