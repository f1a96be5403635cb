//! Checked-out connections and the slot bookkeeping behind them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::PoolOptions;
use crate::errors::{Error, Operation};

/// Open one connection with the pragmas every pooled connection shares.
pub(crate) fn open_connection(filename: &str, busy_timeout: Duration) -> rusqlite::Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(filename, flags)?;
    conn.busy_timeout(busy_timeout)?;
    // In-memory URIs answer "memory" here; only file databases switch to WAL.
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
    Ok(conn)
}

/// State shared by a ready pool and every connection checked out of it.
///
/// A connection is either idle or held together with one semaphore permit,
/// so at most `max_size` connections are ever open at once.
pub(crate) struct Slots {
    pub(crate) filename: String,
    pub(crate) target: String,
    pub(crate) options: PoolOptions,
    idle: Mutex<Vec<Connection>>,
    permits: Arc<Semaphore>,
    open: AtomicUsize,
}

impl Slots {
    pub(crate) fn new(
        filename: String,
        target: String,
        options: PoolOptions,
        warm: Vec<Connection>,
    ) -> Self {
        let open = AtomicUsize::new(warm.len());
        Self {
            permits: Arc::new(Semaphore::new(options.max_size)),
            filename,
            target,
            options,
            idle: Mutex::new(warm),
            open,
        }
    }

    fn idle(&self) -> MutexGuard<'_, Vec<Connection>> {
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn open_count(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub(crate) fn idle_count(&self) -> usize {
        self.idle().len()
    }

    /// Wait for a free slot, then hand out an idle connection or open a new one.
    pub(crate) async fn checkout(self: &Arc<Self>) -> Result<PooledConnection, Error> {
        let waited = self.options.acquire_timeout;
        let permit = match tokio::time::timeout(waited, self.permits.clone().acquire_owned()).await
        {
            Ok(Ok(permit)) => permit,
            // The semaphore is only closed by `ConnectionPool::close`.
            Ok(Err(_)) => return Err(Error::NotInitialized),
            Err(_) => {
                tracing::warn!(
                    database = %self.target,
                    max_size = self.options.max_size,
                    ?waited,
                    "connection pool exhausted"
                );
                return Err(Error::PoolExhausted { waited });
            }
        };

        let reused = self.idle().pop();
        let conn = match reused {
            Some(conn) => conn,
            None => self.open_lazily().await?,
        };

        Ok(PooledConnection {
            conn: Some(conn),
            slots: Arc::clone(self),
            _permit: permit,
        })
    }

    async fn open_lazily(&self) -> Result<Connection, Error> {
        let filename = self.filename.clone();
        let busy = self.options.statement_timeout;
        let conn = tokio::task::spawn_blocking(move || open_connection(&filename, busy))
            .await
            .map_err(|e| Error::TaskFailed(e.to_string()))?
            .map_err(|source| Error::ConnectionFailed {
                target: self.target.clone(),
                source,
            })?;
        let open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(database = %self.target, open, "opened pooled connection");
        Ok(conn)
    }

    fn give_back(&self, conn: Connection) {
        if self.permits.is_closed() {
            self.open.fetch_sub(1, Ordering::SeqCst);
            if let Err((_, e)) = conn.close() {
                tracing::warn!(error = %e, "failed to close returned connection");
            }
            return;
        }
        self.idle().push(conn);
    }

    /// Wait up to `grace` for every checked-out connection to come back.
    ///
    /// Returns false when the grace period elapsed first.
    pub(crate) async fn drain(&self, grace: Duration) -> bool {
        let all = self.options.max_size as u32;
        let drained = matches!(
            tokio::time::timeout(grace, self.permits.acquire_many(all)).await,
            Ok(Ok(_))
        );
        // Stragglers see a closed semaphore and close their own connection.
        self.permits.close();
        drained
    }

    pub(crate) fn take_idle(&self) -> Vec<Connection> {
        let conns = std::mem::take(&mut *self.idle());
        self.open.fetch_sub(conns.len(), Ordering::SeqCst);
        conns
    }
}

/// A connection on loan from the pool.
///
/// The lease is opaque outside this crate: holding one only occupies a pool
/// slot. Statements go through the memory store.
///
/// Dropping it returns the connection on every exit path, including errors
/// and panics inside the statement closure.
///
/// ```compile_fail
/// # async fn lease(pool: memoria::ConnectionPool) {
/// let lease = pool.acquire().await.unwrap();
/// lease.execute("DELETE FROM memories", []).unwrap();
/// # }
/// ```
pub struct PooledConnection {
    conn: Option<Connection>,
    slots: Arc<Slots>,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    fn connection(&self) -> &Connection {
        self.conn
            .as_ref()
            .expect("connection is only taken in drop")
    }

    /// Run one unit of work on the blocking pool, bounded by the statement timeout.
    ///
    /// On timeout the running statement is interrupted. The lease travels back
    /// out of the blocking task, so the connection is never back in the pool
    /// while the interrupt can still reach it.
    ///
    /// # Errors
    ///
    /// `Error::Statement` tagged with `operation` when the closure fails,
    /// `Error::Timeout` when the statement timeout elapses first.
    pub(crate) async fn run<T, F>(self, operation: Operation, f: F) -> Result<T, Error>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let after = self.slots.options.statement_timeout;
        let interrupt = self.connection().get_interrupt_handle();
        let mut task = tokio::task::spawn_blocking(move || {
            let result = f(self.connection());
            (result, self)
        });

        match tokio::time::timeout(after, &mut task).await {
            Ok(Ok((result, lease))) => {
                drop(lease);
                result.map_err(|source| {
                    tracing::warn!(%operation, error = %source, "statement failed");
                    Error::statement(operation, source)
                })
            }
            Ok(Err(join)) => Err(Error::TaskFailed(join.to_string())),
            Err(_) => {
                // A finished task still holds the lease in its output, so this
                // cannot hit a statement run by the connection's next holder.
                interrupt.interrupt();
                drop(task);
                tracing::warn!(%operation, ?after, "statement timed out, interrupted");
                Err(Error::Timeout { operation, after })
            }
        }
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.slots.give_back(conn);
        }
    }
}
