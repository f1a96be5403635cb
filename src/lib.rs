//! memoria - A memory store behind a managed SQLite connection pool.
//!
//! The crate has two layers. `ConnectionPool` owns a bounded set of
//! connections and moves through `Uninitialized -> Ready -> Closed`
//! (and back to `Ready` on a fresh `initialize`). `MemoryStore` borrows one
//! connection per call to insert, look up, and full-text search memories.
//! All database work is async; statements run on the blocking thread pool
//! under a statement timeout.
//!
//! # Example
//!
//! ```no_run
//! use memoria::{Config, ConnectionPool, MemoryStore};
//!
//! # async fn demo() -> Result<(), memoria::Error> {
//! let config = Config::load()?;
//! let pool = ConnectionPool::new();
//! pool.initialize(config.pool_config()?).await?;
//!
//! let store = MemoryStore::new(pool.clone());
//! store.ensure_schema().await?;
//!
//! let id = store.add("buy milk").await?;
//! for hit in store.search("milk", 5).await? {
//!     println!("{:.3}: {}", hit.score, hit.text);
//! }
//! assert!(store.get_by_id(id).await?.is_some());
//!
//! pool.close().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod logging;
pub mod memory;
pub mod memory_types;
pub mod pool;
pub mod server;
mod sqlite;

// Re-export public API
pub use config::Config;
pub use errors::{Error, Operation};
pub use memory::MemoryStore;
pub use memory::store::{
    limit_from_i64, parse_id, DEFAULT_TOP_K, MAX_INPUT_LENGTH, MAX_SEARCH_LIMIT,
};
pub use memory_types::{DatabaseHealth, HealthReport, MemoryRecord, MemorySearchResult};
pub use pool::{
    ConnectionPool, ConnectionTarget, PoolConfig, PoolOptions, PoolState, PoolStatus,
    PooledConnection,
};
