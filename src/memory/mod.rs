//! Memory store: the domain layer over the pooled SQLite database.
//!
//! Provides insert, lookup by ID, and ranked full-text search of memories.

mod crud;
mod search;

// pub(crate): public items are re-exported from the crate root
pub(crate) mod store;

pub use store::MemoryStore;
