//! SQLite backend for the quality alert engine.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Rules, alerts and quality-zeroing
//! records are stored as JSON documents next to the columns used for
//! filtering and ordering.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
