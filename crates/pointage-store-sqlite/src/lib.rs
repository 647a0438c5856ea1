//! SQLite backend for the Pointage agent directory and punch ledger.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every closure handed to that thread
//! runs to completion before the next one starts, and the punch uniqueness
//! rule is additionally carried by a `UNIQUE` constraint in the schema.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
