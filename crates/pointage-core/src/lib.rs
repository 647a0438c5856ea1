//! Core types and trait definitions for the Pointage time clock.
//!
//! This crate is deliberately free of HTTP and database dependencies. Storage
//! backends implement [`store::AgentDirectory`] and [`store::PunchLedger`];
//! the [`workflow`] module drives a punch attempt against any pair of them.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod agent;
pub mod code;
pub mod context;
pub mod error;
pub mod punch;
pub mod store;
pub mod token;
pub mod workflow;

pub use error::{Error, Result};
