//! Core types and orchestration logic for Volley.
//!
//! Nothing in this crate talks to the network or the filesystem; engines and
//! stores are reached through the traits in [`engine`] and [`repository`].

pub mod aggregate;
pub mod batch;
pub mod config;
pub mod conversation;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod prompt;
pub mod repository;
pub mod retry;

// Re-export common error type
pub use error::{Result, VolleyError};
