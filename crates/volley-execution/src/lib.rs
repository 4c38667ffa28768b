//! Run drivers for Volley.
//!
//! - [`batch_runner`]: the offline batch pipeline
//! - [`chat_session`]: the interactive streaming chat loop
//! - [`telemetry`]: log subscriber setup and session spans

pub mod batch_runner;
pub mod chat_session;
pub mod telemetry;

pub use batch_runner::{BatchOptions, BatchProgress, BatchRunner, ProgressCallback, RunReport};
pub use chat_session::{ChatOutcome, ChatSession};
pub use telemetry::LogFormat;
