//! Engine adapters for OpenAI-compatible inference servers (vLLM and friends).
//!
//! - [`CompletionsEngine`]: bulk generation, one request per batch
//! - [`ChatStreamEngine`]: streamed chat replies with optional image input

pub mod chat_stream_engine;
pub mod completions_engine;
mod http;
pub mod sse;

pub use chat_stream_engine::{ChatStreamEngine, read_image};
pub use completions_engine::CompletionsEngine;
