//! Configuration model.
//!
//! Every field has a default so a partial (or absent) config file is valid.
//! Loading and environment overrides live in `volley-infrastructure`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{Result, VolleyError};
use crate::prompt::SamplingConfig;
use crate::retry::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080/v1";
pub const DEFAULT_MODEL: &str = "meta-llama/Llama-4-Maverick-17B-128E-Instruct-FP8";
pub const DEFAULT_API_KEY: &str = "EMPTY";

/// Which engine shape a batch run drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EngineKind {
    /// Bulk calls against the completions endpoint.
    #[default]
    Completions,
    /// Per-prompt streams against the chat completions endpoint.
    Chat,
}

/// Connection settings for the OpenAI-compatible engine server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub connect_timeout_secs: u64,
    /// Upper bound for a whole non-streaming request.
    pub request_timeout_secs: u64,
    /// Longest silence tolerated between two streamed fragments.
    pub fragment_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
            model: DEFAULT_MODEL.to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 1_800,
            fragment_timeout_secs: 120,
        }
    }
}

/// Settings for one batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub output_file: PathBuf,
    pub batch_size: usize,
    /// Engine parallelism: per-prompt streams in flight when the batch engine
    /// is the chat adapter.
    pub tensor_parallel_size: usize,
    /// Batches submitted concurrently. Output order is unaffected.
    pub max_concurrent_batches: usize,
    pub engine: EngineKind,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_file: PathBuf::from("results.json"),
            batch_size: 32,
            tensor_parallel_size: 8,
            max_concurrent_batches: 1,
            engine: EngineKind::Completions,
        }
    }
}

/// Root of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolleyConfig {
    pub engine: EngineConfig,
    pub run: RunConfig,
    pub sampling: SamplingConfig,
    pub retry: RetryPolicy,
}

impl VolleyConfig {
    /// Checks the values no run can work with.
    pub fn validate(&self) -> Result<()> {
        if self.run.batch_size == 0 {
            return Err(VolleyError::config("run.batch_size must be at least 1"));
        }
        if self.run.tensor_parallel_size == 0 {
            return Err(VolleyError::config(
                "run.tensor_parallel_size must be at least 1",
            ));
        }
        if self.run.max_concurrent_batches == 0 {
            return Err(VolleyError::config(
                "run.max_concurrent_batches must be at least 1",
            ));
        }
        if self.sampling.max_tokens == 0 {
            return Err(VolleyError::config("sampling.max_tokens must be at least 1"));
        }
        if self.engine.base_url.trim().is_empty() {
            return Err(VolleyError::config("engine.base_url must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: VolleyConfig = toml::from_str(
            r#"
            [run]
            batch_size = 4
            engine = "chat"

            [sampling]
            max_tokens = 256
            "#,
        )
        .unwrap();

        assert_eq!(config.run.batch_size, 4);
        assert_eq!(config.run.engine, EngineKind::Chat);
        assert_eq!(config.run.output_file, PathBuf::from("results.json"));
        assert_eq!(config.sampling.max_tokens, 256);
        assert_eq!(config.sampling.top_p, 0.95);
        assert_eq!(config.engine.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.retry, RetryPolicy::default());
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let mut config = VolleyConfig::default();
        config.run.batch_size = 0;
        assert!(matches!(config.validate(), Err(VolleyError::Config(_))));
    }

    #[test]
    fn test_engine_kind_parses_lowercase() {
        assert_eq!(EngineKind::from_str("chat").unwrap(), EngineKind::Chat);
        assert_eq!(EngineKind::Completions.to_string(), "completions");
        assert!(EngineKind::from_str("grpc").is_err());
    }
}
