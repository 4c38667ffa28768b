use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use volley_core::config::{EngineKind, VolleyConfig};
use volley_core::engine::EngineAdapter;
use volley_infrastructure::ConfigStorage;
use volley_interaction::{ChatStreamEngine, CompletionsEngine};

pub mod batch;
pub mod chat;

/// Engine connection flags shared by every subcommand.
#[derive(Args, Debug, Default)]
pub struct EngineArgs {
    /// Engine base URL [default: http://127.0.0.1:8080/v1]
    #[arg(long)]
    pub base_url: Option<String>,

    /// Model name served by the engine
    #[arg(long)]
    pub model: Option<String>,
}

impl EngineArgs {
    pub fn apply(&self, config: &mut VolleyConfig) {
        if let Some(base_url) = &self.base_url {
            config.engine.base_url = base_url.clone();
        }
        if let Some(model) = &self.model {
            config.engine.model = model.clone();
        }
    }
}

/// Reads the config file and environment overrides. Flags are applied later.
pub fn load_config(path: Option<PathBuf>) -> Result<VolleyConfig> {
    let storage = match path {
        Some(path) => ConfigStorage::new(path),
        None => ConfigStorage::at_default_location()?,
    };
    storage
        .load_with_env()
        .with_context(|| format!("Failed to load config from {}", storage.path().display()))
}

pub fn build_engine(config: &VolleyConfig, kind: EngineKind) -> Result<EngineAdapter> {
    let adapter = match kind {
        EngineKind::Completions => {
            EngineAdapter::bulk(Arc::new(CompletionsEngine::new(&config.engine)?))
        }
        EngineKind::Chat => EngineAdapter::streaming(
            Arc::new(ChatStreamEngine::new(&config.engine)?),
            config.run.tensor_parallel_size,
        ),
    };
    Ok(adapter)
}
