use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use volley_core::config::{EngineKind, VolleyConfig};
use volley_core::retry::RetryPolicy;
use volley_execution::{BatchOptions, BatchRunner};
use volley_infrastructure::JsonPromptStore;

use super::{EngineArgs, build_engine};

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Prompt file: a JSON array, or JSON Lines when it ends in `.jsonl`.
    /// The built-in sample prompts are used when omitted.
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Where to write the results [default: results.json]
    #[arg(long)]
    pub output_file: Option<PathBuf>,

    /// Prompts per engine call [default: 32]
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Token limit per completion [default: 1024]
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Per-prompt streams in flight with the chat engine [default: 8]
    #[arg(long)]
    pub tensor_parallel_size: Option<usize>,

    /// Batches in flight at once [default: 1]
    #[arg(long)]
    pub concurrent_batches: Option<usize>,

    /// Engine endpoint to drive [default: completions]
    #[arg(long)]
    pub engine: Option<EngineKind>,

    /// Fail on the first engine error instead of retrying
    #[arg(long)]
    pub no_retry: bool,

    #[command(flatten)]
    pub connection: EngineArgs,
}

impl BatchArgs {
    fn apply(&self, config: &mut VolleyConfig) {
        self.connection.apply(config);
        if let Some(output_file) = &self.output_file {
            config.run.output_file = output_file.clone();
        }
        if let Some(batch_size) = self.batch_size {
            config.run.batch_size = batch_size;
        }
        if let Some(max_tokens) = self.max_tokens {
            config.sampling.max_tokens = max_tokens;
        }
        if let Some(parallelism) = self.tensor_parallel_size {
            config.run.tensor_parallel_size = parallelism;
        }
        if let Some(concurrent) = self.concurrent_batches {
            config.run.max_concurrent_batches = concurrent;
        }
        if let Some(engine) = self.engine {
            config.run.engine = engine;
        }
        if self.no_retry {
            config.retry = RetryPolicy::none();
        }
    }
}

pub async fn run(args: BatchArgs, mut config: VolleyConfig) -> Result<()> {
    args.apply(&mut config);
    config.validate().context("Invalid batch configuration")?;

    let store = Arc::new(JsonPromptStore::from_optional_input(
        args.input,
        config.run.output_file.clone(),
    ));
    let engine = build_engine(&config, config.run.engine)?;
    let runner = BatchRunner::new(store, engine, BatchOptions::from_config(&config));

    let report = runner.run().await.context("Batch run failed")?;

    println!(
        "{}",
        format!(
            "Wrote {} results in {} batches to {}",
            report.results.len(),
            report.batch_count,
            config.run.output_file.display()
        )
        .green()
    );
    println!("{}", report.summary.to_string().bright_black());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: BatchArgs,
    }

    #[test]
    fn test_flags_override_config_values() {
        let harness = Harness::parse_from([
            "volley",
            "--batch-size",
            "4",
            "--engine",
            "chat",
            "--model",
            "tiny",
            "--concurrent-batches",
            "3",
        ]);

        let mut config = VolleyConfig::default();
        config.run.tensor_parallel_size = 2;
        harness.args.apply(&mut config);

        assert_eq!(config.run.batch_size, 4);
        assert_eq!(config.run.engine, EngineKind::Chat);
        assert_eq!(config.engine.model, "tiny");
        assert_eq!(config.run.max_concurrent_batches, 3);
        // Unset flags leave file values alone.
        assert_eq!(config.run.tensor_parallel_size, 2);
        assert_eq!(config.sampling.max_tokens, 1024);
    }

    #[test]
    fn test_no_retry_disables_retries() {
        let mut config = VolleyConfig::default();
        Harness::parse_from(["volley"]).args.apply(&mut config);
        assert_eq!(config.retry.max_retries, 2);

        Harness::parse_from(["volley", "--no-retry"])
            .args
            .apply(&mut config);
        assert_eq!(config.retry.max_retries, 0);
    }

    #[test]
    fn test_unknown_engine_is_rejected() {
        assert!(Harness::try_parse_from(["volley", "--engine", "grpc"]).is_err());
    }
}
