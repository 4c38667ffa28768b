//! Batch pipeline: load, plan, generate, combine, persist.

use std::sync::Arc;

use futures::{StreamExt, stream};
use tracing::Instrument;
use volley_core::aggregate;
use volley_core::batch::{self, Batch};
use volley_core::config::VolleyConfig;
use volley_core::engine::EngineAdapter;
use volley_core::error::Result;
use volley_core::metrics::{MetricsRecorder, RunSummary};
use volley_core::prompt::{ResultRecord, SamplingConfig};
use volley_core::repository::PromptStore;
use volley_core::retry::RetryPolicy;

use crate::telemetry;

/// Tunables of a batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub batch_size: usize,
    /// Batches in flight at once. Results keep planned order regardless.
    pub max_concurrent_batches: usize,
    pub sampling: Arc<SamplingConfig>,
    pub retry: RetryPolicy,
}

impl BatchOptions {
    pub fn from_config(config: &VolleyConfig) -> Self {
        Self {
            batch_size: config.run.batch_size,
            max_concurrent_batches: config.run.max_concurrent_batches,
            sampling: Arc::new(config.sampling),
            retry: config.retry,
        }
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::from_config(&VolleyConfig::default())
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Persisted results, in input order.
    pub results: Vec<ResultRecord>,
    pub batch_count: usize,
    pub summary: RunSummary,
}

/// Position of a run after a batch has been collected in planned order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// Batches collected so far, including this one.
    pub completed: usize,
    pub total: usize,
    /// Prompts answered so far.
    pub prompts_done: usize,
}

/// Called once per collected batch, in planned order.
pub type ProgressCallback = Arc<dyn Fn(BatchProgress) + Send + Sync>;

/// Drives one prompt collection through an engine and into the store.
pub struct BatchRunner {
    store: Arc<dyn PromptStore>,
    engine: EngineAdapter,
    options: BatchOptions,
    progress_callback: Option<ProgressCallback>,
}

impl BatchRunner {
    pub fn new(store: Arc<dyn PromptStore>, engine: EngineAdapter, options: BatchOptions) -> Self {
        Self {
            store,
            engine,
            options,
            progress_callback: None,
        }
    }

    /// Reports each collected batch to `callback` as well as to the log.
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Runs the whole pipeline.
    ///
    /// Any failure aborts the run before anything is written, so the output
    /// location either holds the full result set or is left untouched.
    pub async fn run(&self) -> Result<RunReport> {
        self.run_inner()
            .instrument(telemetry::session_span("batch"))
            .await
    }

    async fn run_inner(&self) -> Result<RunReport> {
        let records = self.store.load_prompts().await?;
        let batches = batch::plan(records, self.options.batch_size)?;
        let batch_count = batches.len();
        let concurrency = self.options.max_concurrent_batches.max(1);

        tracing::info!(
            batches = batch_count,
            batch_size = self.options.batch_size,
            concurrency,
            engine = self.engine.kind(),
            "starting batch run"
        );

        let mut recorder = MetricsRecorder::new();
        recorder.start();
        let mut ordered = stream::iter(batches)
            .map(|batch| self.process_batch(batch))
            .buffered(concurrency);
        let mut results: Vec<ResultRecord> = Vec::new();
        let mut completed = 0;
        while let Some(batch_results) = ordered.next().await {
            results.extend(batch_results?);
            completed += 1;
            self.report_progress(BatchProgress {
                completed,
                total: batch_count,
                prompts_done: results.len(),
            });
        }
        recorder.finish();

        let summary = recorder.summary(results.len());

        self.store.save_results(&results).await?;
        tracing::info!(%summary, "batch run finished");

        Ok(RunReport {
            results,
            batch_count,
            summary,
        })
    }

    async fn process_batch(&self, batch: Batch) -> Result<Vec<ResultRecord>> {
        let label = format!("batch {}", batch.index());
        let sampling = self.options.sampling.as_ref();

        let outputs = self
            .options
            .retry
            .run(&label, || self.engine.generate_batch(&batch, sampling))
            .await?;
        let results = aggregate::combine(&batch, outputs)?;

        tracing::debug!(batch = batch.index(), size = batch.len(), "batch complete");
        Ok(results)
    }

    fn report_progress(&self, progress: BatchProgress) {
        tracing::info!(
            completed = progress.completed,
            total = progress.total,
            prompts = progress.prompts_done,
            "batch {}/{} done",
            progress.completed,
            progress.total
        );
        if let Some(callback) = &self.progress_callback {
            callback(progress);
        }
    }
}
