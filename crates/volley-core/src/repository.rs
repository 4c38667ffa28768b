//! Storage abstraction for batch input and output.

use async_trait::async_trait;

use crate::error::Result;
use crate::prompt::{PromptRecord, ResultRecord};

/// Loads the prompt collection and persists the results of a run.
///
/// Implementations own the durable collections for the duration of a run.
#[async_trait]
pub trait PromptStore: Send + Sync {
    /// Loads prompts in source order with position-based ids.
    async fn load_prompts(&self) -> Result<Vec<PromptRecord>>;

    /// Replaces the stored results with `results`, in the given order.
    async fn save_results(&self, results: &[ResultRecord]) -> Result<()>;
}
