//! File-backed [`PromptStore`] using JSON for results and JSON/JSONL for input.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use volley_core::error::{Result, VolleyError};
use volley_core::prompt::{PromptRecord, ResultRecord};
use volley_core::repository::PromptStore;

use crate::sample_prompts::SAMPLE_PROMPTS;
use crate::storage::AtomicJsonFile;

/// Where the prompts of a run come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptSource {
    /// A JSON array, or JSON Lines when the extension is `.jsonl`.
    File(PathBuf),
    /// The built-in sample prompt set.
    Samples,
}

/// Prompt store reading from a [`PromptSource`] and writing a JSON array.
///
/// Input formats:
/// ```text
/// ["prompt one", {"prompt": "prompt two", "meta": 1}, {"text": "prompt three"}]
/// ```
/// or one such element per line in a `.jsonl` file.
pub struct JsonPromptStore {
    source: PromptSource,
    output_path: PathBuf,
}

impl JsonPromptStore {
    pub fn new(source: PromptSource, output_path: impl Into<PathBuf>) -> Self {
        Self {
            source,
            output_path: output_path.into(),
        }
    }

    /// Reads from `input` when given, from the sample set otherwise.
    pub fn from_optional_input(input: Option<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        let source = input.map(PromptSource::File).unwrap_or(PromptSource::Samples);
        Self::new(source, output_path)
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    async fn read_values(path: &Path) -> Result<Vec<Value>> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            VolleyError::invalid_input(format!(
                "cannot read prompt file {}: {e}",
                path.display()
            ))
        })?;

        if is_jsonl(path) {
            parse_jsonl(&content, path)
        } else {
            parse_json_array(&content, path)
        }
    }
}

#[async_trait]
impl PromptStore for JsonPromptStore {
    async fn load_prompts(&self) -> Result<Vec<PromptRecord>> {
        let values = match &self.source {
            PromptSource::File(path) => Self::read_values(path).await?,
            PromptSource::Samples => SAMPLE_PROMPTS
                .iter()
                .map(|p| Value::String(p.to_string()))
                .collect(),
        };

        let records = PromptRecord::from_values(values)?;
        tracing::info!(count = records.len(), source = ?self.source, "loaded prompts");
        Ok(records)
    }

    async fn save_results(&self, results: &[ResultRecord]) -> Result<()> {
        let output = AtomicJsonFile::new(self.output_path.clone());
        let results_len = results.len();
        let results = results.to_vec();

        tokio::task::spawn_blocking(move || output.save(&results))
            .await
            .map_err(|e| VolleyError::io(format!("result writer task failed: {e}")))??;

        tracing::info!(path = %self.output_path.display(), count = results_len, "saved results");
        Ok(())
    }
}

fn is_jsonl(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"))
}

fn parse_json_array(content: &str, path: &Path) -> Result<Vec<Value>> {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Array(values)) => Ok(values),
        Ok(_) => Err(VolleyError::invalid_input(format!(
            "prompt file {} must contain a JSON array",
            path.display()
        ))),
        Err(e) => Err(VolleyError::invalid_input(format!(
            "prompt file {} is not valid JSON: {e}",
            path.display()
        ))),
    }
}

fn parse_jsonl(content: &str, path: &Path) -> Result<Vec<Value>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            serde_json::from_str(line).map_err(|e| {
                VolleyError::invalid_input(format!(
                    "{}:{}: invalid JSON: {e}",
                    path.display(),
                    number + 1
                ))
            })
        })
        .collect()
}
