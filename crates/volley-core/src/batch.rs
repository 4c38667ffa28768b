//! Partitioning of a prompt collection into bounded, ordered batches.

use crate::error::{Result, VolleyError};
use crate::prompt::PromptRecord;

/// An ordered slice of the prompt collection submitted to the engine together.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    index: usize,
    records: Vec<PromptRecord>,
}

impl Batch {
    /// Creates a batch with the given emission index.
    pub fn new(index: usize, records: Vec<PromptRecord>) -> Self {
        Self { index, records }
    }

    /// 0-based position of this batch in the plan.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn records(&self) -> &[PromptRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Prompt texts in batch order.
    pub fn prompts(&self) -> Vec<String> {
        self.records.iter().map(|r| r.text.clone()).collect()
    }

    pub fn into_records(self) -> Vec<PromptRecord> {
        self.records
    }
}

/// Splits `records` into consecutive batches of at most `batch_size`.
///
/// Element `k` of batch `i` is input element `i * batch_size + k`. An empty
/// input yields no batches at all.
pub fn plan(records: Vec<PromptRecord>, batch_size: usize) -> Result<Vec<Batch>> {
    if batch_size == 0 {
        return Err(VolleyError::invalid_input("batch size must be at least 1"));
    }

    let mut batches = Vec::with_capacity(records.len().div_ceil(batch_size));
    let mut remaining = records.into_iter().peekable();

    while remaining.peek().is_some() {
        let chunk: Vec<PromptRecord> = remaining.by_ref().take(batch_size).collect();
        batches.push(Batch::new(batches.len(), chunk));
    }

    Ok(batches)
}
