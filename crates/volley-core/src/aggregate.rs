//! Reassembly of engine output into attributed results.

use crate::batch::Batch;
use crate::error::{Result, VolleyError};
use crate::prompt::{GeneratedText, ResultRecord};

/// Zips a batch with its engine outputs by position.
///
/// The engine knows nothing about record ids, so correlation is purely
/// positional. A length mismatch is a broken engine contract and is never
/// truncated or padded.
pub fn combine(batch: &Batch, outputs: Vec<GeneratedText>) -> Result<Vec<ResultRecord>> {
    if outputs.len() != batch.len() {
        return Err(VolleyError::ShapeMismatch {
            expected: batch.len(),
            actual: outputs.len(),
        });
    }

    Ok(batch
        .records()
        .iter()
        .zip(outputs)
        .map(|(record, output)| ResultRecord {
            id: record.id,
            prompt: output.prompt,
            generated_text: output.text,
            original_data: record.original_data.clone(),
        })
        .collect())
}

/// Receives the growing response while it streams.
pub trait ResponseObserver {
    /// Called after every fragment with the full text accumulated so far.
    fn on_update(&mut self, accumulated: &str);
}

impl<F> ResponseObserver for F
where
    F: FnMut(&str),
{
    fn on_update(&mut self, accumulated: &str) {
        self(accumulated)
    }
}

/// Observer that ignores every update.
pub struct NoopObserver;

impl ResponseObserver for NoopObserver {
    fn on_update(&mut self, _accumulated: &str) {}
}

/// Accumulates streamed fragments in arrival order.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    buffer: String,
    fragments: usize,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a fragment and republishes the accumulated text.
    pub fn push(&mut self, fragment: &str, observer: &mut dyn ResponseObserver) {
        self.buffer.push_str(fragment);
        self.fragments += 1;
        observer.on_update(&self.buffer);
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// Number of fragments received so far.
    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    /// Text of a completed response.
    pub fn finish(self) -> String {
        self.buffer
    }

    /// Text recorded for a response that failed part-way.
    ///
    /// Keeps whatever was gathered and notes the failure underneath; when
    /// nothing arrived the error message stands alone.
    pub fn finish_with_error(self, error: &VolleyError) -> String {
        if self.buffer.trim().is_empty() {
            format!("Error: {error}")
        } else {
            format!("{}\n\n[Error: {error}]", self.buffer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::PromptRecord;
    use serde_json::json;

    fn batch_of(ids: &[usize]) -> Batch {
        Batch::new(
            0,
            ids.iter()
                .map(|&id| PromptRecord {
                    id,
                    text: format!("prompt {id}"),
                    original_data: json!({"prompt": format!("prompt {id}"), "row": id}),
                })
                .collect(),
        )
    }

    fn outputs(batch: &Batch) -> Vec<GeneratedText> {
        batch
            .records()
            .iter()
            .map(|r| GeneratedText::new(r.text.clone(), format!("answer to {}", r.text)))
            .collect()
    }

    #[test]
    fn test_combine_preserves_ids_and_order() {
        let batch = batch_of(&[4, 5, 6]);
        let results = combine(&batch, outputs(&batch)).unwrap();

        assert_eq!(results.len(), 3);
        for (record, result) in batch.records().iter().zip(&results) {
            assert_eq!(result.id, record.id);
            assert_eq!(result.prompt, record.text);
            assert_eq!(result.generated_text, format!("answer to {}", record.text));
            assert_eq!(result.original_data, record.original_data);
        }
    }

    #[test]
    fn test_combine_rejects_short_output() {
        let batch = batch_of(&[0, 1, 2]);
        let mut short = outputs(&batch);
        short.pop();

        let err = combine(&batch, short).unwrap_err();
        assert!(matches!(
            err,
            VolleyError::ShapeMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_combine_rejects_long_output() {
        let batch = batch_of(&[0]);
        let mut long = outputs(&batch);
        long.push(GeneratedText::new("extra", "extra"));

        assert!(combine(&batch, long).unwrap_err().is_shape_mismatch());
    }

    #[test]
    fn test_accumulator_concatenates_in_arrival_order() {
        let fragments = ["Hel", "lo", ", ", "wor", "ld", "", "!"];
        let mut seen = Vec::new();
        let mut observer = |text: &str| seen.push(text.to_string());

        let mut acc = StreamAccumulator::new();
        for fragment in fragments {
            acc.push(fragment, &mut observer);
        }

        assert_eq!(acc.fragment_count(), fragments.len());
        assert_eq!(acc.text(), fragments.concat());
        assert_eq!(acc.finish(), "Hello, world!");
        assert_eq!(seen.first().map(String::as_str), Some("Hel"));
        assert_eq!(seen.last().map(String::as_str), Some("Hello, world!"));
    }

    #[test]
    fn test_finish_with_error_keeps_partial_text() {
        let err = VolleyError::partial_stream("connection reset");

        let mut acc = StreamAccumulator::new();
        acc.push("partial", &mut NoopObserver);
        let text = acc.finish_with_error(&err);
        assert!(text.starts_with("partial"));
        assert!(text.contains("connection reset"));

        let empty = StreamAccumulator::new();
        assert_eq!(
            empty.finish_with_error(&err),
            "Error: Stream interrupted: connection reset"
        );
    }
}
