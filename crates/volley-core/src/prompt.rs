//! Prompt and result records for batch runs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, VolleyError};

/// A single prompt loaded from the input collection.
///
/// `id` is the 0-based position in the source collection and never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptRecord {
    /// Position in the source collection.
    pub id: usize,
    /// The prompt text sent to the engine.
    pub text: String,
    /// The untouched input element, carried through to the result.
    pub original_data: Value,
}

impl PromptRecord {
    /// Builds a record from one input element.
    ///
    /// Accepts either a bare string or an object with a string `prompt` or
    /// `text` field. The whole element is kept as `original_data`.
    pub fn from_value(id: usize, value: Value) -> Result<Self> {
        let text = match &value {
            Value::String(text) => text.clone(),
            Value::Object(map) => map
                .get("prompt")
                .or_else(|| map.get("text"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    VolleyError::invalid_input(format!(
                        "record {id} has no string `prompt` or `text` field"
                    ))
                })?,
            other => {
                return Err(VolleyError::invalid_input(format!(
                    "record {id} must be a string or an object, got {}",
                    json_type_name(other)
                )));
            }
        };

        Ok(Self {
            id,
            text,
            original_data: value,
        })
    }

    /// Assigns position-based ids to an ordered list of input elements.
    pub fn from_values(values: Vec<Value>) -> Result<Vec<Self>> {
        values
            .into_iter()
            .enumerate()
            .map(|(id, value)| Self::from_value(id, value))
            .collect()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// One generation produced by the engine for one prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedText {
    /// The prompt as the engine saw it.
    pub prompt: String,
    /// The generated continuation.
    pub text: String,
}

impl GeneratedText {
    pub fn new(prompt: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            text: text.into(),
        }
    }
}

/// A persisted result, correlated to its [`PromptRecord`] by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: usize,
    pub prompt: String,
    pub generated_text: String,
    pub original_data: Value,
}

/// Sampling parameters passed through to the engine unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            top_p: 0.95,
            max_tokens: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_values_assigns_positional_ids() {
        let records = PromptRecord::from_values(vec![
            json!("first"),
            json!({"prompt": "second", "topic": "energy"}),
            json!({"text": "third"}),
        ])
        .unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(
            records.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(records[1].text, "second");
        assert_eq!(records[1].original_data["topic"], "energy");
        assert_eq!(records[2].text, "third");
    }

    #[test]
    fn test_from_value_rejects_records_without_text() {
        let err = PromptRecord::from_value(4, json!({"question": "?"})).unwrap_err();
        assert!(err.is_invalid_input());
        assert!(err.to_string().contains("record 4"));

        let err = PromptRecord::from_value(0, json!(42)).unwrap_err();
        assert!(err.to_string().contains("a number"));
    }

    #[test]
    fn test_result_record_serializes_expected_keys() {
        let record = ResultRecord {
            id: 7,
            prompt: "p".into(),
            generated_text: "g".into(),
            original_data: json!("p"),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({"id": 7, "prompt": "p", "generated_text": "g", "original_data": "p"})
        );
    }

    #[test]
    fn test_sampling_config_defaults_fill_missing_fields() {
        let config: SamplingConfig = serde_json::from_value(json!({"max_tokens": 64})).unwrap();
        assert_eq!(config.max_tokens, 64);
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.top_p, 0.95);
    }
}
