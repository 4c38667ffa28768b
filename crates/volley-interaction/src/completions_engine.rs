//! CompletionsEngine - bulk generation over the completions endpoint.
//!
//! One HTTP request carries every prompt of a batch; the server returns one
//! choice per prompt tagged with its position.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use volley_core::config::EngineConfig;
use volley_core::engine::BulkEngine;
use volley_core::error::{Result, VolleyError};
use volley_core::prompt::{GeneratedText, SamplingConfig};

use crate::http;

/// Bulk engine backed by an OpenAI-compatible `/completions` endpoint.
#[derive(Clone)]
pub struct CompletionsEngine {
    client: Client,
    url: String,
    api_key: String,
    model: String,
}

impl CompletionsEngine {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            client: http::buffered_client(config)?,
            url: http::endpoint(&config.base_url, "completions"),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    async fn send_request(&self, body: &CompletionRequest<'_>) -> Result<CompletionResponse> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|err| http::map_transport_error("completions request failed", err))?;

        let response = http::check_status(response).await?;

        let body = response
            .bytes()
            .await
            .map_err(|err| http::map_body_error("completions response interrupted", err))?;

        serde_json::from_slice(&body).map_err(|err| {
            VolleyError::engine(format!("Failed to parse completions response: {err}"))
        })
    }
}

#[async_trait]
impl BulkEngine for CompletionsEngine {
    async fn generate(
        &self,
        prompts: &[String],
        config: &SamplingConfig,
    ) -> Result<Vec<GeneratedText>> {
        let request = CompletionRequest {
            model: &self.model,
            prompt: prompts,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
            n: 1,
            stream: false,
        };

        tracing::debug!(prompts = prompts.len(), url = %self.url, "sending completions batch");
        let response = self.send_request(&request).await?;
        let texts = order_choices(response.choices, prompts.len())?;

        Ok(prompts
            .iter()
            .zip(texts)
            .map(|(prompt, text)| GeneratedText::new(prompt.clone(), text))
            .collect())
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a [String],
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    n: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    index: usize,
    #[serde(default)]
    text: String,
}

/// Places each choice at its `index`, requiring exactly one per prompt.
fn order_choices(choices: Vec<CompletionChoice>, expected: usize) -> Result<Vec<String>> {
    if choices.len() != expected {
        return Err(VolleyError::ShapeMismatch {
            expected,
            actual: choices.len(),
        });
    }

    let mut slots: Vec<Option<String>> = vec![None; expected];
    for choice in choices {
        if let Some(slot) = slots.get_mut(choice.index) {
            slot.get_or_insert(choice.text);
        }
    }

    // A duplicate or out-of-range index leaves some position unanswered.
    let filled = slots.iter().filter(|slot| slot.is_some()).count();
    if filled != expected {
        return Err(VolleyError::ShapeMismatch {
            expected,
            actual: filled,
        });
    }
    Ok(slots.into_iter().flatten().collect())
}
