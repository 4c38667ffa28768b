//! ChatStreamEngine - streamed replies over the chat completions endpoint.

use std::collections::VecDeque;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, prelude::BASE64_STANDARD};
use futures::{Stream, StreamExt, stream};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use volley_core::config::EngineConfig;
use volley_core::conversation::{ConversationTurn, ImageRef, Message};
use volley_core::engine::{FragmentStream, StreamingEngine};
use volley_core::error::{Result, VolleyError};
use volley_core::prompt::SamplingConfig;

use crate::http;
use crate::sse::{SseDecoder, SseEvent};

const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Streaming engine backed by an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct ChatStreamEngine {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    fragment_timeout: Duration,
}

impl ChatStreamEngine {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            client: http::streaming_client(config)?,
            url: http::endpoint(&config.base_url, "chat/completions"),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            fragment_timeout: Duration::from_secs(config.fragment_timeout_secs),
        })
    }

    async fn build_messages(
        history: &[ConversationTurn],
        message: &Message,
    ) -> Result<Vec<ChatMessage>> {
        let mut messages: Vec<ChatMessage> = history
            .iter()
            .map(|turn| ChatMessage {
                role: turn.role.to_string(),
                content: ChatContent::Text(turn.text.clone()),
            })
            .collect();

        let content = match &message.attachment {
            None => ChatContent::Text(message.text.clone()),
            Some(image) => ChatContent::Parts(vec![
                MessageContent::Text {
                    text: message.text.clone(),
                },
                attachment_to_content(image).await?,
            ]),
        };
        messages.push(ChatMessage {
            role: "user".to_string(),
            content,
        });

        Ok(messages)
    }
}

#[async_trait]
impl StreamingEngine for ChatStreamEngine {
    async fn generate_stream(
        &self,
        history: &[ConversationTurn],
        message: &Message,
        config: &SamplingConfig,
    ) -> Result<FragmentStream> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: Self::build_messages(history, message).await?,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
            stream: true,
        };

        tracing::debug!(
            turns = history.len(),
            has_image = message.attachment.is_some(),
            url = %self.url,
            "opening chat stream"
        );

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| http::map_transport_error("chat request failed", err))?;
        let response = http::check_status(response).await?;

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()));
        Ok(fragment_stream(Box::pin(body), self.fragment_timeout))
    }
}

/// Reads an image file into an in-memory reference, typed by its extension.
///
/// Unknown extensions are sent as JPEG.
pub async fn read_image(path: &Path) -> Result<ImageRef> {
    let (data, mime_type) = read_image_file(path).await?;
    Ok(ImageRef::in_memory(data, mime_type))
}

async fn read_image_file(path: &Path) -> Result<(Vec<u8>, String)> {
    let bytes = tokio::fs::read(path).await.map_err(|err| {
        VolleyError::invalid_input(format!("cannot read image {}: {err}", path.display()))
    })?;
    let mime_type = mime_guess::from_path(path)
        .first()
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string());
    Ok((bytes, mime_type))
}

/// Resolves an image reference into an `image_url` content part.
async fn attachment_to_content(image: &ImageRef) -> Result<MessageContent> {
    let url = match image {
        ImageRef::Remote { url } => url.clone(),
        ImageRef::Local { path } => {
            let (bytes, mime_type) = read_image_file(path).await?;
            data_url(&mime_type, &bytes)
        }
        ImageRef::InMemory { data, mime_type } => data_url(mime_type, data),
    };

    Ok(MessageContent::ImageUrl {
        image_url: ImageUrl { url },
    })
}

fn data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", BASE64_STANDARD.encode(bytes))
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Vec<u8>>> + Send>>;

struct StreamState {
    body: ByteStream,
    decoder: SseDecoder,
    pending: VecDeque<Result<String>>,
    fragment_timeout: Duration,
    finished: bool,
}

impl StreamState {
    fn absorb(&mut self, events: Vec<SseEvent>) {
        for event in events {
            if self.finished {
                return;
            }
            match event {
                SseEvent::Done => self.finished = true,
                SseEvent::Data(payload) => match parse_chunk(&payload) {
                    Ok(Some(fragment)) => self.pending.push_back(Ok(fragment)),
                    Ok(None) => {}
                    Err(err) => {
                        self.pending.push_back(Err(err));
                        self.finished = true;
                    }
                },
            }
        }
    }
}

/// Turns a raw SSE body into content fragments.
///
/// Ends after `[DONE]` or the end of the body. Yields at most one error, after
/// which the stream is exhausted.
fn fragment_stream(body: ByteStream, fragment_timeout: Duration) -> FragmentStream {
    let state = StreamState {
        body,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        fragment_timeout,
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match tokio::time::timeout(state.fragment_timeout, state.body.next()).await {
                Ok(Some(Ok(bytes))) => {
                    let events = state.decoder.push(&bytes);
                    state.absorb(events);
                }
                Ok(Some(Err(err))) => {
                    state.finished = true;
                    let err = VolleyError::partial_stream(format!(
                        "connection lost mid-response: {err}"
                    ));
                    return Some((Err(err), state));
                }
                Ok(None) => {
                    let events = state.decoder.finish();
                    state.absorb(events);
                    state.finished = true;
                }
                Err(_) => {
                    state.finished = true;
                    let err = VolleyError::partial_stream(format!(
                        "no fragment received within {}s",
                        state.fragment_timeout.as_secs()
                    ));
                    return Some((Err(err), state));
                }
            }
        }
    }))
}

/// Extracts the content delta of one chunk. `Ok(None)` for chunks without text.
fn parse_chunk(payload: &str) -> Result<Option<String>> {
    if let Some(message) = http::error_message(payload) {
        return Err(VolleyError::engine(message));
    }

    let chunk: ChatCompletionChunk = serde_json::from_str(payload)
        .map_err(|err| VolleyError::engine(format!("Failed to parse stream chunk: {err}")))?;

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty()))
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: ChatContent,
}

/// Plain text for history turns, a part list when an image rides along.
#[derive(Serialize)]
#[serde(untagged)]
enum ChatContent {
    Text(String),
    Parts(Vec<MessageContent>),
}

#[derive(Debug)]
enum MessageContent {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl Serialize for MessageContent {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(2))?;
        match self {
            MessageContent::Text { text } => {
                map.serialize_entry("type", "text")?;
                map.serialize_entry("text", text)?;
            }
            MessageContent::ImageUrl { image_url } => {
                map.serialize_entry("type", "image_url")?;
                map.serialize_entry("image_url", image_url)?;
            }
        }
        map.end()
    }
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Deserialize, Default)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}
