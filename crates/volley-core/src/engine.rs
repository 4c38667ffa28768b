//! The generation capability and its two transport shapes.
//!
//! A [`BulkEngine`] takes N prompts and blocks until all N completions are
//! ready. A [`StreamingEngine`] takes one message plus history and yields the
//! response incrementally. [`EngineAdapter`] wraps either one so the batch
//! pipeline and the chat session can run on whichever the run mode selects.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt, TryStreamExt, stream};

use crate::batch::Batch;
use crate::conversation::{ConversationTurn, Message};
use crate::error::{Result, VolleyError};
use crate::prompt::{GeneratedText, SamplingConfig};

/// Lazily produced response fragments, in generation order.
///
/// Finite and not restartable. Dropping it abandons the response and releases
/// the underlying connection.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// An engine that completes a list of prompts in one call.
#[async_trait]
pub trait BulkEngine: Send + Sync {
    /// Returns exactly one output per prompt, in prompt order, or fails as a
    /// whole.
    async fn generate(&self, prompts: &[String], config: &SamplingConfig)
    -> Result<Vec<GeneratedText>>;
}

/// An engine that streams a chat reply.
#[async_trait]
pub trait StreamingEngine: Send + Sync {
    async fn generate_stream(
        &self,
        history: &[ConversationTurn],
        message: &Message,
        config: &SamplingConfig,
    ) -> Result<FragmentStream>;
}

/// The single "generate" capability, backed by one of the two engine shapes.
#[derive(Clone)]
pub enum EngineAdapter {
    Bulk(Arc<dyn BulkEngine>),
    Streaming {
        engine: Arc<dyn StreamingEngine>,
        /// Maximum number of per-prompt streams in flight for one batch.
        parallelism: usize,
    },
}

impl EngineAdapter {
    pub fn bulk(engine: Arc<dyn BulkEngine>) -> Self {
        Self::Bulk(engine)
    }

    pub fn streaming(engine: Arc<dyn StreamingEngine>, parallelism: usize) -> Self {
        Self::Streaming {
            engine,
            parallelism: parallelism.max(1),
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bulk(_) => "bulk",
            Self::Streaming { .. } => "streaming",
        }
    }

    /// Generates one output per record of `batch`, in batch order.
    pub async fn generate_batch(
        &self,
        batch: &Batch,
        config: &SamplingConfig,
    ) -> Result<Vec<GeneratedText>> {
        if batch.is_empty() {
            return Err(VolleyError::invalid_input("cannot generate an empty batch"));
        }
        let prompts = batch.prompts();

        let outputs = match self {
            Self::Bulk(engine) => engine.generate(&prompts, config).await?,
            Self::Streaming {
                engine,
                parallelism,
            } => {
                stream::iter(prompts)
                    .map(|prompt| {
                        let engine = Arc::clone(engine);
                        async move {
                            let message = Message::text(prompt.clone());
                            let fragments = engine.generate_stream(&[], &message, config).await?;
                            let text: String = fragments.try_collect().await?;
                            Ok::<_, VolleyError>(GeneratedText::new(prompt, text))
                        }
                    })
                    .buffered(*parallelism)
                    .try_collect()
                    .await?
            }
        };

        if outputs.len() != batch.len() {
            return Err(VolleyError::ShapeMismatch {
                expected: batch.len(),
                actual: outputs.len(),
            });
        }
        Ok(outputs)
    }

    /// Streams a reply to `message` given the prior `history`.
    ///
    /// A bulk engine answers with a single fragment built from a plain
    /// transcript of the conversation; it cannot carry images.
    pub async fn generate_stream(
        &self,
        history: &[ConversationTurn],
        message: &Message,
        config: &SamplingConfig,
    ) -> Result<FragmentStream> {
        match self {
            Self::Streaming { engine, .. } => engine.generate_stream(history, message, config).await,
            Self::Bulk(engine) => {
                if message.attachment.is_some() {
                    return Err(VolleyError::invalid_input(
                        "image attachments need a streaming chat engine",
                    ));
                }
                let prompt = render_transcript(history, message);
                let mut outputs = engine.generate(&[prompt], config).await?;
                if outputs.len() != 1 {
                    return Err(VolleyError::ShapeMismatch {
                        expected: 1,
                        actual: outputs.len(),
                    });
                }
                let text = outputs.remove(0).text;
                Ok(Box::pin(stream::once(async move { Ok(text) })))
            }
        }
    }
}

/// Flattens a conversation into a single completion prompt.
pub fn render_transcript(history: &[ConversationTurn], message: &Message) -> String {
    let mut prompt = String::new();
    for turn in history {
        prompt.push_str(turn.role.as_ref());
        prompt.push_str(": ");
        prompt.push_str(&turn.text);
        prompt.push('\n');
    }
    prompt.push_str("user: ");
    prompt.push_str(&message.text);
    prompt.push_str("\nassistant:");
    prompt
}
