//! Interactive chat: one conversation, one streamed exchange at a time.

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use volley_core::aggregate::{ResponseObserver, StreamAccumulator};
use volley_core::conversation::{
    ConversationState, ConversationTurn, ImageRef, PendingRequest, SessionPhase,
};
use volley_core::engine::EngineAdapter;
use volley_core::error::{Result, VolleyError};
use volley_core::prompt::SamplingConfig;

/// How an exchange ended. Streaming failures land here, not in `Err`.
#[derive(Debug, Clone)]
pub enum ChatOutcome {
    /// The full reply, now the last assistant turn.
    Completed(String),
    /// The stream broke; `text` (partial reply plus error note) was recorded.
    Failed { text: String, error: VolleyError },
    /// Cancelled by the caller; nothing from this exchange was recorded.
    Cancelled,
}

/// Owns a [`ConversationState`] and drives it against an engine.
pub struct ChatSession {
    state: ConversationState,
    engine: EngineAdapter,
    sampling: Arc<SamplingConfig>,
    span: tracing::Span,
}

impl ChatSession {
    pub fn new(engine: EngineAdapter, sampling: Arc<SamplingConfig>) -> Self {
        Self {
            state: ConversationState::new(),
            engine,
            sampling,
            span: crate::telemetry::session_span("chat"),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        self.state.turns()
    }

    pub fn pending_attachment(&self) -> Option<&ImageRef> {
        self.state.pending_attachment()
    }

    pub fn stage_attachment(&mut self, image: ImageRef) -> Result<()> {
        self.state.stage_attachment(image)
    }

    pub fn clear_attachment(&mut self) -> Result<()> {
        self.state.clear_attachment()
    }

    pub fn reset(&mut self) {
        self.state.reset();
        tracing::info!(parent: &self.span, "conversation reset");
    }

    /// Sends `text` (with any staged image) and streams the reply into
    /// `observer` until it completes, fails or `cancel` fires.
    ///
    /// Returns `Err` only when the message is refused up front (blank text, or
    /// a response already in flight). Everything after that is reported through
    /// [`ChatOutcome`], and the session is back to idle when this returns.
    pub async fn send(
        &mut self,
        text: &str,
        observer: &mut dyn ResponseObserver,
        cancel: &CancellationToken,
    ) -> Result<ChatOutcome> {
        let request = self.state.send_message(text)?;
        let exchange = tracing::info_span!(
            parent: &self.span,
            "exchange",
            turn = self.state.turns().len() + 1,
            has_image = request.message.attachment.is_some()
        );

        let mut accumulator = StreamAccumulator::new();
        let streamed = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = stream_reply(&self.engine, &request, &self.sampling, &mut accumulator, observer)
                .instrument(exchange.clone()) => Some(result),
        };

        let _entered = exchange.enter();
        match streamed {
            None => {
                tracing::info!(
                    fragments = accumulator.fragment_count(),
                    "response cancelled"
                );
                self.state.abandon_response()?;
                Ok(ChatOutcome::Cancelled)
            }
            Some(Ok(())) => {
                tracing::debug!(fragments = accumulator.fragment_count(), "response complete");
                let reply = accumulator.finish();
                self.state.complete_response(reply.clone())?;
                Ok(ChatOutcome::Completed(reply))
            }
            Some(Err(error)) => {
                tracing::warn!(
                    fragments = accumulator.fragment_count(),
                    error = %error,
                    "response failed"
                );
                let text = accumulator.finish_with_error(&error);
                self.state.fail_response(text.clone())?;
                Ok(ChatOutcome::Failed { text, error })
            }
        }
    }
}

async fn stream_reply(
    engine: &EngineAdapter,
    request: &PendingRequest,
    sampling: &SamplingConfig,
    accumulator: &mut StreamAccumulator,
    observer: &mut dyn ResponseObserver,
) -> Result<()> {
    let mut fragments = engine
        .generate_stream(&request.history, &request.message, sampling)
        .await?;

    while let Some(fragment) = fragments.next().await {
        accumulator.push(&fragment?, observer);
    }
    Ok(())
}
