//! Session-scoped conversation state machine.

use serde::{Deserialize, Serialize};

use super::turn::{ConversationTurn, ImageRef, Message};
use crate::error::{Result, VolleyError};

/// Phase of a chat session.
///
/// ```text
/// Idle ──stage──▶ AttachmentStaged ──send──▶ AwaitingResponse ──complete/fail──▶ Idle
///   └──────────────────────send──────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    /// No staged attachment, nothing in flight.
    Idle,
    /// An image is waiting to be bound to the next user message.
    AttachmentStaged,
    /// A user message was sent and its response is streaming.
    AwaitingResponse,
}

/// Everything a streaming engine needs to answer the latest user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    /// Turns preceding the new message, oldest first.
    pub history: Vec<ConversationTurn>,
    /// The new user message, carrying the consumed attachment if any.
    pub message: Message,
}

/// Ordered, append-only turn log plus the pending-attachment slot.
///
/// All mutation goes through the transition methods below; nothing else
/// writes to the log. A sent user turn is held aside until its exchange
/// concludes, then appended together with the reply.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    turns: Vec<ConversationTurn>,
    pending_attachment: Option<ImageRef>,
    in_flight: Option<ConversationTurn>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SessionPhase {
        if self.in_flight.is_some() {
            SessionPhase::AwaitingResponse
        } else if self.pending_attachment.is_some() {
            SessionPhase::AttachmentStaged
        } else {
            SessionPhase::Idle
        }
    }

    /// Concluded turns, oldest first. The message awaiting a reply is not
    /// included; see [`in_flight_turn`](Self::in_flight_turn).
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// The user turn whose response is streaming, if any.
    pub fn in_flight_turn(&self) -> Option<&ConversationTurn> {
        self.in_flight.as_ref()
    }

    pub fn pending_attachment(&self) -> Option<&ImageRef> {
        self.pending_attachment.as_ref()
    }

    /// Stages an image for the next user message, replacing any staged one.
    pub fn stage_attachment(&mut self, image: ImageRef) -> Result<()> {
        self.ensure_not_in_flight()?;
        self.pending_attachment = Some(image);
        Ok(())
    }

    /// Drops the staged image, if any.
    pub fn clear_attachment(&mut self) -> Result<()> {
        self.ensure_not_in_flight()?;
        self.pending_attachment = None;
        Ok(())
    }

    /// Holds a new user turn and moves to `AwaitingResponse`.
    ///
    /// The staged attachment is consumed here whether or not the caller ends up
    /// using it.
    pub fn send_message(&mut self, text: &str) -> Result<PendingRequest> {
        self.ensure_not_in_flight()?;
        if text.trim().is_empty() {
            return Err(VolleyError::invalid_input("message text must not be empty"));
        }

        let attachment = self.pending_attachment.take();
        let history = self.turns.clone();

        self.in_flight = Some(ConversationTurn::user(text, attachment.clone()));

        Ok(PendingRequest {
            history,
            message: Message {
                text: text.to_string(),
                attachment,
            },
        })
    }

    /// Records the user turn and its finished reply, then returns to `Idle`.
    pub fn complete_response(&mut self, text: impl Into<String>) -> Result<()> {
        self.conclude("complete_response", ConversationTurn::assistant(text))
    }

    /// Records a failed reply; the error text becomes the assistant turn.
    pub fn fail_response(&mut self, error_text: impl Into<String>) -> Result<()> {
        self.conclude("fail_response", ConversationTurn::assistant(error_text))
    }

    /// Abandons the in-flight request. Neither the user turn nor any partial
    /// reply is recorded.
    pub fn abandon_response(&mut self) -> Result<()> {
        self.take_in_flight("abandon_response")?;
        Ok(())
    }

    /// Clears the log and any staged attachment. Always succeeds.
    pub fn reset(&mut self) {
        self.turns.clear();
        self.pending_attachment = None;
        self.in_flight = None;
    }

    fn conclude(&mut self, transition: &str, reply: ConversationTurn) -> Result<()> {
        let user = self.take_in_flight(transition)?;
        self.turns.push(user);
        self.turns.push(reply);
        Ok(())
    }

    fn ensure_not_in_flight(&self) -> Result<()> {
        if self.in_flight.is_some() {
            Err(VolleyError::SessionBusy)
        } else {
            Ok(())
        }
    }

    fn take_in_flight(&mut self, transition: &str) -> Result<ConversationTurn> {
        self.in_flight.take().ok_or_else(|| {
            VolleyError::invalid_state(format!("{transition} called with no response in flight"))
        })
    }
}
