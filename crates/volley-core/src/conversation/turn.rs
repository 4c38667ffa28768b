//! Conversation turn types.
//!
//! This module contains the types for representing turns in a chat session:
//! roles, image references, and the outgoing message handed to an engine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// Represents the author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    /// Turn written by the user.
    User,
    /// Turn generated by the model.
    Assistant,
}

/// Opaque reference to an image attached to a user turn.
///
/// The conversation model never holds a transport encoding; adapters resolve
/// the reference when they build a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageRef {
    /// Image file on the local filesystem.
    Local { path: PathBuf },
    /// Image reachable by URL; passed to the engine as-is.
    Remote { url: String },
    /// Image bytes already held in memory.
    InMemory {
        #[serde(skip)]
        data: Vec<u8>,
        mime_type: String,
    },
}

impl ImageRef {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::Local { path: path.into() }
    }

    pub fn remote(url: impl Into<String>) -> Self {
        Self::Remote { url: url.into() }
    }

    pub fn in_memory(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self::InMemory {
            data,
            mime_type: mime_type.into(),
        }
    }

    /// Interprets user input as a URL when it has an http(s) scheme, as a path
    /// otherwise.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Self::remote(trimmed)
        } else {
            Self::local(trimmed)
        }
    }

    /// Short human-readable label for display.
    pub fn label(&self) -> String {
        match self {
            Self::Local { path } => path.display().to_string(),
            Self::Remote { url } => url.clone(),
            Self::InMemory { data, mime_type } => format!("{mime_type} ({} bytes)", data.len()),
        }
    }
}

/// A single turn in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
    /// Image bound to this turn (user turns only).
    pub attachment: Option<ImageRef>,
    /// Timestamp when the turn was appended (RFC 3339).
    pub timestamp: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>, attachment: Option<ImageRef>) -> Self {
        Self::new(Role::User, text.into(), attachment)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text.into(), None)
    }

    fn new(role: Role, text: String, attachment: Option<ImageRef>) -> Self {
        Self {
            role,
            text,
            attachment,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// The new user message submitted to a streaming engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub attachment: Option<ImageRef>,
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, image: ImageRef) -> Self {
        self.attachment = Some(image);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_renders_lowercase() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.as_ref(), "assistant");
    }

    #[test]
    fn test_image_ref_parse() {
        assert_eq!(
            ImageRef::parse(" https://example.com/cat.png "),
            ImageRef::remote("https://example.com/cat.png")
        );
        assert_eq!(ImageRef::parse("./cat.jpg"), ImageRef::local("./cat.jpg"));
    }
}
