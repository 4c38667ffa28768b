//! Chat conversation model.
//!
//! - [`turn`]: turns, roles, image references and outgoing messages
//! - [`state`]: the per-session state machine that owns the turn log

pub mod state;
pub mod turn;

pub use state::{ConversationState, PendingRequest, SessionPhase};
pub use turn::{ConversationTurn, ImageRef, Message, Role};
