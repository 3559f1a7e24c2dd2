//! Chat event types

use serde::{Deserialize, Serialize};

use crate::message::{Message, MessageId};

/// How a stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamOutcome {
    /// The service sent its completion event
    Completed,
    /// The body closed without a completion event
    Closed,
    /// The service or the connection failed
    Failed,
}

/// Events emitted while a chat session runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A message was appended
    MessageAppended { message: Message },

    /// The streaming reply changed
    MessageUpdated { message: Message },

    /// A request was sent
    StreamStart { message_id: MessageId },

    /// The request finished
    StreamEnd {
        message_id: MessageId,
        outcome: StreamOutcome,
    },

    /// A request failed
    Error { message: String },

    /// The conversation was cleared
    Cleared,
}

impl ChatEvent {
    /// Check if this event ends a request
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChatEvent::StreamEnd { .. })
    }
}
