//! Chat message types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Position of a message within its conversation. Ids sort in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    System,
}

/// What a message carries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Information,
    Evidence,
}

/// A single entry of the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub kind: MessageKind,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
}

impl Message {
    pub(crate) fn new(id: MessageId, role: Role, kind: MessageKind, text: impl Into<String>) -> Self {
        Self {
            id,
            role,
            kind,
            text: text.into(),
            created_at: Utc::now(),
            decision_type: None,
            decision_id: None,
            confidence_score: None,
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    /// Whether the service attached decision metadata
    pub fn has_decision(&self) -> bool {
        self.decision_type.is_some() || self.decision_id.is_some() || self.confidence_score.is_some()
    }
}
