//! tribunal-chat: Dispute session state
//!
//! Owns everything the client remembers between keystrokes: the conversation
//! with the arbitration service, the wallet-backed identity session, and the
//! static policy and evidence references.

pub mod chat;
pub mod context;
pub mod conversation;
pub mod error;
pub mod events;
pub mod evidence;
pub mod identity;
pub mod message;
pub mod policy;
pub mod store;

pub use chat::{ChatSession, Exchange};
pub use context::{CaseFile, RequestContext};
pub use conversation::{Conversation, INITIAL_RESPONSE, ResponseHandle};
pub use error::{Error, Result};
pub use events::{ChatEvent, StreamOutcome};
pub use evidence::{AttachmentKind, Evidence, EvidenceLocker, NewEvidence, format_file_size};
pub use identity::{AccountChange, Session, User};
pub use message::{Message, MessageId, MessageKind, Role};
pub use policy::{Policy, PolicyBlock, PolicyCatalog, PolicyCategory, PolicySection};
pub use store::{FileStore, KeyValueStore, MemoryStore};

// Re-export the api crate for convenience
pub use tribunal_api;
