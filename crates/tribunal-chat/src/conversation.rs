//! Conversation state: messages, loading flag, last error, and the handle
//! used to stream into the open system reply.

use tribunal_api::DecisionAccumulator;

use crate::message::{Message, MessageId, MessageKind, Role};

/// Text of a freshly opened system reply
pub const INITIAL_RESPONSE: &str = "Processing your request...";

/// Ordered, append-only list of messages.
///
/// The only message that ever changes after being appended is the open system
/// reply, and only through its [`ResponseHandle`].
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    is_loading: bool,
    error: Option<String>,
    next_id: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Whether a reply is streaming
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Last failure, until dismissed or the next send
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub(crate) fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    /// Append a complaint from the user
    pub fn push_user(&mut self, text: impl Into<String>) -> MessageId {
        self.append(Role::User, MessageKind::Information, text)
    }

    /// Record evidence filed from the chat surface
    pub fn append_evidence_notice(&mut self, text: impl Into<String>) -> MessageId {
        self.append(Role::User, MessageKind::Evidence, text)
    }

    /// Append the placeholder system reply and mark the conversation loading.
    ///
    /// The returned handle is the only way to change the placeholder. It
    /// borrows the conversation until the stream is over.
    pub fn open_response(&mut self) -> ResponseHandle<'_> {
        self.append(Role::System, MessageKind::Information, INITIAL_RESPONSE);
        self.is_loading = true;
        let index = self.messages.len() - 1;
        ResponseHandle {
            conversation: self,
            index,
        }
    }

    /// Drop every message and reset the flags. Ids keep counting up.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.is_loading = false;
        self.error = None;
    }

    fn append(&mut self, role: Role, kind: MessageKind, text: impl Into<String>) -> MessageId {
        self.next_id += 1;
        let id = MessageId(self.next_id);
        self.messages.push(Message::new(id, role, kind, text));
        id
    }
}

/// Write access to the one system reply currently streaming.
///
/// Dropping the handle ends the stream and clears the loading flag.
#[derive(Debug)]
pub struct ResponseHandle<'a> {
    conversation: &'a mut Conversation,
    index: usize,
}

impl ResponseHandle<'_> {
    pub fn id(&self) -> MessageId {
        self.message().id
    }

    pub fn message(&self) -> &Message {
        &self.conversation.messages[self.index]
    }

    /// Whether the reply still shows the initial placeholder text
    pub fn is_untouched(&self) -> bool {
        self.message().text == INITIAL_RESPONSE
    }

    /// Replace the reply with the current decision, text and metadata together
    pub fn update(&mut self, decision: &DecisionAccumulator) {
        let message = &mut self.conversation.messages[self.index];
        message.text = decision.transcript();
        message.decision_type = decision.decision_type.clone();
        message.decision_id = decision.decision_id.clone();
        message.confidence_score = decision.confidence_score;
    }

    /// Replace the reply with an error and record it on the conversation
    pub fn fail(mut self, error: &str) {
        self.rewrite_error(error);
        self.conversation.set_error(error);
    }

    /// Record an error, rewriting the reply only if nothing streamed into it
    pub fn fail_if_untouched(mut self, error: &str) {
        if self.is_untouched() {
            self.rewrite_error(error);
        }
        self.conversation.set_error(error);
    }

    /// End the stream, keeping whatever was merged
    pub fn finish(self) {}

    fn rewrite_error(&mut self, error: &str) {
        self.conversation.messages[self.index].text = format!("Error: {}", error);
    }
}

impl Drop for ResponseHandle<'_> {
    fn drop(&mut self) {
        self.conversation.is_loading = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tribunal_api::ArbitrationResult;

    fn decision(text: &str) -> DecisionAccumulator {
        let mut acc = DecisionAccumulator::new();
        acc.merge(&ArbitrationResult {
            decision: Some(text.to_string()),
            decision_id: Some("d-7".to_string()),
            ..Default::default()
        });
        acc
    }

    #[test]
    fn test_ids_increase_across_clear() {
        let mut conv = Conversation::new();
        let a = conv.push_user("first");
        let b = conv.push_user("second");
        assert!(a < b);

        conv.clear();
        assert!(conv.is_empty());
        let c = conv.push_user("third");
        assert!(c > b);
    }

    #[test]
    fn test_handle_updates_only_its_message() {
        let mut conv = Conversation::new();
        conv.push_user("complaint");
        {
            let mut handle = conv.open_response();
            assert!(handle.is_untouched());
            handle.update(&decision("Refund approved"));
            assert!(!handle.is_untouched());
            handle.finish();
        }

        assert!(!conv.is_loading());
        assert_eq!(conv.messages()[0].text, "complaint");
        let reply = &conv.messages()[1];
        assert_eq!(reply.role, Role::System);
        assert_eq!(reply.text, "**Decision**\nRefund approved");
        assert_eq!(reply.decision_id.as_deref(), Some("d-7"));
    }

    #[test]
    fn test_loading_follows_handle() {
        let mut conv = Conversation::new();
        let handle = conv.open_response();
        drop(handle);
        assert!(!conv.is_loading());
        assert_eq!(conv.last().unwrap().text, INITIAL_RESPONSE);
    }

    #[test]
    fn test_fail_if_untouched_keeps_partial_decision() {
        let mut conv = Conversation::new();
        let mut handle = conv.open_response();
        handle.update(&decision("Partial refund"));
        handle.fail_if_untouched("connection reset");

        assert_eq!(conv.last().unwrap().text, "**Decision**\nPartial refund");
        assert_eq!(conv.error(), Some("connection reset"));

        let handle = conv.open_response();
        handle.fail_if_untouched("Request failed with status: 500");
        assert_eq!(conv.last().unwrap().text, "Error: Request failed with status: 500");
    }

    #[test]
    fn test_fail_always_rewrites() {
        let mut conv = Conversation::new();
        let mut handle = conv.open_response();
        handle.update(&decision("Refund approved"));
        handle.fail("service unavailable");

        assert_eq!(conv.last().unwrap().text, "Error: service unavailable");
        assert!(!conv.is_loading());
        conv.dismiss_error();
        assert_eq!(conv.error(), None);
    }

    #[test]
    fn test_evidence_notice_kind() {
        let mut conv = Conversation::new();
        let id = conv.append_evidence_notice("Filed: Payment Receipt");
        let msg = conv.get(id).unwrap();
        assert_eq!(msg.kind, MessageKind::Evidence);
        assert!(msg.is_user());
    }
}
