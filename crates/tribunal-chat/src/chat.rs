//! Chat session: forwards complaints to the arbitration service and streams
//! the decision into the conversation.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::broadcast;
use tribunal_api::{ArbitrationService, DecisionAccumulator, StreamEvent};

use crate::{
    context::RequestContext,
    conversation::{Conversation, ResponseHandle},
    error::{Error, Result},
    events::{ChatEvent, StreamOutcome},
    evidence::Evidence,
    message::MessageId,
};

/// Messages created by one send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exchange {
    pub user_message: MessageId,
    pub response_message: MessageId,
    pub outcome: StreamOutcome,
}

/// One conversation with the arbitration service
pub struct ChatSession {
    conversation: Conversation,
    service: Arc<dyn ArbitrationService>,
    context: RequestContext,
    event_tx: broadcast::Sender<ChatEvent>,
}

impl ChatSession {
    pub fn new(service: Arc<dyn ArbitrationService>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            conversation: Conversation::new(),
            service,
            context: RequestContext::default(),
            event_tx,
        }
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    /// Subscribe to chat events
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.event_tx.subscribe()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Change what later requests carry
    pub fn set_context(&mut self, context: RequestContext) {
        self.context = context;
    }

    pub fn is_loading(&self) -> bool {
        self.conversation.is_loading()
    }

    pub fn dismiss_error(&mut self) {
        self.conversation.dismiss_error();
    }

    /// Clear all messages
    pub fn clear(&mut self) {
        self.conversation.clear();
        let _ = self.event_tx.send(ChatEvent::Cleared);
    }

    /// Note newly filed evidence in the conversation
    pub fn append_evidence_notice(&mut self, evidence: &Evidence) -> MessageId {
        let text = format!(
            "Submitted evidence for the {}: {}\n{}",
            evidence.submitted_by.name().to_lowercase(),
            evidence.title,
            evidence.description
        );
        let id = self.conversation.append_evidence_notice(text);
        self.emit_appended(id);
        id
    }

    /// Send a complaint and stream the decision into a new system message.
    ///
    /// Appends exactly one user message and one system message. Returns once
    /// the stream completes, closes, or fails.
    ///
    /// The `&mut self` borrow keeps a second send from starting while this one
    /// streams. The loading check only rejects a conversation whose response
    /// handle was never released.
    pub async fn send_message(&mut self, text: &str) -> Result<Exchange> {
        let query = text.trim();
        if query.is_empty() {
            return Err(Error::EmptyInput);
        }
        if self.conversation.is_loading() {
            return Err(Error::Busy);
        }

        self.conversation.dismiss_error();
        let user_message = self.conversation.push_user(query);
        self.emit_appended(user_message);

        let request = self.context.build_request(query);
        tracing::debug!(context = %self.context.label(), "sending arbitration request");

        let tx = &self.event_tx;
        let mut handle = self.conversation.open_response();
        let response_message = handle.id();
        let _ = tx.send(ChatEvent::MessageAppended {
            message: handle.message().clone(),
        });
        let _ = tx.send(ChatEvent::StreamStart {
            message_id: response_message,
        });

        let result = stream_into(&*self.service, &request, &mut handle, tx).await;
        let outcome = match result {
            Ok(outcome) => {
                handle.finish();
                outcome
            }
            Err(failure) => {
                let error = failure.error();
                match &failure {
                    Failure::Service(message) => handle.fail(message),
                    Failure::Connection(e) => handle.fail_if_untouched(&e.to_string()),
                }
                tracing::debug!(error = %error, "arbitration request failed");
                if let Some(message) = self.conversation.get(response_message) {
                    let _ = tx.send(ChatEvent::MessageUpdated {
                        message: message.clone(),
                    });
                }
                let _ = tx.send(ChatEvent::Error { message: error.clone() });
                let _ = tx.send(ChatEvent::StreamEnd {
                    message_id: response_message,
                    outcome: StreamOutcome::Failed,
                });
                return Err(failure.into());
            }
        };

        tracing::debug!(?outcome, "arbitration stream ended");
        let _ = self.event_tx.send(ChatEvent::StreamEnd {
            message_id: response_message,
            outcome,
        });

        Ok(Exchange {
            user_message,
            response_message,
            outcome,
        })
    }

    fn emit_appended(&self, id: MessageId) {
        if let Some(message) = self.conversation.get(id) {
            let _ = self.event_tx.send(ChatEvent::MessageAppended {
                message: message.clone(),
            });
        }
    }
}

/// Why a stream stopped early
enum Failure {
    /// The service sent an error event
    Service(String),
    /// Connecting or reading failed
    Connection(tribunal_api::Error),
}

impl Failure {
    fn error(&self) -> String {
        match self {
            Failure::Service(message) => message.clone(),
            Failure::Connection(e) => e.to_string(),
        }
    }
}

impl From<Failure> for Error {
    fn from(failure: Failure) -> Self {
        match failure {
            Failure::Service(message) => Error::Api(tribunal_api::Error::Stream(message)),
            Failure::Connection(e) => Error::Api(e),
        }
    }
}

async fn stream_into(
    service: &dyn ArbitrationService,
    request: &tribunal_api::ArbitrationRequest,
    handle: &mut ResponseHandle<'_>,
    tx: &broadcast::Sender<ChatEvent>,
) -> std::result::Result<StreamOutcome, Failure> {
    let mut events = service.stream(request).await.map_err(Failure::Connection)?;
    let mut decision = DecisionAccumulator::new();

    while let Some(event) = events.next().await {
        match event.map_err(Failure::Connection)? {
            StreamEvent::Result(result) => {
                decision.merge(&result);
                handle.update(&decision);
                let _ = tx.send(ChatEvent::MessageUpdated {
                    message: handle.message().clone(),
                });
            }
            StreamEvent::Complete => return Ok(StreamOutcome::Completed),
            StreamEvent::Error { message } => return Err(Failure::Service(message)),
        }
    }
    Ok(StreamOutcome::Closed)
}
