//! Arbitration stream events and the decision accumulator

use std::pin::Pin;

use async_stream::stream;
use futures::StreamExt;
use tokio_stream::Stream;

use crate::{
    client::ByteStream,
    error::Result,
    sse::{self, event_data},
    types::{ArbitrationResult, StreamPayload},
};

/// Text shown when a decision has no content yet
pub const PENDING_TRANSCRIPT: &str = "Processing your arbitration request...";

/// Message used when an error event carries none
pub const DEFAULT_STREAM_ERROR: &str = "Stream error";

/// Events decoded from the arbitration stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The service finished the decision
    Complete,
    /// The service gave up on the request
    Error { message: String },
    /// Some decision fields arrived
    Result(ArbitrationResult),
}

impl StreamEvent {
    /// Classify a decoded payload. Payloads with nothing we act on yield None.
    pub fn from_payload(payload: StreamPayload) -> Option<Self> {
        match payload.kind.as_deref() {
            Some("complete") => return Some(StreamEvent::Complete),
            Some("error") => {
                let message = payload
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| DEFAULT_STREAM_ERROR.to_string());
                return Some(StreamEvent::Error { message });
            }
            _ => {}
        }
        payload.arbitration_result.map(StreamEvent::Result)
    }

    /// Parse the JSON payload of one `data:` line
    pub fn parse(data: &str) -> Result<Option<Self>> {
        let payload: StreamPayload = serde_json::from_str(data)?;
        Ok(Self::from_payload(payload))
    }

    /// Check if this event ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete | StreamEvent::Error { .. })
    }
}

/// A stream of decoded arbitration events
pub type StreamEventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Decode a raw SSE body into arbitration events.
///
/// Malformed payloads are logged and skipped. A read error is yielded once and
/// ends the stream, as does a terminal event.
pub fn decode_events(bytes: ByteStream) -> StreamEventStream {
    Box::pin(stream! {
        let mut lines = sse::lines(bytes);

        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            if let Some(event) = decode_line(&line) {
                let terminal = event.is_terminal();
                yield Ok(event);
                if terminal {
                    return;
                }
            }
        }
        tracing::debug!("arbitration stream closed");
    })
}

fn decode_line(line: &str) -> Option<StreamEvent> {
    let data = event_data(line)?;
    match StreamEvent::parse(data) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, data, "skipping malformed stream event");
            None
        }
    }
}

/// Running decision assembled from partial results.
///
/// A field only changes when a result carries a non-empty value for it, so
/// later chunks never blank out earlier ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecisionAccumulator {
    pub message: String,
    pub decision: String,
    pub reasoning: String,
    pub confidence_score: Option<f64>,
    pub decision_type: Option<String>,
    pub decision_id: Option<String>,
}

impl DecisionAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one partial result into the decision
    pub fn merge(&mut self, result: &ArbitrationResult) {
        overwrite(&mut self.message, result.message.as_deref());
        overwrite(&mut self.decision, result.decision.as_deref());
        overwrite(&mut self.reasoning, result.reasoning.as_deref());

        if let Some(score) = result.confidence_score {
            self.confidence_score = Some(score);
        }
        if let Some(kind) = result.decision_type.as_deref().filter(|s| !s.is_empty()) {
            self.decision_type = Some(kind.to_string());
        }
        if let Some(id) = result.decision_id.as_deref().filter(|s| !s.is_empty()) {
            self.decision_id = Some(id.to_string());
        }
    }

    /// Whether no text section has content yet
    pub fn is_empty(&self) -> bool {
        self.message.is_empty() && self.decision.is_empty() && self.reasoning.is_empty()
    }

    /// Render the decision as markdown sections, always in the same order
    pub fn transcript(&self) -> String {
        let sections = [
            ("Decision", &self.decision),
            ("Detailed Reasoning", &self.reasoning),
            ("AI Arbitration Response", &self.message),
        ];

        let text = sections
            .iter()
            .filter(|(_, body)| !body.is_empty())
            .map(|(title, body)| format!("**{}**\n{}", title, body))
            .collect::<Vec<_>>()
            .join("\n\n");

        if text.is_empty() {
            PENDING_TRANSCRIPT.to_string()
        } else {
            text
        }
    }
}

fn overwrite(slot: &mut String, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        *slot = value.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use futures::stream;

    fn chunks(parts: &[&str]) -> ByteStream {
        let items: Vec<Result<Vec<u8>>> = parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        Box::pin(stream::iter(items))
    }

    fn result(json: &str) -> ArbitrationResult {
        serde_json::from_str(json).unwrap()
    }

    async fn collect(bytes: ByteStream) -> Vec<Result<StreamEvent>> {
        decode_events(bytes).collect().await
    }

    #[test]
    fn test_event_priority() {
        let event = StreamEvent::parse(r#"{"type":"complete","arbitration_result":{"decision":"x"}}"#)
            .unwrap();
        assert_eq!(event, Some(StreamEvent::Complete));

        let event = StreamEvent::parse(r#"{"type":"error"}"#).unwrap();
        assert_eq!(
            event,
            Some(StreamEvent::Error {
                message: "Stream error".into()
            })
        );

        let event = StreamEvent::parse(r#"{"type":"progress"}"#).unwrap();
        assert_eq!(event, None);
    }

    #[test]
    fn test_sections_keep_fixed_order() {
        let mut acc = DecisionAccumulator::new();
        acc.merge(&result(r#"{"message":"Both parties were heard."}"#));
        acc.merge(&result(r#"{"reasoning":"The receipt matches."}"#));
        acc.merge(&result(r#"{"decision":"Refund approved"}"#));

        assert_eq!(
            acc.transcript(),
            "**Decision**\nRefund approved\n\n**Detailed Reasoning**\nThe receipt matches.\n\n\
             **AI Arbitration Response**\nBoth parties were heard."
        );
    }

    #[test]
    fn test_empty_sections_are_omitted() {
        let mut acc = DecisionAccumulator::new();
        assert_eq!(acc.transcript(), PENDING_TRANSCRIPT);

        acc.merge(&result(r#"{"reasoning":"Logs were not reviewed."}"#));
        assert_eq!(acc.transcript(), "**Detailed Reasoning**\nLogs were not reviewed.");
    }

    #[test]
    fn test_fields_are_never_blanked() {
        let mut acc = DecisionAccumulator::new();
        acc.merge(&result(
            r#"{"decision":"Refund approved","confidence_score":0.9,"decision_type":"refund","decision_id":"d-1"}"#,
        ));
        acc.merge(&result(r#"{"decision":"","reasoning":null,"decision_type":""}"#));
        acc.merge(&result(r#"{}"#));

        assert_eq!(acc.decision, "Refund approved");
        assert_eq!(acc.confidence_score, Some(0.9));
        assert_eq!(acc.decision_type.as_deref(), Some("refund"));
        assert_eq!(acc.decision_id.as_deref(), Some("d-1"));

        acc.merge(&result(r#"{"decision":"Partial refund"}"#));
        assert_eq!(acc.decision, "Partial refund");
    }

    #[tokio::test]
    async fn test_event_split_across_chunks() {
        let events = collect(chunks(&[
            "data: {\"arbitration_result\":{\"deci",
            "sion\":\"Refund approved\"}}\n\n",
            "data: {\"type\":\"complete\"}\n\n",
        ]))
        .await;

        assert_eq!(events.len(), 2);
        match &events[0] {
            Ok(StreamEvent::Result(r)) => assert_eq!(r.decision.as_deref(), Some("Refund approved")),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(events[1], Ok(StreamEvent::Complete)));
    }

    #[tokio::test]
    async fn test_malformed_event_does_not_stop_stream() {
        let events = collect(chunks(&[
            "data: {not json}\n",
            ": comment\n",
            "data: {\"arbitration_result\":{\"reasoning\":\"ok\"}}\n",
        ]))
        .await;

        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], Ok(StreamEvent::Result(r)) if r.reasoning.as_deref() == Some("ok")));
    }

    #[tokio::test]
    async fn test_unterminated_tail_is_processed() {
        let events = collect(chunks(&["data: {\"type\":\"error\",\"message\":\"service unavailable\"}"])).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            Ok(StreamEvent::Error { message }) if message == "service unavailable"
        ));
    }

    #[tokio::test]
    async fn test_stops_after_terminal_event() {
        let events = collect(chunks(&[
            "data: {\"type\":\"complete\"}\n",
            "data: {\"arbitration_result\":{\"decision\":\"late\"}}\n",
        ]))
        .await;
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_read_error_ends_stream() {
        let items: Vec<Result<Vec<u8>>> = vec![
            Ok(b"data: {\"arbitration_result\":{\"decision\":\"a\"}}\n".to_vec()),
            Err(Error::Stream("connection reset".into())),
            Ok(b"data: {\"type\":\"complete\"}\n".to_vec()),
        ];
        let events = collect(Box::pin(stream::iter(items))).await;

        assert_eq!(events.len(), 2);
        assert!(events[0].is_ok());
        assert!(events[1].is_err());
    }
}
