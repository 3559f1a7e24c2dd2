//! HTTP client for the arbitration service

use std::pin::Pin;

use async_trait::async_trait;
use futures::StreamExt;
use tokio_stream::Stream;

use crate::{
    error::{Error, Result},
    stream::{StreamEventStream, decode_events},
    types::ArbitrationRequest,
};

/// Default streaming endpoint of a locally running service
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/arbitrate/stream";

/// Raw response body, chunk by chunk
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Anything that can answer an arbitration request with an event stream.
///
/// Implementors only need `open`; the default `stream` frames and decodes the
/// body.
#[async_trait]
pub trait ArbitrationService: Send + Sync {
    /// Send the request and return the raw response body
    async fn open(&self, request: &ArbitrationRequest) -> Result<ByteStream>;

    /// Send the request and return decoded events
    async fn stream(&self, request: &ArbitrationRequest) -> Result<StreamEventStream> {
        let bytes = self.open(request).await?;
        Ok(decode_events(bytes))
    }
}

/// Arbitration service reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpArbitrationClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpArbitrationClient {
    /// Create a client for `endpoint`
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(Error::InvalidConfig(format!(
                "endpoint must be an http(s) URL, got '{}'",
                endpoint
            )));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Default for HttpArbitrationClient {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

#[async_trait]
impl ArbitrationService for HttpArbitrationClient {
    async fn open(&self, request: &ArbitrationRequest) -> Result<ByteStream> {
        tracing::debug!(endpoint = %self.endpoint, query = %request.user_query, "opening arbitration stream");

        let response = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .header("accept", "text/event-stream")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::status(status.as_u16(), body));
        }
        if status == reqwest::StatusCode::NO_CONTENT {
            return Err(Error::MissingBody);
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(Error::from));
        Ok(Box::pin(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamEvent;
    use futures::stream;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
    };

    struct Scripted(Vec<&'static str>);

    #[async_trait]
    impl ArbitrationService for Scripted {
        async fn open(&self, _request: &ArbitrationRequest) -> Result<ByteStream> {
            let items: Vec<Result<Vec<u8>>> =
                self.0.iter().map(|c| Ok(c.as_bytes().to_vec())).collect();
            Ok(Box::pin(stream::iter(items)))
        }
    }

    #[tokio::test]
    async fn test_default_stream_decodes_body() {
        let service = Scripted(vec![
            "data: {\"arbitration_result\":{\"decision\":\"Refund approved\"}}\n\n",
            "data: {\"type\":\"complete\"}\n\n",
        ]);
        let request = ArbitrationRequest::sample("My payment was overcharged");
        let events: Vec<_> = service.stream(&request).await.unwrap().collect().await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events.last(), Some(Ok(StreamEvent::Complete))));
    }

    /// Answer one request on a loopback port with a canned HTTP response
    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{}/arbitrate/stream", addr)
    }

    async fn read_request(socket: &mut TcpStream) {
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            request.extend_from_slice(&buf[..n]);

            let text = String::from_utf8_lossy(&request);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| {
                        line.to_ascii_lowercase()
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                    })
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    #[tokio::test]
    async fn test_error_status_keeps_body() {
        let endpoint = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 17\r\nConnection: close\r\n\r\nPolicy not loaded",
        )
        .await;
        let client = HttpArbitrationClient::new(endpoint).unwrap();
        let request = ArbitrationRequest::sample("Where is my refund?");

        match client.open(&request).await {
            Err(Error::Status { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "Policy not loaded");
            }
            other => panic!("expected a status error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_no_content_is_missing_body() {
        let endpoint =
            serve_once("HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n").await;
        let client = HttpArbitrationClient::new(endpoint).unwrap();
        let request = ArbitrationRequest::sample("Where is my refund?");

        let result = client.open(&request).await;
        assert!(matches!(result, Err(Error::MissingBody)));
    }

    #[tokio::test]
    async fn test_http_stream_decodes_events() {
        let endpoint = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n\
             data: {\"arbitration_result\":{\"decision\":\"Refund approved\"}}\n\n\
             data: {\"type\":\"complete\"}\n\n",
        )
        .await;
        let client = HttpArbitrationClient::new(endpoint).unwrap();
        let request = ArbitrationRequest::sample("Where is my refund?");

        let events: Vec<_> = client.stream(&request).await.unwrap().collect().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], Ok(StreamEvent::Result(r)) if r.decision.as_deref() == Some("Refund approved")));
        assert!(matches!(events.last(), Some(Ok(StreamEvent::Complete))));
    }

    #[test]
    fn test_rejects_non_http_endpoint() {
        assert!(HttpArbitrationClient::new("ftp://example.com").is_err());
        let client = HttpArbitrationClient::new("https://arbiter.example/arbitrate/stream").unwrap();
        assert_eq!(client.endpoint(), "https://arbiter.example/arbitrate/stream");
        assert_eq!(HttpArbitrationClient::default().endpoint(), DEFAULT_ENDPOINT);
    }
}
