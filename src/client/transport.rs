use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use thiserror::Error;

use crate::relay::{ChatRequest, ErrorBody};

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// The relay could not be reached or its body could not be read.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self(err.to_string())
    }
}

pub enum RelayResponse {
    /// Raw event-stream body
    Stream(ByteStream),
    /// The relay answered with an error before streaming anything
    Rejected { status: u16, body: ErrorBody },
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, request: ChatRequest) -> Result<RelayResponse, TransportError>;
}

/// Talks to a relay over HTTP.
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(&self, request: ChatRequest) -> Result<RelayResponse, TransportError> {
        let response = self
            .http
            .post(self.url())
            .header("Accept", "text/event-stream")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body = serde_json::from_str::<ErrorBody>(&text).unwrap_or_else(|e| {
                tracing::warn!("Relay answered {} without an error body: {}", status, e);
                ErrorBody::new(&format!("HTTP {}", status.as_u16()))
            });
            return Ok(RelayResponse::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(TransportError::from));
        Ok(RelayResponse::Stream(Box::pin(stream)))
    }
}
