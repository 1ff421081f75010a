//! Upstream model provider boundary.
//!
//! The relay only ever talks to a `Provider`. `GeminiClient` is the
//! production implementation; tests substitute their own.

mod client;
pub use client::GeminiClient;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Author of a turn. Gemini calls the assistant side `model`.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PromptTurn {
    pub role: Role,
    pub text: String,
}

impl PromptTurn {
    pub fn new(role: Role, text: &str) -> Self {
        Self {
            role,
            text: text.to_string(),
        }
    }
}

/// Sampling parameters sent with every generation call.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_output_tokens: 8192,
            temperature: 1.0,
            top_p: 0.95,
            top_k: 40,
        }
    }
}

#[derive(Clone, Debug)]
pub struct GenerateRequest {
    pub model: String,
    pub contents: Vec<PromptTurn>,
    pub config: GenerationConfig,
}

/// A failure reported by the provider or the connection to it.
///
/// `message` is kept verbatim. For API errors it is usually the JSON
/// error document returned by the provider.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{message}")]
pub struct UpstreamError {
    pub status: Option<u16>,
    pub message: String,
}

impl UpstreamError {
    pub fn new(status: Option<u16>, message: &str) -> Self {
        Self {
            status,
            message: message.to_string(),
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        Self {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, UpstreamError>> + Send>>;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Whether a credential is available for upstream calls.
    fn is_configured(&self) -> bool;

    /// Starts a streaming generation. Resolves once the provider has
    /// accepted the request; later failures arrive through the stream.
    async fn stream_generate(&self, request: GenerateRequest) -> Result<TextStream, UpstreamError>;
}
