use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};

use super::rate_limit::classify;
use super::{ChatRequest, RelayError};
use crate::gemini::{GenerateRequest, GenerationConfig, PromptTurn, Provider, Role, TextStream};
use crate::stream::StreamEvent;

pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

// Model id prefixes of provider families the relay can't serve, with
// the name shown to the user
const UNSUPPORTED_FAMILIES: &[(&str, &str)] = &[("gpt-", "ChatGPT")];

pub fn unsupported_family(model: &str) -> Option<&'static str> {
    UNSUPPORTED_FAMILIES
        .iter()
        .find(|(prefix, _)| model.starts_with(prefix))
        .map(|(_, name)| *name)
}

/// Relays one chat turn to the upstream provider.
///
/// Construct it once with the provider it should use and share it
/// between requests.
pub struct Relay {
    provider: Arc<dyn Provider>,
    default_model: String,
    generation: GenerationConfig,
}

impl Relay {
    pub fn new(provider: Arc<dyn Provider>, default_model: &str) -> Self {
        Self {
            provider,
            default_model: default_model.to_string(),
            generation: GenerationConfig::default(),
        }
    }

    pub fn with_generation_config(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    /// Checks a request and builds the upstream call for it. Nothing is
    /// sent upstream when this fails.
    pub fn validate(&self, request: &ChatRequest) -> Result<GenerateRequest, RelayError> {
        let message = request
            .message
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| RelayError::InvalidRequest(String::from("Message is required")))?;

        if !self.provider.is_configured() {
            return Err(RelayError::Unconfigured);
        }

        let model = request
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.default_model.as_str());
        if let Some(family) = unsupported_family(model) {
            return Err(RelayError::UnsupportedModel(family.to_string()));
        }

        let mut contents: Vec<PromptTurn> = request
            .history
            .iter()
            .map(|turn| PromptTurn {
                role: turn.role,
                text: turn.text(),
            })
            .filter(|turn| !turn.text.is_empty())
            .collect();
        contents.push(PromptTurn::new(Role::User, message));

        Ok(GenerateRequest {
            model: model.to_string(),
            contents,
            config: self.generation.clone(),
        })
    }

    /// Validates the request and starts the upstream stream.
    ///
    /// An `Err` means nothing was streamed and the caller should answer
    /// with an ordinary error response. Once `Ok` is returned every
    /// failure is reported inside the stream as its final event.
    pub async fn open(&self, request: ChatRequest) -> Result<EventStream, RelayError> {
        let generate = self.validate(&request)?;
        let model = generate.model.clone();

        let upstream = self.provider.stream_generate(generate).await.map_err(|e| {
            tracing::error!("Upstream call to {} failed: {}", model, e);
            classify(&e)
        })?;

        Ok(Box::pin(relay_events(upstream)))
    }
}

fn relay_events(mut upstream: TextStream) -> impl Stream<Item = StreamEvent> + Send {
    async_stream::stream! {
        while let Some(chunk) = upstream.next().await {
            match chunk {
                Ok(text) if text.is_empty() => continue,
                Ok(text) => yield StreamEvent::Delta { text },
                Err(e) => {
                    tracing::error!("Error in stream: {}", e);
                    yield classify(&e).to_event();
                    return;
                }
            }
        }
        yield StreamEvent::Done;
    }
}
