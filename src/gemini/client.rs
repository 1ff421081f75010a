use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{GenerateRequest, PromptTurn, Provider, TextStream, UpstreamError};
use crate::core::AppConfig;
use crate::stream::FrameDecoder;

/// Streaming client for the Gemini `generateContent` API.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_hostname: String,
    api_key: Option<String>,
}

// Only the fields needed to pull text out of a streamed chunk
#[derive(Debug, Deserialize)]
struct ChunkPart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
struct ChunkContent {
    #[serde(default)]
    parts: Vec<ChunkPart>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ChunkContent>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GeminiClient {
    pub fn new(api_hostname: &str, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_hostname: api_hostname.to_string(),
            api_key,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.gemini_api_hostname, config.gemini_api_key.clone())
    }

    fn url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.api_hostname.trim_end_matches('/'),
            model
        )
    }
}

fn payload(request: &GenerateRequest) -> Value {
    let contents: Vec<Value> = request
        .contents
        .iter()
        .map(|PromptTurn { role, text }| {
            json!({
                "role": role.as_str(),
                "parts": [{ "text": text }],
            })
        })
        .collect();

    json!({
        "contents": contents,
        "generationConfig": request.config,
    })
}

/// Extracts the text of one streamed chunk. `Ok(None)` means the chunk
/// carried nothing to show (usage metadata, empty parts, bad JSON).
fn parse_chunk(data: &str) -> Result<Option<String>, UpstreamError> {
    let value: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Skipping unparseable chunk {}: {}", data, e);
            return Ok(None);
        }
    };

    // Errors after the stream started are sent as a regular chunk
    if value.get("error").is_some_and(Value::is_object) {
        let status = value["error"]["code"].as_u64().map(|c| c as u16);
        return Err(UpstreamError::new(status, &value.to_string()));
    }

    let chunk = match serde_json::from_value::<GenerateContentChunk>(value) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("Unable to extract text from chunk {}: {}", data, e);
            return Ok(None);
        }
    };

    let text: String = chunk
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter(|p| !p.thought)
                .filter_map(|p| p.text.as_deref())
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Ok(None);
    }
    Ok(Some(text))
}

#[async_trait]
impl Provider for GeminiClient {
    fn is_configured(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    async fn stream_generate(&self, request: GenerateRequest) -> Result<TextStream, UpstreamError> {
        let api_key = self.api_key.clone().unwrap_or_default();
        let url = self.url(&request.model);

        tracing::debug!(
            "Streaming {} with {} turns",
            request.model,
            request.contents.len()
        );

        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&payload(&request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status.to_string()
            } else {
                body
            };
            return Err(UpstreamError::new(Some(status.as_u16()), &message));
        }

        let mut bytes = response.bytes_stream();
        let stream = async_stream::stream! {
            let mut decoder = FrameDecoder::default();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(UpstreamError::from(e));
                        return;
                    }
                };
                for data in decoder.push(&chunk) {
                    match parse_chunk(&data) {
                        Ok(Some(text)) => yield Ok(text),
                        Ok(None) => continue,
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
