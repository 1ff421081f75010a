//! Test utilities for integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::{Router, body::Body};

use aria::api::AppState;
use aria::api::app;
use aria::core::AppConfig;
use aria::gemini::{GenerateRequest, Provider, TextStream, UpstreamError};
use aria::relay::Relay;

/// What the fake upstream does for every call.
#[derive(Clone)]
pub enum Upstream {
    Chunks(Vec<Result<String, UpstreamError>>),
    Reject(UpstreamError),
}

/// Stands in for Gemini and counts how often it was called.
pub struct FakeProvider {
    configured: bool,
    upstream: Upstream,
    calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new(upstream: Upstream) -> Arc<Self> {
        Arc::new(Self {
            configured: true,
            upstream,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn streaming(chunks: &[&str]) -> Arc<Self> {
        Self::new(Upstream::Chunks(
            chunks.iter().map(|c| Ok(c.to_string())).collect(),
        ))
    }

    pub fn unconfigured() -> Arc<Self> {
        Arc::new(Self {
            configured: false,
            upstream: Upstream::Chunks(vec![]),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn stream_generate(&self, _request: GenerateRequest) -> Result<TextStream, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.upstream.clone() {
            Upstream::Chunks(chunks) => Ok(Box::pin(futures::stream::iter(chunks))),
            Upstream::Reject(err) => Err(err),
        }
    }
}

pub fn test_config(model_catalog_url: &str) -> AppConfig {
    AppConfig {
        gemini_api_key: Some(String::from("test-api-key")),
        gemini_api_hostname: String::from("http://localhost:1"),
        default_model: String::from("gemini-2.5-flash"),
        model_catalog_url: model_catalog_url.to_string(),
    }
}

/// Creates a test application router backed by `provider`.
pub fn test_app(provider: Arc<FakeProvider>) -> Router {
    test_app_with_config(provider, test_config("http://localhost:1/api/models"))
}

pub fn test_app_with_config(provider: Arc<FakeProvider>, config: AppConfig) -> Router {
    let relay = Relay::new(provider, &config.default_model);
    app(Arc::new(AppState::new(relay, config)))
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
}
