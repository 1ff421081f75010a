//! Classifies upstream failures and recovers retry delays from quota
//! errors.
//!
//! Gemini reports quota exhaustion in several shapes: an HTTP 429,
//! a JSON error document stuffed into the error message, a structured
//! `RetryInfo` detail, or only a "Please retry in 12.3s." sentence.
//! The same classification runs for failures before and after the
//! stream has started.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::RelayError;
use crate::gemini::UpstreamError;

const RETRY_INFO_TYPE: &str = "type.googleapis.com/google.rpc.RetryInfo";
const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";

static RETRY_DELAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)s?").expect("Invalid retry delay regex"));

static RETRY_IN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)retry in (\d+(?:\.\d+)?)s").expect("Invalid retry phrase regex")
});

pub fn classify(err: &UpstreamError) -> RelayError {
    let parsed = embedded_json(&err.message);

    if !is_rate_limited(err, parsed.as_ref()) {
        return RelayError::Upstream {
            message: err.message.clone(),
            status: err.status,
        };
    }

    let retry_after = retry_after(&err.message, parsed.as_ref());
    tracing::warn!("Upstream rate limit hit, retry after {:?}s", retry_after);
    RelayError::RateLimited { retry_after }
}

/// The message parsed as JSON when it looks like a JSON object.
fn embedded_json(message: &str) -> Option<Value> {
    let trimmed = message.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

fn is_rate_limited(err: &UpstreamError, parsed: Option<&Value>) -> bool {
    if err.status == Some(429) {
        return true;
    }
    let Some(doc) = parsed else {
        return false;
    };

    let limited = |v: &Value| {
        v["code"].as_u64() == Some(429) || v["status"].as_str() == Some(RESOURCE_EXHAUSTED)
    };
    limited(&doc["error"]) || limited(doc)
}

/// Seconds to wait before retrying, if the failure says. Fractions
/// round up and a zero delay counts as no delay.
pub fn retry_after(message: &str, parsed: Option<&Value>) -> Option<u64> {
    parsed
        .and_then(from_retry_info)
        .or_else(|| from_retry_phrase(message, parsed))
        .filter(|secs| *secs > 0)
}

fn from_retry_info(doc: &Value) -> Option<u64> {
    let details = doc["error"]["details"]
        .as_array()
        .or_else(|| doc["details"].as_array())?;
    let info = details.iter().find(|d| d["@type"] == RETRY_INFO_TYPE)?;

    match &info["retryDelay"] {
        Value::String(delay) => capture_seconds(&RETRY_DELAY, delay),
        // Proto `Duration` rendered as an object
        Value::Object(duration) => duration
            .get("seconds")
            .and_then(|s| s.as_f64().or_else(|| s.as_str()?.parse().ok()))
            .map(|s| s.ceil() as u64),
        _ => None,
    }
}

fn from_retry_phrase(message: &str, parsed: Option<&Value>) -> Option<u64> {
    let nested = parsed.into_iter().flat_map(|doc| {
        [doc["error"]["message"].as_str(), doc["message"].as_str()]
            .into_iter()
            .flatten()
    });

    nested
        .chain(std::iter::once(message))
        .find_map(|text| capture_seconds(&RETRY_IN, text))
}

fn capture_seconds(re: &Regex, text: &str) -> Option<u64> {
    let secs: f64 = re.captures(text)?.get(1)?.as_str().parse().ok()?;
    Some(secs.ceil() as u64)
}
