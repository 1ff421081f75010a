use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stream::StreamEvent;

/// Every way a chat turn can fail on the relay side.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RelayError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("API key is not configured")]
    Unconfigured,

    /// Holds the display name of the rejected provider family
    #[error("{0} models are not supported yet. Please use a Gemini model.")]
    UnsupportedModel(String),

    #[error("{}", rate_limit_message(.retry_after))]
    RateLimited { retry_after: Option<u64> },

    #[error("{message}")]
    Upstream {
        message: String,
        status: Option<u16>,
    },
}

fn rate_limit_message(retry_after: &Option<u64>) -> String {
    match retry_after {
        Some(secs) => format!("Rate limit exceeded. Please retry in {} seconds.", secs),
        None => String::from("Rate limit exceeded. Please wait a moment and try again."),
    }
}

/// JSON body of a non-streamed error response.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ErrorBody {
    pub fn new(error: &str) -> Self {
        Self {
            error: error.to_string(),
            code: None,
            retry_after: None,
        }
    }
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::UnsupportedModel(_) => StatusCode::BAD_REQUEST,
            Self::Unconfigured | Self::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Body for an error returned before the stream started.
    pub fn body(&self) -> ErrorBody {
        let code = match self {
            Self::RateLimited { .. } => Some(StatusCode::TOO_MANY_REQUESTS.as_u16()),
            _ => None,
        };
        ErrorBody {
            error: self.to_string(),
            code,
            retry_after: self.retry_after(),
        }
    }

    /// Terminal event for an error raised after the stream started, when
    /// the HTTP status can no longer change.
    pub fn to_event(&self) -> StreamEvent {
        let code = match self {
            Self::Upstream { status, .. } => *status,
            _ => Some(self.status_code().as_u16()),
        };
        StreamEvent::Error {
            message: self.to_string(),
            code,
            retry_after: self.retry_after(),
        }
    }
}
