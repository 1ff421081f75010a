//! Public API types

use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;

use crate::relay::{ErrorBody, RelayError};

// Errors

pub struct ApiError(anyhow::Error);

/// Convert `ApiError` into an Axum compatible response. Relay errors
/// keep their own status and body, anything else is a 500.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Some(err) = self.0.downcast_ref::<RelayError>() {
            match err {
                RelayError::InvalidRequest(_) | RelayError::UnsupportedModel(_) => {
                    tracing::warn!("Rejected chat request: {}", err)
                }
                _ => tracing::error!("{}", err),
            }
            return (err.status_code(), Json(err.body())).into_response();
        }

        // Always log the error
        tracing::error!("{}", self.0);

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody::new(&self.0.to_string())),
        )
            .into_response()
    }
}

/// Enables using `?` on functions that return `Result<_,
/// anyhow::Error>` to turn them into `Result<_, ApiError>`
impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

// Re-export public types from each route

pub mod chat {
    pub use crate::api::routes::chat::public::*;
}
