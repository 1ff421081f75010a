//! Router for the chat API

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Json, State, rejection::JsonRejection},
    response::{IntoResponse, sse::Event, sse::KeepAlive, sse::Sse},
    routing::post,
};
use http::{HeaderValue, header};
use tokio_stream::StreamExt as _;

use super::public;
use crate::api::public::ApiError;
use crate::api::state::AppState;
use crate::relay::RelayError;

type SharedState = Arc<AppState>;

/// Relay a chat turn upstream and stream the response back as
/// server-sent events
async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<public::ChatRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|e| RelayError::InvalidRequest(e.body_text()))?;

    tracing::debug!(
        "Chat turn with {} prior turns, model {:?}",
        request.history.len(),
        request.model
    );

    // Errors up to here are answered with a plain JSON response. After
    // this point they can only travel inside the stream.
    let events = state.relay.open(request).await?;

    let sse_stream =
        events.map(|event| Ok::<Event, Infallible>(Event::default().data(event.to_payload())));

    let mut resp = Sse::new(sse_stream)
        .keep_alive(KeepAlive::default().text("keep-alive"))
        .into_response();
    resp.headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));

    Ok(resp)
}

/// Create the chat router
pub fn router() -> Router<SharedState> {
    Router::new().route("/", post(chat_handler))
}
