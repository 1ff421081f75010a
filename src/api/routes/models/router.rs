//! Router for the model catalog, proxied from a local listing service

use std::sync::Arc;

use anyhow::anyhow;
use axum::{Json, Router, extract::State, routing::get};
use serde_json::Value;

use crate::api::public::ApiError;
use crate::api::state::AppState;

type SharedState = Arc<AppState>;

async fn list_models(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let url = &state.config.model_catalog_url;

    let response = state
        .http
        .get(url)
        .send()
        .await
        .map_err(|e| anyhow!("Failed to fetch models: {}", e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("Failed to fetch models: {}", status).into());
    }

    let models = response.json::<Value>().await?;
    Ok(Json(models))
}

pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(list_models))
}
