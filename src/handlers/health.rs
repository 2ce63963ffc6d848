use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::config::{API_PREFIX, APP_VERSION};
use crate::router::AppState;
use crate::types::HealthResponse;

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        app_name: state.config.basic.app_name.clone(),
        version: APP_VERSION.to_string(),
    })
}

pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "message": format!("Welcome to {}", state.config.basic.app_name),
        "version": APP_VERSION,
        "api": API_PREFIX,
    }))
}
