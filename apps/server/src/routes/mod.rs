//! HTTP routes. Each module exposes a `router()` merged in [`crate::build_app`].

pub mod appointments;
pub mod messages;
pub mod patients;
pub mod payments;
pub mod providers;
pub mod records;
pub mod symptoms;
pub mod ussd;

use crate::state::SharedState;
use axum::{http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

/// Success envelope for API responses
#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub success: bool,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<ApiOk<T>> {
    Json(ApiOk { success: true, data })
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<ApiOk<T>>) {
    (StatusCode::CREATED, ok(data))
}

/// Every session-protected `/api` route
pub fn api_router() -> Router<SharedState> {
    Router::new()
        .merge(patients::router())
        .merge(providers::router())
        .merge(appointments::router())
        .merge(records::router())
        .merge(messages::router())
        .merge(payments::router())
        .merge(symptoms::router())
}

pub fn health_router() -> Router<SharedState> {
    Router::new().route("/health", get(health))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "tujali-health" }))
}
