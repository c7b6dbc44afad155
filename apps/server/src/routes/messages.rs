use super::{created, ok};
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use clinic::SendMessageInput;
use clinic_integrity::SenderType;
use serde::Deserialize;
use serde_json::json;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/messages/conversations", get(conversations))
        .route("/api/messages/:patient_id", get(conversation).post(send_message))
        .route("/api/messages/:patient_id/read", post(mark_read))
}

async fn conversations(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let provider_id = user.provider_id()?;
    Ok(ok(state
        .blocking(move |s| clinic::conversation_list(s.store(), provider_id))
        .await?))
}

async fn conversation(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(patient_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let provider_id = user.provider_id()?;
    Ok(ok(state
        .blocking(move |s| {
            clinic::get_patient(s.store(), patient_id)?;
            clinic::conversation(s.store(), provider_id, patient_id)
        })
        .await?))
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

async fn send_message(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(patient_id): Path<i64>,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let input = SendMessageInput {
        provider_id: user.provider_id()?,
        patient_id,
        content: request.content,
        sender: SenderType::Provider,
    };
    let message = state.blocking(move |s| clinic::send_message(s.store(), input)).await?;
    Ok(created(message))
}

async fn mark_read(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(patient_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let provider_id = user.provider_id()?;
    let marked = state
        .blocking(move |s| clinic::mark_conversation_read(s.store(), provider_id, patient_id))
        .await?;
    Ok(ok(json!({ "marked_read": marked })))
}
