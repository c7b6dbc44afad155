use super::{created, ok};
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::SharedState;
use ::payments::{CreatePaymentInput, RefundInput, UpdatePaymentStatusInput};
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/payments", get(list_payments).post(create_payment))
        .route("/api/payments/summary", get(summary))
        .route("/api/payments/:id", get(payment_details))
        .route("/api/payments/:id/status", put(update_status))
        .route("/api/payments/:id/refunds", post(refund))
        .route("/api/payments/:id/receipt", get(download_receipt))
}

async fn download_receipt(State(state): State<SharedState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    let receipt = state
        .blocking(move |s| ::payments::issue_receipt(s.store(), id, Utc::now()))
        .await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"receipt_{}.txt\"", receipt.payment_id),
            ),
        ],
        receipt.render(),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentQuery {
    pub appointment_id: Option<i64>,
}

async fn list_payments(
    State(state): State<SharedState>,
    Query(query): Query<PaymentQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state
        .blocking(move |s| ::payments::list_payments(s.store(), query.appointment_id))
        .await?))
}

async fn create_payment(
    State(state): State<SharedState>,
    Json(input): Json<CreatePaymentInput>,
) -> ApiResult<impl IntoResponse> {
    let payment = state
        .blocking(move |s| ::payments::create_payment(s.store(), input))
        .await?;
    Ok(created(payment))
}

async fn summary(State(state): State<SharedState>) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.blocking(|s| ::payments::payment_summary(s.store())).await?))
}

async fn payment_details(State(state): State<SharedState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    Ok(ok(state
        .blocking(move |s| ::payments::payment_details(s.store(), id))
        .await?))
}

async fn update_status(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdatePaymentStatusInput>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state
        .blocking(move |s| ::payments::update_payment_status(s.store(), id, input))
        .await?))
}

async fn refund(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(input): Json<RefundInput>,
) -> ApiResult<impl IntoResponse> {
    let processed_by = Some(user.user_id);
    let (refund, payment) = state
        .blocking(move |s| ::payments::refund_payment(s.store(), id, input, processed_by))
        .await?;
    Ok(created(json!({ "refund": refund, "payment": payment })))
}
