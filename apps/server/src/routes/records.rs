//! Prescriptions and lab results written by the signed-in provider.

use super::{created, ok};
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::SharedState;
use crate::tracking::tracked;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Extension, Json, Router,
};
use clinic::{CreatePrescriptionInput, EnterLabResultsInput, OrderLabTestInput};
use clinic_integrity::{InteractionKind, NewInteraction, PrescriptionStatus};
use serde::Deserialize;
use serde_json::json;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/prescriptions", get(list_prescriptions).post(create_prescription))
        .route("/api/prescriptions/:id", get(get_prescription))
        .route("/api/prescriptions/:id/status", put(update_prescription_status))
        .route("/api/lab-results", get(list_lab_results).post(order_lab_test))
        .route("/api/lab-results/:id", get(get_lab_result))
        .route("/api/lab-results/:id/results", put(enter_results))
        .route("/api/lab-results/:id/cancel", post(cancel_lab_test))
}

// ============================================================================
// Prescriptions
// ============================================================================

async fn list_prescriptions(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let provider_id = user.provider_id()?;
    Ok(ok(state
        .blocking(move |s| clinic::list_provider_prescriptions(s.store(), provider_id))
        .await?))
}

async fn create_prescription(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<CreatePrescriptionInput>,
) -> ApiResult<impl IntoResponse> {
    let provider_id = user.provider_id()?;
    let prescription = state
        .blocking(move |s| clinic::create_prescription(s.store(), provider_id, input))
        .await?;
    Ok(created(prescription))
}

async fn get_prescription(State(state): State<SharedState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.blocking(move |s| clinic::get_prescription(s.store(), id)).await?))
}

#[derive(Debug, Deserialize)]
pub struct PrescriptionStatusRequest {
    pub status: PrescriptionStatus,
}

async fn update_prescription_status(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(request): Json<PrescriptionStatusRequest>,
) -> ApiResult<Response> {
    let prescription = state
        .blocking(move |s| clinic::update_prescription_status(s.store(), id, request.status))
        .await?;
    let interaction = NewInteraction::now(
        prescription.patient_id,
        InteractionKind::Prescription,
        format!("Prescription {} {}", prescription.id, prescription.status),
    )
    .with_metadata(json!({ "prescription_id": prescription.id, "status": prescription.status }));
    Ok(tracked(ok(prescription), interaction))
}

// ============================================================================
// Lab results
// ============================================================================

async fn list_lab_results(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let provider_id = user.provider_id()?;
    Ok(ok(state
        .blocking(move |s| clinic::list_provider_lab_results(s.store(), provider_id))
        .await?))
}

async fn order_lab_test(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<OrderLabTestInput>,
) -> ApiResult<impl IntoResponse> {
    let provider_id = user.provider_id()?;
    let lab = state
        .blocking(move |s| clinic::order_lab_test(s.store(), provider_id, input))
        .await?;
    Ok(created(lab))
}

async fn get_lab_result(State(state): State<SharedState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.blocking(move |s| clinic::get_lab_result(s.store(), id)).await?))
}

async fn enter_results(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(input): Json<EnterLabResultsInput>,
) -> ApiResult<Response> {
    let lab = state
        .blocking(move |s| clinic::enter_lab_results(s.store(), id, input))
        .await?;
    let interaction = NewInteraction::now(
        lab.patient_id,
        InteractionKind::LabResult,
        format!("{} results available", lab.test_name),
    )
    .with_metadata(json!({ "lab_id": lab.id, "is_abnormal": lab.is_abnormal }));
    Ok(tracked(ok(lab), interaction))
}

async fn cancel_lab_test(State(state): State<SharedState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.blocking(move |s| clinic::cancel_lab_test(s.store(), id)).await?))
}
