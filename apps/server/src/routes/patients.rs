use super::{created, ok};
use crate::error::ApiResult;
use crate::state::SharedState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::Utc;
use clinic::CreatePatientInput;
use clinic_integrity::{AppointmentFilter, PatientUpdate};
use serde_json::json;
use tujali_shared::PaginationInput;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/patients", get(list_patients).post(create_patient))
        .route("/api/patients/stats", get(patient_stats))
        .route("/api/patients/:id", get(get_patient).put(update_patient))
        .route("/api/patients/:id/journey", get(patient_journey))
        .route("/api/patients/:id/records", get(patient_records))
}

async fn list_patients(
    State(state): State<SharedState>,
    Query(pagination): Query<PaginationInput>,
) -> ApiResult<impl IntoResponse> {
    let page = state
        .blocking(move |s| {
            pagination.validate()?;
            clinic::list_patients(s.store(), &pagination)
        })
        .await?;
    Ok(ok(page))
}

async fn create_patient(
    State(state): State<SharedState>,
    axum::Json(input): axum::Json<CreatePatientInput>,
) -> ApiResult<impl IntoResponse> {
    let patient = state.blocking(move |s| clinic::create_patient(s.store(), input)).await?;
    Ok(created(patient))
}

async fn patient_stats(State(state): State<SharedState>) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.blocking(|s| clinic::patient_statistics(s.store())).await?))
}

async fn get_patient(State(state): State<SharedState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.blocking(move |s| clinic::get_patient(s.store(), id)).await?))
}

async fn update_patient(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    axum::Json(update): axum::Json<PatientUpdate>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.blocking(move |s| clinic::update_patient(s.store(), id, update)).await?))
}

async fn patient_journey(State(state): State<SharedState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    Ok(ok(state
        .blocking(move |s| clinic::patient_journey(s.store(), id, Utc::now()))
        .await?))
}

/// Everything on file for one patient
async fn patient_records(State(state): State<SharedState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    let records = state
        .blocking(move |s| {
            let store = s.store();
            let patient = clinic::get_patient(store, id)?;
            let filter = AppointmentFilter {
                patient_id: Some(id),
                ..Default::default()
            };
            Ok(json!({
                "patient": patient,
                "appointments": clinic::list_appointments(store, &filter)?,
                "prescriptions": clinic::list_patient_prescriptions(store, id)?,
                "lab_results": clinic::list_patient_lab_results(store, id)?,
                "symptom_reports": symptoms::patient_reports(store, id)?,
            }))
        })
        .await?;
    Ok(ok(records))
}
