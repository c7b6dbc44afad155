use super::{created, ok};
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::SharedState;
use crate::tracking::tracked;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::{get, put},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use clinic::{BookingDetails, CreateAppointmentInput, UpdateAppointmentStatusInput};
use clinic_integrity::*;
use serde::Deserialize;
use serde_json::json;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/appointments", get(list_appointments).post(book_appointment))
        .route("/api/appointments/:id", get(get_appointment))
        .route("/api/appointments/:id/status", put(update_status))
}

/// Providers see their own schedule unless they ask for another one
async fn list_appointments(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Query(mut filter): Query<AppointmentFilter>,
) -> ApiResult<impl IntoResponse> {
    if filter.provider_id.is_none() && filter.patient_id.is_none() && !user.is_admin {
        filter.provider_id = user.provider_id;
    }
    Ok(ok(state
        .blocking(move |s| clinic::list_appointments(s.store(), &filter))
        .await?))
}

#[derive(Debug, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient_id: i64,
    /// Defaults to the signed-in provider
    pub provider_id: Option<i64>,
    pub date: NaiveDate,
    pub time: String,
    pub visit_type: VisitType,
    pub price: Option<f64>,
    pub status: Option<AppointmentStatus>,
    pub notes: Option<String>,
}

async fn book_appointment(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<BookAppointmentRequest>,
) -> ApiResult<impl IntoResponse> {
    let provider_id = match request.provider_id {
        Some(id) => id,
        None => user.provider_id()?,
    };
    let input = CreateAppointmentInput {
        patient_id: request.patient_id,
        slot: BookingDetails {
            provider_id,
            date: request.date,
            time: request.time,
            visit_type: request.visit_type,
            price: request.price,
            status: request.status,
            source: BookingSource::Web,
            notes: request.notes,
        },
    };
    let appointment = state
        .blocking(move |s| clinic::create_appointment(s.store(), input))
        .await?;
    Ok(created(appointment))
}

async fn get_appointment(State(state): State<SharedState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.blocking(move |s| clinic::get_appointment(s.store(), id)).await?))
}

async fn update_status(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateAppointmentStatusInput>,
) -> ApiResult<Response> {
    let appointment = state
        .blocking(move |s| clinic::update_appointment_status(s.store(), id, input))
        .await?;
    let interaction = NewInteraction::now(
        appointment.patient_id,
        InteractionKind::Appointment,
        format!("Appointment {} marked {}", appointment.id, appointment.status),
    )
    .with_metadata(json!({
        "appointment_id": appointment.id,
        "status": appointment.status,
        "payment_status": appointment.payment_status,
    }));
    Ok(tracked(ok(appointment), interaction))
}
