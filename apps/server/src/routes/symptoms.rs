//! Symptom surveillance: report intake, walk-ins, analyzed listings and the dashboard.

use super::{created, ok};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::SharedState;
use ::symptoms::{
    analyzed_reports, detect_outbreaks, record_walk_in, report_symptom, symptom_dashboard, ReportSymptomInput,
    WalkInInput,
};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use symptoms_integrity::{ReportChannel, Severity};

/// Longest lookback the listing accepts
pub const MAX_LOOKBACK_DAYS: i64 = 365;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/symptoms", get(list_symptoms).post(log_symptom))
        .route("/api/symptoms/dashboard", get(dashboard))
        .route("/api/symptoms/outbreaks", get(outbreaks))
        .route("/api/walk-ins", post(add_walk_in))
}

async fn add_walk_in(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<WalkInInput>,
) -> ApiResult<impl IntoResponse> {
    let provider_id = user.provider_id()?;
    let walk_in = state
        .blocking(move |s| record_walk_in(s.store(), &s.categorizer, provider_id, input, Utc::now()))
        .await?;
    Ok(created(walk_in))
}

#[derive(Debug, Default, Deserialize)]
pub struct LookbackQuery {
    pub days: Option<i64>,
}

async fn list_symptoms(
    State(state): State<SharedState>,
    Query(query): Query<LookbackQuery>,
) -> ApiResult<impl IntoResponse> {
    let since = match query.days {
        Some(days) if !(1..=MAX_LOOKBACK_DAYS).contains(&days) => {
            return Err(ApiError::bad_request("days must be between 1 and 365"));
        }
        Some(days) => Some(Utc::now() - Duration::days(days)),
        None => None,
    };
    let mut symptoms = state
        .blocking(move |s| analyzed_reports(s.store(), &s.categorizer, since))
        .await?;
    symptoms.reverse();
    Ok(ok(symptoms))
}

#[derive(Debug, Deserialize)]
pub struct LogSymptomRequest {
    pub patient_id: Option<i64>,
    pub content: String,
    pub severity: Option<Severity>,
    pub location: Option<String>,
    pub channel: Option<ReportChannel>,
}

async fn log_symptom(
    State(state): State<SharedState>,
    Json(request): Json<LogSymptomRequest>,
) -> ApiResult<impl IntoResponse> {
    let input = ReportSymptomInput {
        patient_id: request.patient_id,
        content: request.content,
        severity: request.severity,
        location: request.location,
        channel: request.channel.unwrap_or(ReportChannel::Web),
    };
    let logged = state
        .blocking(move |s| report_symptom(s.store(), &s.categorizer, input))
        .await?;
    Ok(created(logged))
}

async fn dashboard(State(state): State<SharedState>) -> ApiResult<impl IntoResponse> {
    Ok(ok(state
        .blocking(|s| symptom_dashboard(s.store(), &s.categorizer, &s.thresholds, Utc::now()))
        .await?))
}

async fn outbreaks(State(state): State<SharedState>) -> ApiResult<impl IntoResponse> {
    Ok(ok(state
        .blocking(|s| {
            let now = Utc::now();
            let since = now - Duration::days(s.thresholds.window_days);
            let symptoms = analyzed_reports(s.store(), &s.categorizer, Some(since))?;
            Ok(detect_outbreaks(&symptoms, now, &s.thresholds))
        })
        .await?))
}
