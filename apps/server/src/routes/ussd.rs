//! Carrier USSD gateway callback.

use crate::state::SharedState;
use crate::tracking::tracked;
use ::ussd::StoreBackend;
use axum::{
    extract::{FromRequest, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Form, Json, Router,
};
use chrono::Utc;
use clinic_integrity::{InteractionKind, NewInteraction, PatientStore};
use serde_json::json;
use tracing::{error, warn};
use ussd_integrity::{UssdRequest, UssdResponse};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/ussd", post(ussd_callback))
        .route("/ussd/callback", post(ussd_callback))
}

fn plain(status: StatusCode, response: &UssdResponse) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        response.to_wire(),
    )
        .into_response()
}

/// Gateways post form bodies; JSON is accepted for testing tools
async fn parse_request(state: &SharedState, request: Request) -> Result<UssdRequest, String> {
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if is_json {
        Json::<UssdRequest>::from_request(request, state)
            .await
            .map(|Json(body)| body)
            .map_err(|e| e.body_text())
    } else {
        Form::<UssdRequest>::from_request(request, state)
            .await
            .map(|Form(body)| body)
            .map_err(|e| e.body_text())
    }
}

async fn ussd_callback(State(state): State<SharedState>, request: Request) -> Response {
    let request = match parse_request(&state, request).await {
        Ok(request) => request,
        Err(reason) => {
            warn!(%reason, "unreadable USSD request");
            return plain(StatusCode::BAD_REQUEST, &UssdResponse::End("Invalid request.".to_string()));
        }
    };

    let session_id = request.session_id.clone();
    let worker = state.clone();
    let handled = tokio::task::spawn_blocking(move || {
        let backend = StoreBackend::new(worker.store(), &worker.categorizer);
        let response = worker.ussd.handle(&backend, &request, Utc::now())?;
        let patient = if response.is_end() {
            worker.store().find_patient_by_phone(request.phone_number.trim()).ok().flatten()
        } else {
            None
        };
        Ok::<_, tujali_shared::HealthError>((response, patient, request))
    })
    .await;

    match handled {
        Ok(Ok((response, Some(patient), request))) => {
            let interaction = NewInteraction::now(patient.id, InteractionKind::Ussd, "USSD session completed")
                .with_metadata(json!({
                    "session_id": request.session_id,
                    "service_code": request.service_code,
                    "input": request.text,
                }));
            tracked(plain(StatusCode::OK, &response), interaction)
        }
        Ok(Ok((response, None, _))) => plain(StatusCode::OK, &response),
        Ok(Err(rejection)) => {
            warn!(session_id = %session_id, error = %rejection, "USSD request rejected");
            plain(StatusCode::BAD_REQUEST, &UssdResponse::End("Invalid request.".to_string()))
        }
        Err(e) => {
            error!(session_id = %session_id, error = %e, "USSD worker failed");
            plain(StatusCode::OK, &UssdResponse::failure())
        }
    }
}
