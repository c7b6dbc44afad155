//! Tujali Health HTTP service
//!
//! - `POST /ussd` answers the carrier gateway in the `CON`/`END` convention
//! - `/api/*` is the provider admin API behind a session cookie or bearer token
//! - `GET /health` for load balancers

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod state;
pub mod tracking;

pub use config::AppConfig;
pub use state::{AppState, SharedState};

use axum::{middleware, Router};
use chrono::Utc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::debug;

pub fn build_app(state: SharedState) -> Router {
    let protected = Router::new()
        .merge(auth::session_router())
        .merge(routes::api_router())
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_session));

    Router::new()
        .merge(routes::health_router())
        .merge(routes::ussd::router())
        .merge(auth::public_router())
        .merge(protected)
        .layer(middleware::from_fn_with_state(state.clone(), tracking::track_interactions))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Purge expired USSD and login sessions until the runtime shuts down
pub fn spawn_session_sweeper(state: SharedState, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let now = Utc::now();
            let ussd = state.ussd.purge_sessions(now);
            let auth = state.sessions.purge_expired(now);
            if ussd + auth > 0 {
                debug!(ussd, auth, "expired sessions purged");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::ServiceExt;
    use tujali_storage::Database;

    fn app() -> Router {
        let store = Arc::new(Database::open_in_memory().unwrap());
        build_app(Arc::new(AppState::new(store, &AppConfig::default()).unwrap()))
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, r#"{"service":"tujali-health","status":"ok"}"#);
    }

    #[tokio::test]
    async fn test_api_requires_session() {
        let response = app()
            .oneshot(Request::get("/api/patients").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_text(response).await.contains(r#""success":false"#));
    }

    #[tokio::test]
    async fn test_ussd_root_screen() {
        let request = Request::post("/ussd")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(
                "sessionId=ATUid_1&serviceCode=%2A384%2A123%23&phoneNumber=%2B254712000001&text=",
            ))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.starts_with("CON Welcome to Tujali Health"));
    }

    #[tokio::test]
    async fn test_ussd_unknown_service_code() {
        let request = Request::post("/ussd/callback")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"sessionId":"ATUid_2","serviceCode":"*999#","phoneNumber":"+254712000002","text":""}"#,
            ))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.starts_with("END "));
    }
}
