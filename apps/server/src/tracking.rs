//! Interaction tracking middleware.
//!
//! Handlers mark a response with the interaction it represents; the
//! middleware records it once the handler has succeeded. Recording never
//! changes the response.

use crate::state::SharedState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use clinic_integrity::NewInteraction;
use tracing::warn;

/// Response marker carrying the interaction to record
#[derive(Clone, Debug)]
pub struct TrackedInteraction(pub NewInteraction);

/// Attach an interaction to a response
pub fn tracked(response: impl IntoResponse, interaction: NewInteraction) -> Response {
    let mut response = response.into_response();
    response.extensions_mut().insert(TrackedInteraction(interaction));
    response
}

pub async fn track_interactions(State(state): State<SharedState>, request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let Some(TrackedInteraction(interaction)) = response.extensions_mut().remove::<TrackedInteraction>() else {
        return response;
    };
    if !response.status().is_success() {
        return response;
    }

    let store = state.store.clone();
    let recorded = tokio::task::spawn_blocking(move || clinic::track_interaction(store.as_ref(), interaction)).await;
    if let Err(e) = recorded {
        warn!(error = %e, "interaction tracking task failed");
    }
    response
}
