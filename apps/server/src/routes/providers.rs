use super::ok;
use crate::error::ApiResult;
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Router,
};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/providers", get(list_providers))
        .route("/api/providers/:id", get(get_provider))
}

async fn list_providers(State(state): State<SharedState>) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.blocking(|s| clinic::list_providers(s.store())).await?))
}

async fn get_provider(State(state): State<SharedState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.blocking(move |s| clinic::get_provider(s.store(), id)).await?))
}
