use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::AppState;
use crate::service::NO_STATUS_FOUND;

/// `GET /status/{id}`: the stored result as JSON, or 404 with a plain-text
/// notice while no terminal result exists.
pub async fn status_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.status.get_status(&id).await {
        Some(record) => Json(record).into_response(),
        None => (StatusCode::NOT_FOUND, NO_STATUS_FOUND).into_response(),
    }
}
