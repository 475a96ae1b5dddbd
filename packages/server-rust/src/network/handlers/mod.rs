//! HTTP handlers and the shared state they extract.

pub mod health;
pub mod status;
pub mod submit;

pub use health::{health_handler, liveness_handler, readiness_handler};
pub use status::status_handler;
pub use submit::{submit_get_handler, submit_post_handler, SubmitRequest, SubmitResponse};

use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::ShutdownController;
use crate::service::{PipelineError, Producer, StatusQuery};

/// State carried through axum's `State` extractor. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub shutdown: Arc<ShutdownController>,
    pub producer: Arc<Producer>,
    pub status: Arc<StatusQuery>,
    /// Used for uptime reporting.
    pub start_time: Instant,
}

/// Error response for a failed submission.
#[derive(Debug)]
pub enum ApiError {
    /// The server is draining and refuses new work.
    ShuttingDown,
    Pipeline(PipelineError),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self::Pipeline(err)
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            Self::Pipeline(PipelineError::EmptySubject) => StatusCode::BAD_REQUEST,
            Self::Pipeline(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::ShuttingDown => "server is shutting down".to_string(),
            Self::Pipeline(err) => err.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
