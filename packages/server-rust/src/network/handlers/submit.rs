//! Submission endpoints.
//!
//! `GET /submit/{subject_id}` and `POST /submit` both publish a request and
//! answer with its id straight away; processing happens later on the queue.
//! An incoming W3C `traceparent` header, if valid, becomes the parent of the
//! published message's correlation context.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use relay_core::CorrelationContext;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApiError, AppState};

/// Inbound trace propagation header.
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// Body of `POST /submit`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    #[serde(alias = "profileId")]
    pub subject_id: String,
}

/// Body returned by both submission endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub request_id: Uuid,
}

fn incoming_context(headers: &HeaderMap) -> Option<CorrelationContext> {
    headers
        .get(TRACEPARENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(CorrelationContext::parse)
}

async fn submit(
    state: &AppState,
    headers: &HeaderMap,
    subject_id: &str,
) -> Result<Json<SubmitResponse>, ApiError> {
    if !state.shutdown.health_state().accepts_requests() {
        return Err(ApiError::ShuttingDown);
    }
    let _guard = state.shutdown.in_flight_guard();

    let parent = incoming_context(headers);
    let request_id = state
        .producer
        .submit_with_context(subject_id, parent.as_ref())
        .await?;

    Ok(Json(SubmitResponse { request_id }))
}

/// `GET /submit/{subject_id}`
pub async fn submit_get_handler(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<SubmitResponse>, ApiError> {
    submit(&state, &headers, &subject_id).await
}

/// `POST /submit` with a JSON `{"subjectId": ...}` body.
pub async fn submit_post_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    submit(&state, &headers, &body.subject_id).await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::{get, post};
    use axum::Router;
    use relay_core::decode_request;
    use tower::ServiceExt;

    use super::*;
    use crate::network::handlers::test_support::{test_app, TestApp};
    use crate::traits::QueueTransport;

    fn router(app: &TestApp) -> Router {
        Router::new()
            .route("/submit/{subject_id}", get(submit_get_handler))
            .route("/submit", post(submit_post_handler))
            .with_state(app.state.clone())
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn get_submit_returns_request_id_and_publishes() {
        let app = test_app();
        let response = router(&app)
            .oneshot(Request::get("/submit/alice").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let request_id: Uuid = json["requestId"].as_str().unwrap().parse().unwrap();

        let delivery = app.queue.receive(Duration::ZERO).await.unwrap().unwrap();
        let message = decode_request(&delivery.envelope.body).unwrap();
        assert_eq!(message.id, request_id);
        assert_eq!(message.subject_id, "alice");
    }

    #[tokio::test]
    async fn post_submit_accepts_json_body() {
        let app = test_app();
        let response = router(&app)
            .oneshot(
                Request::post("/submit")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"subjectId":"bob"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(app.queue.ready_count(), 1);
    }

    #[tokio::test]
    async fn blank_subject_is_bad_request() {
        let app = test_app();
        let response = router(&app)
            .oneshot(
                Request::post("/submit")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"subjectId":"  "}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(app.queue.ready_count(), 0);
    }

    #[tokio::test]
    async fn traceparent_header_continues_trace() {
        let app = test_app();
        let parent = CorrelationContext::new_root();
        let response = router(&app)
            .oneshot(
                Request::get("/submit/alice")
                    .header(TRACEPARENT_HEADER, parent.to_header())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let delivery = app.queue.receive(Duration::ZERO).await.unwrap().unwrap();
        let carried = delivery.envelope.correlation().unwrap();
        assert_eq!(carried.trace_id, parent.trace_id);
    }

    #[tokio::test]
    async fn closed_queue_is_service_unavailable() {
        let app = test_app();
        app.queue.close();

        let response = router(&app)
            .oneshot(Request::get("/submit/alice").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().starts_with("publish failed"));
    }

    #[tokio::test]
    async fn draining_server_refuses_submissions() {
        let app = test_app();
        app.state.shutdown.trigger_shutdown();

        let response = router(&app)
            .oneshot(Request::get("/submit/alice").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(app.queue.ready_count(), 0);
    }
}
