//! Health, liveness, and readiness endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use super::AppState;

/// Detailed health as JSON. Always 200; the `state` field carries the verdict.
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let health = state.shutdown.health_state();

    Json(json!({
        "state": health.as_str(),
        "in_flight": state.shutdown.in_flight_count(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Liveness probe: the process is up and answering.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe: 200 only while submissions are accepted.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if state.shutdown.health_state().accepts_requests() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::handlers::test_support::test_app;

    #[tokio::test]
    async fn health_reports_state_and_counters() {
        let app = test_app();
        let _guard = app.state.shutdown.in_flight_guard();

        let json = health_handler(State(app.state.clone())).await.0;
        assert_eq!(json["state"], "ready");
        assert_eq!(json["in_flight"], 1);
        assert!(json["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn health_reports_draining() {
        let app = test_app();
        app.state.shutdown.trigger_shutdown();

        let json = health_handler(State(app.state)).await.0;
        assert_eq!(json["state"], "draining");
    }

    #[tokio::test]
    async fn liveness_always_ok() {
        assert_eq!(liveness_handler().await, StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_follows_state() {
        let app = test_app();
        assert_eq!(
            readiness_handler(State(app.state.clone())).await,
            StatusCode::OK
        );

        app.state.shutdown.trigger_shutdown();
        assert_eq!(
            readiness_handler(State(app.state)).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
