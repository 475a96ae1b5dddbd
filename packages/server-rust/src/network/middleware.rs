//! HTTP middleware stack.
//!
//! Layers are listed outermost first: the first layer sees the request
//! first and the response last.

use axum::body::Body;
use axum::http::header::HeaderName;
use axum::http::{Method, Request, StatusCode};
use tower::layer::util::{Identity, Stack};
use tower::ServiceBuilder;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

use super::config::NetworkConfig;

/// Header carrying the per-request id assigned at the edge.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

type MakeSpanFn = fn(&Request<Body>) -> Span;

type HttpLayers = Stack<
    PropagateRequestIdLayer,
    Stack<
        TimeoutLayer,
        Stack<
            CorsLayer,
            Stack<
                TraceLayer<SharedClassifier<ServerErrorsAsFailures>, MakeSpanFn>,
                Stack<SetRequestIdLayer<MakeRequestUuid>, Identity>,
            >,
        >,
    >,
>;

/// Builds the transport-level middleware applied to every route.
///
/// 1. `SetRequestId` assigns a UUID `x-request-id` when the caller sent none
/// 2. `Trace` opens an `http_request` span carrying that id
/// 3. `CORS` per the configured origins
/// 4. `Timeout` answers 408 when a handler exceeds the request timeout
/// 5. `PropagateRequestId` echoes the id on the response
#[must_use]
pub fn build_http_layers(config: &NetworkConfig) -> HttpLayers {
    let x_request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span as MakeSpanFn))
        .layer(build_cors_layer(&config.cors_origins))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(PropagateRequestIdLayer::new(x_request_id))
        .into_inner()
}

fn make_request_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    tracing::info_span!(
        "http_request",
        method = %request.method(),
        uri = %request.uri(),
        http_request_id = request_id,
    )
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}
