//! HTTP server lifecycle.
//!
//! `new()` allocates shared state, `start()` binds the listener, and
//! `serve()` accepts connections until the shutdown future resolves. The
//! split lets the caller learn the bound port before serving.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{
    health_handler, liveness_handler, readiness_handler, status_handler, submit_get_handler,
    submit_post_handler, AppState,
};
use super::middleware::build_http_layers;
use super::shutdown::ShutdownController;
use crate::service::{Producer, StatusQuery};

/// Owns the HTTP listener and router for the submission and status API.
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    shutdown: Arc<ShutdownController>,
    producer: Arc<Producer>,
    status: Arc<StatusQuery>,
}

impl NetworkModule {
    #[must_use]
    pub fn new(config: NetworkConfig, producer: Arc<Producer>, status: Arc<StatusQuery>) -> Self {
        Self {
            config,
            listener: None,
            shutdown: Arc::new(ShutdownController::new()),
            producer,
            status,
        }
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Assembles the router with all routes and middleware.
    ///
    /// - `GET /submit/{subject_id}`, `POST /submit`: publish a request
    /// - `GET /status/{id}`: stored result or 404
    /// - `GET /health`, `/health/live`, `/health/ready`: probes
    pub fn build_router(&self) -> Router {
        let state = AppState {
            shutdown: Arc::clone(&self.shutdown),
            producer: Arc::clone(&self.producer),
            status: Arc::clone(&self.status),
            start_time: Instant::now(),
        };

        Router::new()
            .route("/submit/{subject_id}", get(submit_get_handler))
            .route("/submit", post(submit_post_handler))
            .route("/status/{id}", get(status_handler))
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .layer(build_http_layers(&self.config))
            .with_state(state)
    }

    /// Binds the listener and returns the actual port (useful with port 0).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let port = listener.local_addr()?.port();

        info!("HTTP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves until `shutdown` resolves, then drains in-flight submissions.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or the server hits
    /// a fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .context("start() must be called before serve()")?;
        let router = self.build_router();
        let shutdown_ctrl = Arc::clone(&self.shutdown);

        shutdown_ctrl.set_ready();
        info!("Serving HTTP");

        let signal = {
            let shutdown_ctrl = Arc::clone(&shutdown_ctrl);
            async move {
                tokio::select! {
                    () = shutdown => {}
                    () = shutdown_ctrl.wait_for_shutdown() => {}
                }
                shutdown_ctrl.trigger_shutdown();
            }
        };

        axum::serve(listener, router)
            .with_graceful_shutdown(signal)
            .await?;

        if shutdown_ctrl.wait_for_drain(self.config.drain_timeout).await {
            info!("HTTP server drained");
        } else {
            warn!(
                in_flight = shutdown_ctrl.in_flight_count(),
                "Drain timeout expired with requests still in flight"
            );
        }
        Ok(())
    }
}
