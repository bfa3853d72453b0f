//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the axum Router with every handler
//! - Wire up middleware (request ID, tracing, body limit, timeout)
//! - Serve on a bound listener until shutdown

use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::http::handlers;
use crate::routing::WeightedRouter;
use crate::scaling::ScalingService;

/// Largest accepted request body. Every body here is a small JSON document.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<WeightedRouter>,
    pub scaling: Arc<ScalingService>,
}

impl AppState {
    pub fn new(router: WeightedRouter, scaling: ScalingService) -> Self {
        Self {
            router: Arc::new(router),
            scaling: Arc::new(scaling),
        }
    }
}

/// Build the axum application with all middleware layers.
#[allow(deprecated)]
pub fn app(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/status", get(handlers::get_status))
        .route("/endpoints/{endpoint_name}/invocations", post(handlers::invoke))
        .route("/pool", get(handlers::get_pool).put(handlers::put_pool))
        .route(
            "/scalableTargetDimensions/{dimension_id}",
            get(handlers::get_dimension).patch(handlers::patch_dimension),
        )
        .route("/events/endpoint-status", post(handlers::post_status_event))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
                .layer(TimeoutLayer::new(request_timeout)),
        )
}

/// HTTP server for routing and scaling requests.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState, request_timeout: Duration) -> Self {
        Self {
            router: app(state, request_timeout),
        }
    }

    /// Serve on `listener` until `shutdown` resolves, then drain in-flight requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
