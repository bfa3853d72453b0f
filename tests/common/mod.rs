//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use capacity_router::config::{watcher, RouterConfig};
use capacity_router::http::{AppState, HttpServer};
use capacity_router::lifecycle::Shutdown;
use capacity_router::routing::WeightedRouter;
use capacity_router::scaling::ScalingService;
use capacity_router::store::{MemoryStore, RecordingControl, ScalingControl};

/// A running router instance backed by in-memory collaborators.
pub struct TestApp {
    pub base: String,
    pub store: MemoryStore,
    pub control: Arc<RecordingControl>,
    pub client: reqwest::Client,
    pub shutdown: Shutdown,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Test configuration: resource `llm`, fast conflict retries, no background loop.
pub fn test_config() -> RouterConfig {
    let mut config = RouterConfig::default();
    config.scaling.resource_name = "llm".into();
    config.scaling.reconcile_interval_secs = 0;
    config.scaling.retry_base_delay_ms = 1;
    config.scaling.retry_max_delay_ms = 5;
    config
}

pub async fn spawn_app(config: RouterConfig) -> TestApp {
    let control = Arc::new(RecordingControl::new());
    spawn_app_with_control(config, control.clone(), control).await
}

/// Start the app with an explicit control plane; `recorder` is exposed on
/// the returned handle for assertions.
pub async fn spawn_app_with_control(
    config: RouterConfig,
    control: Arc<dyn ScalingControl>,
    recorder: Arc<RecordingControl>,
) -> TestApp {
    let store = MemoryStore::new();
    let shared = watcher::shared(config);
    let shutdown = Shutdown::new();

    let router = WeightedRouter::new(Arc::new(store.clone()), Arc::new(store.clone()), shared.clone());
    let scaling = ScalingService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        control,
        shared,
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(AppState::new(router, scaling), Duration::from_secs(5));
    let stop = shutdown.notified();
    tokio::spawn(async move {
        server.run(listener, stop).await.unwrap();
    });

    TestApp {
        base: format!("http://{}", addr),
        store,
        control: recorder,
        client: reqwest::Client::new(),
        shutdown,
    }
}

/// A mock scaling control plane that records request bodies and answers
/// with a settable status code.
#[derive(Clone, Default)]
pub struct MockControlPlane {
    pub bodies: Arc<Mutex<Vec<(String, Value)>>>,
    pub status: Arc<AtomicU16>,
}

impl MockControlPlane {
    pub fn bodies(&self) -> Vec<(String, Value)> {
        self.bodies.lock().unwrap().clone()
    }

    pub fn respond_with(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }
}

pub async fn start_control_plane() -> (SocketAddr, MockControlPlane) {
    let mock = MockControlPlane::default();
    mock.respond_with(200);

    async fn capacity(
        State(mock): State<MockControlPlane>,
        axum::extract::Path(endpoint): axum::extract::Path<String>,
        Json(body): Json<Value>,
    ) -> StatusCode {
        mock.bodies.lock().unwrap().push((endpoint, body));
        StatusCode::from_u16(mock.status.load(Ordering::SeqCst)).unwrap()
    }

    let app = Router::new()
        .route("/endpoints/{endpoint}/capacity", post(capacity))
        .with_state(mock.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, mock)
}
