//! Metrics collection and exposition.
//!
//! # Metrics
//! - `router_decisions_total` (counter): routing decisions by backend and counter source
//! - `router_counter_fallbacks_total` (counter): decisions made without the durable counter
//! - `scaling_transitions_total` (counter): scaling status changes by from/to status
//! - `scaling_control_requests_total` (counter): control plane calls by backend and outcome
//! - `scaling_conflict_retries_total` (counter): optimistic-concurrency retries
//! - `pool_backend_weight` (gauge): current routing weight per backend
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests need no setup
//! - Labels stay low-cardinality: backend ids and status names only

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;

use crate::pool::BackendPool;
use crate::scaling::state::ScalingStatus;

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_decision(backend: &str, counter_source: &'static str) {
    metrics::counter!(
        "router_decisions_total",
        "backend" => backend.to_string(),
        "counter_source" => counter_source
    )
    .increment(1);
}

pub fn record_counter_fallback() {
    metrics::counter!("router_counter_fallbacks_total").increment(1);
}

pub fn record_transition(from: ScalingStatus, to: ScalingStatus) {
    if from == to {
        return;
    }
    metrics::counter!(
        "scaling_transitions_total",
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
}

pub fn record_control_request(backend: &str, success: bool) {
    let outcome = if success { "success" } else { "error" };
    metrics::counter!(
        "scaling_control_requests_total",
        "backend" => backend.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_conflict_retry() {
    metrics::counter!("scaling_conflict_retries_total").increment(1);
}

pub fn record_pool_weights(pool: &BackendPool) {
    for backend in &pool.backends {
        metrics::gauge!("pool_backend_weight", "backend" => backend.id.clone())
            .set(backend.weight as f64);
    }
}
