//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Routing, scaling and HTTP layers produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → stdout (pretty for development, JSON for aggregation)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields rather than formatted strings for ids and counts
//! - Request ID flows from the HTTP layer into every handler span
//! - Metric updates are cheap enough for the routing hot path

pub mod logging;
pub mod metrics;
