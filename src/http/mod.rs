//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum router, request id, tracing, timeout)
//!     → handlers.rs (decode, validate headers and bodies)
//!         → routing::WeightedRouter   (invocations, pool admin)
//!         → scaling::ScalingService   (dimensions, status events)
//!     → response.rs (RouterError → status code + JSON body)
//! ```

pub mod handlers;
pub mod response;
pub mod server;

pub use server::{app, AppState, HttpServer};
