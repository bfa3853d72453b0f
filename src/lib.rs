//! Weighted request routing and capacity scaling for a pool of model endpoints.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pool;
pub mod resilience;
pub mod routing;
pub mod scaling;
pub mod store;

pub use config::RouterConfig;
pub use error::{RouterError, RouterResult};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
