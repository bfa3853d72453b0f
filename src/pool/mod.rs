//! Backend pool subsystem.
//!
//! # Data Flow
//! ```text
//! Routing request
//!     → store::ConfigStore (load pool record, bootstrap if absent)
//!     → backend.rs (validate aligned servers / weights / counts)
//!     → selector.rs (counter value → backend bucket)
//!
//! Convergence (scaling::machine)
//!     → rebalance.rs (weights = counts / gcd)
//!     → store::ConfigStore (persist)
//! ```
//!
//! # Design Decisions
//! - Pool values are plain data; selection and rebalancing are pure functions
//! - List order is significant: it defines routing buckets and drain order
//! - Endpoint names are `<resourceName>-<backendId>`

pub mod backend;
pub mod rebalance;
pub mod selector;

pub use backend::{Backend, BackendPool, PoolRecord};
pub use rebalance::rebalance;
pub use selector::{select, total_weight, Selection};

/// Name of the managed endpoint serving `backend_id` for `resource_name`.
pub fn endpoint_name(resource_name: &str, backend_id: &str) -> String {
    format!("{}-{}", resource_name, backend_id)
}

/// Inverse of [`endpoint_name`]: the backend id of `endpoint` if it belongs
/// to `resource_name`.
pub fn split_endpoint_name<'a>(endpoint: &'a str, resource_name: &str) -> Option<&'a str> {
    endpoint
        .strip_prefix(resource_name)
        .and_then(|rest| rest.strip_prefix('-'))
        .filter(|backend| !backend.is_empty())
}
