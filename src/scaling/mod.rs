//! Capacity scaling subsystem.
//!
//! # Data Flow
//! ```text
//! PATCH desired capacity ──┐
//! status event ────────────┼→ service.rs (read state + pool)
//! GET / reconciler tick ───┘      → machine.rs (pure transition)
//!                                     → redistribute.rs (scale requests)
//!                                     → pool::rebalance (on convergence)
//!                                 → StateStore::put_state (CAS on version)
//!                                 → ConfigStore::put_pool
//!                                 → ScalingControl::scale
//! ```
//!
//! # Design Decisions
//! - Transitions are pure functions over values; all I/O lives in the service
//! - State is written before any scale request is issued
//! - Lost version races re-run the transition with backoff
//! - No status is terminal: settled dimensions re-enter Pending on drift

pub mod event;
pub mod machine;
pub mod reconciler;
pub mod redistribute;
pub mod service;
pub mod state;

pub use event::{EndpointStatus, StatusEvent};
pub use reconciler::Reconciler;
pub use redistribute::ScaleRequest;
pub use service::{Applied, ScalingService};
pub use state::{CapacityPatch, ScalingState, ScalingStatus};
