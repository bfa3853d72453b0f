//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Scaling read-modify-write:
//!     → StateStore::put_state fails with VersionConflict
//!     → backoff.rs (jittered exponential delay)
//!     → re-read and re-apply the transition
//! ```
//!
//! # Design Decisions
//! - Only version conflicts are retried; collaborator failures surface at once
//! - Jitter spreads concurrent writers racing on the same dimension

pub mod backoff;

pub use backoff::Backoff;
