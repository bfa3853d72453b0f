//! Error taxonomy shared by routing and scaling.

use thiserror::Error;

use crate::scaling::state::ScalingStatus;

/// Errors surfaced by routing decisions and scaling operations.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Stored pool configuration cannot be used (mismatched lists, zero total weight).
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A store or control-plane call failed.
    #[error("{collaborator} unavailable: {detail}")]
    CollaboratorUnavailable {
        collaborator: &'static str,
        detail: String,
    },

    /// The scaling record changed underneath a read-modify-write.
    #[error("Scaling state for {dimension_id} was modified concurrently")]
    VersionConflict { dimension_id: String },

    /// A new desired capacity was declared while scaling is still running.
    #[error("Dimension {dimension_id} is {status}; desired capacity cannot change until it settles")]
    Busy {
        dimension_id: String,
        status: ScalingStatus,
    },

    /// A status event referenced a backend that is not in the pool.
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    /// A status event was missing data required for its status.
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// A client request failed validation.
    #[error("{0}")]
    InvalidRequest(String),
}

impl RouterError {
    /// Shorthand for a failed store call.
    pub fn store(detail: impl Into<String>) -> Self {
        Self::CollaboratorUnavailable {
            collaborator: "state store",
            detail: detail.into(),
        }
    }

    /// Shorthand for a failed control-plane call.
    pub fn control(detail: impl Into<String>) -> Self {
        Self::CollaboratorUnavailable {
            collaborator: "scaling control plane",
            detail: detail.into(),
        }
    }

    /// Stable name of the variant, reported to HTTP clients.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration(_) => "InvalidConfiguration",
            Self::CollaboratorUnavailable { .. } => "CollaboratorUnavailable",
            Self::VersionConflict { .. } => "VersionConflict",
            Self::Busy { .. } => "Busy",
            Self::UnknownBackend(_) => "UnknownBackend",
            Self::InvalidEvent(_) => "InvalidEvent",
            Self::InvalidRequest(_) => "InvalidRequest",
        }
    }
}

/// Result type for routing and scaling operations.
pub type RouterResult<T> = Result<T, RouterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RouterError::InvalidConfiguration("total weight is 0".into());
        assert_eq!(err.to_string(), "Invalid configuration: total weight is 0");

        let err = RouterError::store("connection reset");
        assert_eq!(err.to_string(), "state store unavailable: connection reset");
        assert_eq!(err.kind(), "CollaboratorUnavailable");

        let err = RouterError::Busy {
            dimension_id: "dim-1".into(),
            status: ScalingStatus::InProgress,
        };
        assert!(err.to_string().contains("InProgress"));
    }
}
