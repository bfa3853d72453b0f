//! Endpoint lifecycle notifications.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::pool::split_endpoint_name;
use crate::scaling::state::ScalingStatus;

/// Lifecycle status reported by the control plane for one backend endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EndpointStatus {
    InService,
    Failed,
    OutOfService,
    Creating,
    SystemUpdating,
    RollingBack,
    Updating,
    Unrecognized(String),
}

/// What an event does to the scaling record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventEffect {
    /// Fold the reported instance count into the pool and re-evaluate convergence.
    Converge,
    /// Move straight to the given status.
    SetStatus(ScalingStatus),
    /// Log only.
    Ignore,
}

impl EndpointStatus {
    pub fn effect(&self) -> EventEffect {
        match self {
            Self::InService => EventEffect::Converge,
            Self::Failed | Self::OutOfService => EventEffect::SetStatus(ScalingStatus::Failed),
            Self::Creating | Self::SystemUpdating | Self::RollingBack => {
                EventEffect::SetStatus(ScalingStatus::Pending)
            }
            Self::Updating => EventEffect::SetStatus(ScalingStatus::InProgress),
            Self::Unrecognized(_) => EventEffect::Ignore,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::InService => "IN_SERVICE",
            Self::Failed => "FAILED",
            Self::OutOfService => "OUT_OF_SERVICE",
            Self::Creating => "CREATING",
            Self::SystemUpdating => "SYSTEM_UPDATING",
            Self::RollingBack => "ROLLING_BACK",
            Self::Updating => "UPDATING",
            Self::Unrecognized(other) => other,
        }
    }
}

impl From<String> for EndpointStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "IN_SERVICE" => Self::InService,
            "FAILED" => Self::Failed,
            "OUT_OF_SERVICE" => Self::OutOfService,
            "CREATING" => Self::Creating,
            "SYSTEM_UPDATING" => Self::SystemUpdating,
            "ROLLING_BACK" => Self::RollingBack,
            "UPDATING" => Self::Updating,
            _ => Self::Unrecognized(value),
        }
    }
}

impl From<EndpointStatus> for String {
    fn from(status: EndpointStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One backend lifecycle change.
///
/// The backend is named either by `resource_name` + `backend_id`, or by the
/// full `endpoint_name` (`<resourceName>-<backendId>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    #[serde(default)]
    pub resource_name: Option<String>,
    #[serde(default)]
    pub backend_id: Option<String>,
    #[serde(default)]
    pub endpoint_name: Option<String>,
    pub status: EndpointStatus,
    #[serde(default)]
    pub reported_instance_count: Option<u64>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

impl StatusEvent {
    pub fn new(resource_name: &str, backend_id: &str, status: EndpointStatus) -> Self {
        Self {
            resource_name: Some(resource_name.to_string()),
            backend_id: Some(backend_id.to_string()),
            endpoint_name: None,
            status,
            reported_instance_count: None,
            failure_reason: None,
        }
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.reported_instance_count = Some(count);
        self
    }

    /// True when the event concerns an endpoint of `resource_name`.
    pub fn concerns(&self, resource_name: &str) -> bool {
        match (&self.resource_name, &self.endpoint_name) {
            (Some(resource), _) => resource == resource_name,
            (None, Some(endpoint)) => split_endpoint_name(endpoint, resource_name).is_some(),
            (None, None) => false,
        }
    }

    /// Backend id the event reports on, resolved against `resource_name`.
    pub fn backend(&self, resource_name: &str) -> Option<String> {
        if let Some(backend) = &self.backend_id {
            return Some(backend.clone());
        }
        self.endpoint_name
            .as_deref()
            .and_then(|endpoint| split_endpoint_name(endpoint, resource_name))
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        let cases = [
            ("IN_SERVICE", EventEffect::Converge),
            ("FAILED", EventEffect::SetStatus(ScalingStatus::Failed)),
            ("OUT_OF_SERVICE", EventEffect::SetStatus(ScalingStatus::Failed)),
            ("CREATING", EventEffect::SetStatus(ScalingStatus::Pending)),
            ("SYSTEM_UPDATING", EventEffect::SetStatus(ScalingStatus::Pending)),
            ("ROLLING_BACK", EventEffect::SetStatus(ScalingStatus::Pending)),
            ("UPDATING", EventEffect::SetStatus(ScalingStatus::InProgress)),
            ("DELETING", EventEffect::Ignore),
        ];
        for (raw, effect) in cases {
            let status = EndpointStatus::from(raw.to_string());
            assert_eq!(status.effect(), effect, "{raw}");
            assert_eq!(status.as_str(), raw);
        }
    }

    #[test]
    fn test_event_parsing() {
        let event: StatusEvent = serde_json::from_str(
            r#"{"resourceName":"llm","backendId":"server2","status":"IN_SERVICE","reportedInstanceCount":3}"#,
        )
        .unwrap();
        assert_eq!(event.status, EndpointStatus::InService);
        assert_eq!(event.reported_instance_count, Some(3));
        assert!(event.concerns("llm"));
        assert!(!event.concerns("other"));
        assert_eq!(event.backend("llm").as_deref(), Some("server2"));
    }

    #[test]
    fn test_event_by_endpoint_name() {
        let event: StatusEvent =
            serde_json::from_str(r#"{"endpointName":"llm-server3","status":"UPDATING"}"#).unwrap();
        assert!(event.concerns("llm"));
        assert!(!event.concerns("ll"));
        assert_eq!(event.backend("llm").as_deref(), Some("server3"));
    }

    #[test]
    fn test_unrecognized_status_roundtrips() {
        let status: EndpointStatus = serde_json::from_str(r#""DELETING""#).unwrap();
        assert_eq!(status, EndpointStatus::Unrecognized("DELETING".into()));
        assert_eq!(serde_json::to_string(&status).unwrap(), r#""DELETING""#);
    }
}
