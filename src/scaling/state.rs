//! Per-dimension scaling record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::ScalingConfig;

/// Reconciliation status of a dimension. No state is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalingStatus {
    Pending,
    InProgress,
    Successful,
    Failed,
}

impl ScalingStatus {
    /// Pending and InProgress mean a scaling activity is underway.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "InProgress",
            Self::Successful => "Successful",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for ScalingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scaling record for one dimension, keyed by `dimension_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalingState {
    #[serde(rename = "scalableTargetDimensionId")]
    pub dimension_id: String,
    pub resource_name: String,
    pub variant_name: String,
    pub dimension_name: String,
    pub desired_capacity: u64,
    pub actual_capacity: u64,
    pub scaling_status: ScalingStatus,
    /// Milliseconds since the epoch of the last write.
    pub last_modified: u64,
    #[serde(default)]
    pub failure_reason: String,
    /// Bumped by the state store on every successful write.
    #[serde(default)]
    pub version: u64,
}

impl ScalingState {
    /// Record created on first access to a dimension: nothing desired,
    /// nothing provisioned, converged.
    pub fn initial(dimension_id: impl Into<String>, settings: &ScalingConfig, now_ms: u64) -> Self {
        Self {
            dimension_id: dimension_id.into(),
            resource_name: settings.resource_name.clone(),
            variant_name: settings.variant_name.clone(),
            dimension_name: settings.dimension_name.clone(),
            desired_capacity: 0,
            actual_capacity: 0,
            scaling_status: ScalingStatus::Successful,
            last_modified: now_ms,
            failure_reason: String::new(),
            version: 0,
        }
    }

    /// Set the status. Leaving `Failed` clears the failure reason.
    pub fn set_status(&mut self, status: ScalingStatus) {
        self.scaling_status = status;
        if status != ScalingStatus::Failed {
            self.failure_reason.clear();
        }
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.scaling_status = ScalingStatus::Failed;
        self.failure_reason = reason.into();
    }

    pub fn is_converged(&self) -> bool {
        self.desired_capacity == self.actual_capacity
    }

    /// True when the last write is strictly older than `timeout_ms`.
    pub fn is_stale(&self, now_ms: u64, timeout_ms: u64) -> bool {
        self.last_modified < now_ms.saturating_sub(timeout_ms)
    }
}

/// Operator update: any subset of fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityPatch {
    pub actual_capacity: Option<u64>,
    pub desired_capacity: Option<u64>,
    pub scaling_status: Option<ScalingStatus>,
}

/// Human-readable summary of what changed between two records.
pub fn describe_changes(before: &ScalingState, after: &ScalingState) -> String {
    let mut changes = Vec::new();
    if before.desired_capacity != after.desired_capacity {
        changes.push(format!(
            "desiredCapacity: {} -> {}",
            before.desired_capacity, after.desired_capacity
        ));
    }
    if before.actual_capacity != after.actual_capacity {
        changes.push(format!(
            "actualCapacity: {} -> {}",
            before.actual_capacity, after.actual_capacity
        ));
    }
    if before.scaling_status != after.scaling_status {
        changes.push(format!(
            "scalingStatus: {} -> {}",
            before.scaling_status, after.scaling_status
        ));
    }
    if changes.is_empty() {
        return format!(
            "actualCapacity: {} = desiredCapacity: {}",
            after.actual_capacity, after.desired_capacity
        );
    }
    changes.join("  ")
}

/// Wall clock in milliseconds since the epoch.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
