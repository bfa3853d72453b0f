//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the capacity router.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RouterConfig {
    /// HTTP listener settings.
    pub listener: ListenerConfig,

    /// Keys and persistence of the state store.
    pub store: StoreConfig,

    /// Pool written on first access when none is stored.
    pub pool: PoolConfig,

    /// Scaling reconciliation settings.
    pub scaling: ScalingConfig,

    /// Where scale requests are sent.
    pub control_plane: ControlPlaneConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Total time allowed per request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// State store keys.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Key of the request counter.
    pub counter_id: String,

    /// Key of the pool record.
    pub config_id: String,

    /// JSON snapshot loaded at startup and written on shutdown.
    pub snapshot_path: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            counter_id: "request_counter".to_string(),
            config_id: "server_config".to_string(),
            snapshot_path: None,
        }
    }
}

/// Bootstrap pool.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PoolConfig {
    /// Backend ids in routing order.
    pub servers: Vec<String>,

    /// Weight per backend, aligned with `servers`.
    pub weights: Vec<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            servers: vec!["server1".into(), "server2".into(), "server3".into()],
            weights: vec![5, 3, 2],
        }
    }
}

/// Scaling reconciliation configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ScalingConfig {
    /// Pending/InProgress records older than this are failed (or settled).
    pub staleness_timeout_secs: u64,

    /// Background reconciliation period. 0 disables the loop.
    pub reconcile_interval_secs: u64,

    /// Re-read and retry this many times when a write loses a version race.
    pub max_conflict_retries: u32,

    /// Base delay for conflict retry backoff in milliseconds.
    pub retry_base_delay_ms: u64,

    /// Maximum delay for conflict retry backoff in milliseconds.
    pub retry_max_delay_ms: u64,

    /// Resource name given to newly created dimension records.
    pub resource_name: String,

    /// Production variant scaled on each backend endpoint.
    pub variant_name: String,

    /// Dimension name given to newly created dimension records.
    pub dimension_name: String,
}

impl ScalingConfig {
    pub fn staleness_timeout_ms(&self) -> u64 {
        self.staleness_timeout_secs.saturating_mul(1000)
    }
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            staleness_timeout_secs: 25 * 60,
            reconcile_interval_secs: 60,
            max_conflict_retries: 3,
            retry_base_delay_ms: 20,
            retry_max_delay_ms: 500,
            resource_name: "endpoint".to_string(),
            variant_name: "AllTraffic".to_string(),
            dimension_name: "custom-resource:ResourceType:Property".to_string(),
        }
    }
}

/// Control plane configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ControlPlaneConfig {
    /// Base URL of the scaling API. Unset: requests are only logged and recorded.
    pub url: Option<String>,

    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
