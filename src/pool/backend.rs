//! Backend pool data model.
//!
//! # Responsibilities
//! - Represent the ordered list of backend variants behind one logical endpoint
//! - Track configured weight and live instance count per backend
//! - Convert to and from the positionally aligned storage record

use serde::{Deserialize, Serialize};

use crate::error::{RouterError, RouterResult};

/// A single backend variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backend {
    /// Backend identifier, appended to the resource name to form the endpoint name.
    pub id: String,
    /// Relative traffic share.
    pub weight: u64,
    /// Instances currently provisioned for this backend.
    pub current_instance_count: u64,
}

impl Backend {
    pub fn new(id: impl Into<String>, weight: u64, current_instance_count: u64) -> Self {
        Self {
            id: id.into(),
            weight,
            current_instance_count,
        }
    }
}

/// Ordered pool of backends. Order is significant for both routing buckets
/// and scale-down draining.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendPool {
    /// Store key of the pool record.
    pub id: String,
    pub backends: Vec<Backend>,
}

impl BackendPool {
    pub fn new(id: impl Into<String>, backends: Vec<Backend>) -> Self {
        Self {
            id: id.into(),
            backends,
        }
    }

    /// Pool written on first access when no record exists.
    ///
    /// Instance counts start equal to the weights.
    pub fn bootstrap(id: impl Into<String>, servers: &[String], weights: &[u64]) -> Self {
        let backends = servers
            .iter()
            .zip(weights)
            .map(|(server, &weight)| Backend::new(server.clone(), weight, weight))
            .collect();
        Self::new(id, backends)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.id.as_str()).collect()
    }

    pub fn weights(&self) -> Vec<u64> {
        self.backends.iter().map(|b| b.weight).collect()
    }

    pub fn instance_counts(&self) -> Vec<u64> {
        self.backends.iter().map(|b| b.current_instance_count).collect()
    }

    /// Sum of live instance counts across the pool, `None` on overflow.
    pub fn total_instances(&self) -> Option<u64> {
        self.backends
            .iter()
            .try_fold(0u64, |acc, b| acc.checked_add(b.current_instance_count))
    }

    /// Whether any backend has a live instance.
    pub fn has_instances(&self) -> bool {
        self.backends.iter().any(|b| b.current_instance_count > 0)
    }

    pub fn position(&self, backend_id: &str) -> Option<usize> {
        self.backends.iter().position(|b| b.id == backend_id)
    }

    /// Index of the designated primary: the backend whose weight is exactly 1.
    pub fn primary(&self) -> Option<usize> {
        self.backends.iter().position(|b| b.weight == 1)
    }
}

/// Storage form of a pool: three positionally aligned arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRecord {
    pub id: String,
    #[serde(default)]
    pub servers: Vec<String>,
    #[serde(default)]
    pub weights: Vec<u64>,
    #[serde(default)]
    pub current_instance_count: Vec<u64>,
}

impl From<&BackendPool> for PoolRecord {
    fn from(pool: &BackendPool) -> Self {
        Self {
            id: pool.id.clone(),
            servers: pool.backends.iter().map(|b| b.id.clone()).collect(),
            weights: pool.weights(),
            current_instance_count: pool.instance_counts(),
        }
    }
}

impl TryFrom<PoolRecord> for BackendPool {
    type Error = RouterError;

    /// Missing weight or count arrays are read as all zeros; arrays that are
    /// present must line up with `servers`.
    fn try_from(record: PoolRecord) -> RouterResult<Self> {
        if record.servers.is_empty() {
            return Err(RouterError::InvalidConfiguration(format!(
                "pool {} has no servers",
                record.id
            )));
        }

        let len = record.servers.len();
        let weights = aligned(record.weights, len, "weights", &record.id)?;
        let counts = aligned(
            record.current_instance_count,
            len,
            "current_instance_count",
            &record.id,
        )?;

        let backends = record
            .servers
            .into_iter()
            .zip(weights)
            .zip(counts)
            .map(|((id, weight), count)| Backend::new(id, weight, count))
            .collect();

        Ok(Self::new(record.id, backends))
    }
}

fn aligned(values: Vec<u64>, len: usize, field: &str, pool_id: &str) -> RouterResult<Vec<u64>> {
    if values.is_empty() {
        return Ok(vec![0; len]);
    }
    if values.len() != len {
        return Err(RouterError::InvalidConfiguration(format!(
            "pool {}: {} servers but {} {}",
            pool_id,
            len,
            values.len(),
            field
        )));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(servers: &[&str], weights: Vec<u64>, counts: Vec<u64>) -> PoolRecord {
        PoolRecord {
            id: "server_config".into(),
            servers: servers.iter().map(|s| s.to_string()).collect(),
            weights,
            current_instance_count: counts,
        }
    }

    #[test]
    fn test_bootstrap_counts_match_weights() {
        let servers = vec!["server1".to_string(), "server2".into(), "server3".into()];
        let pool = BackendPool::bootstrap("server_config", &servers, &[5, 3, 2]);
        assert_eq!(pool.weights(), vec![5, 3, 2]);
        assert_eq!(pool.instance_counts(), vec![5, 3, 2]);
        assert_eq!(pool.total_instances(), Some(10));
        assert!(pool.has_instances());
    }

    #[test]
    fn test_total_instances_overflow() {
        let pool = BackendPool::new(
            "p",
            vec![Backend::new("a", 1, u64::MAX), Backend::new("b", 1, 2)],
        );
        assert_eq!(pool.total_instances(), None);

        let idle = BackendPool::new("p", vec![Backend::new("a", 1, 0)]);
        assert_eq!(idle.total_instances(), Some(0));
        assert!(!idle.has_instances());
    }

    #[test]
    fn test_record_missing_arrays_default_to_zero() {
        let pool = BackendPool::try_from(record(&["a", "b"], vec![], vec![])).unwrap();
        assert_eq!(pool.weights(), vec![0, 0]);
        assert_eq!(pool.instance_counts(), vec![0, 0]);
    }

    #[test]
    fn test_record_length_mismatch_rejected() {
        let err = BackendPool::try_from(record(&["a", "b"], vec![1], vec![1, 1])).unwrap_err();
        assert!(matches!(err, RouterError::InvalidConfiguration(_)));

        let err = BackendPool::try_from(record(&["a"], vec![1], vec![1, 2])).unwrap_err();
        assert!(err.to_string().contains("current_instance_count"));
    }

    #[test]
    fn test_record_without_servers_rejected() {
        let err = BackendPool::try_from(record(&[], vec![], vec![])).unwrap_err();
        assert!(matches!(err, RouterError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_record_conversion_preserves_order() {
        let pool = BackendPool::try_from(record(&["x", "y", "z"], vec![1, 2, 3], vec![4, 5, 6])).unwrap();
        assert_eq!(pool.ids(), vec!["x", "y", "z"]);
        assert_eq!(PoolRecord::from(&pool), record(&["x", "y", "z"], vec![1, 2, 3], vec![4, 5, 6]));
    }

    #[test]
    fn test_primary_is_weight_one() {
        let pool = BackendPool::new(
            "p",
            vec![Backend::new("a", 5, 0), Backend::new("b", 1, 0), Backend::new("c", 1, 0)],
        );
        assert_eq!(pool.primary(), Some(1));

        let pool = BackendPool::new("p", vec![Backend::new("a", 2, 0)]);
        assert_eq!(pool.primary(), None);
    }
}
