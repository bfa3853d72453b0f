//! Weighted selection over a rotating counter.
//!
//! The integer range `[1, total_weight]` is split into contiguous buckets in
//! list order, one per backend, each as wide as the backend's weight. A
//! counter value `c` lands at position `(c mod total) + 1`. Every full cycle of
//! `total` consecutive counter values hits each backend exactly `weight` times.

use crate::error::{RouterError, RouterResult};
use crate::pool::backend::BackendPool;

/// Outcome of one weighted selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Position of the chosen backend in the pool.
    pub index: usize,
    pub backend_id: String,
    /// Counter value the next selection should observe (`counter + 1`).
    pub request_count: u64,
}

/// Select a backend for counter value `counter`.
pub fn select<S: AsRef<str>>(servers: &[S], weights: &[u64], counter: u64) -> RouterResult<Selection> {
    if servers.is_empty() || servers.len() != weights.len() {
        return Err(RouterError::InvalidConfiguration(format!(
            "{} servers but {} weights",
            servers.len(),
            weights.len()
        )));
    }

    let total = total_weight(weights)?;
    let position = counter % total + 1;
    let mut cumulative = 0u64;
    for (index, &weight) in weights.iter().enumerate() {
        cumulative += weight;
        if position <= cumulative {
            return Ok(Selection {
                index,
                backend_id: servers[index].as_ref().to_string(),
                request_count: counter.saturating_add(1),
            });
        }
    }

    // Unreachable while position <= total.
    tracing::warn!(position, total, "Weighted walk fell through, using first backend");
    Ok(Selection {
        index: 0,
        backend_id: servers[0].as_ref().to_string(),
        request_count: counter.saturating_add(1),
    })
}

/// Sum of `weights`, rejecting pools that cannot route any request.
pub fn total_weight(weights: &[u64]) -> RouterResult<u64> {
    let total = weights
        .iter()
        .try_fold(0u64, |acc, &w| acc.checked_add(w))
        .ok_or_else(|| RouterError::InvalidConfiguration("total weight overflows".into()))?;
    if total == 0 {
        return Err(RouterError::InvalidConfiguration(
            "total weight must be greater than 0".into(),
        ));
    }
    Ok(total)
}

impl BackendPool {
    /// Select a backend from this pool for counter value `counter`.
    pub fn select(&self, counter: u64) -> RouterResult<Selection> {
        select(&self.ids(), &self.weights(), counter)
    }

    /// Total weight, or the error [`BackendPool::select`] would return.
    pub fn total_weight(&self) -> RouterResult<u64> {
        total_weight(&self.weights())
    }
}
