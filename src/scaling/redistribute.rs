//! Capacity delta allocation across the ordered backend list.
//!
//! # Scale up (`desired > actual`)
//! - Empty pool (every count 0): the whole delta goes to the primary, the
//!   backend whose weight is exactly 1.
//! - Otherwise every backend is asked for `count + delta`. The delta is applied
//!   per backend, not split, so a pool of `n` live backends can be asked for up
//!   to `n * delta` new instances.
//!
//! # Scale down (`desired < actual`)
//! Backends are drained front to back: each backend that cannot absorb the
//! remaining deficit alone is set to 0, the first one that can is reduced by
//! what is left. Idle backends are skipped. No request is ever negative.

use serde::{Deserialize, Serialize};

use crate::error::{RouterError, RouterResult};
use crate::pool::{endpoint_name, BackendPool};
use crate::scaling::state::ScalingState;

/// One "scale this endpoint variant to N instances" call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleRequest {
    pub backend_id: String,
    pub endpoint_name: String,
    pub variant_name: String,
    pub desired_instance_count: u64,
}

impl ScaleRequest {
    pub fn new(state: &ScalingState, backend_id: &str, desired_instance_count: u64) -> Self {
        Self {
            backend_id: backend_id.to_string(),
            endpoint_name: endpoint_name(&state.resource_name, backend_id),
            variant_name: state.variant_name.clone(),
            desired_instance_count,
        }
    }
}

/// Scale requests that move `pool` from `state.actual_capacity` toward
/// `state.desired_capacity`.
pub fn plan(state: &ScalingState, pool: &BackendPool) -> RouterResult<Vec<ScaleRequest>> {
    let desired = state.desired_capacity;
    let actual = state.actual_capacity;

    if desired > actual {
        scale_up(state, pool, desired - actual)
    } else if desired < actual {
        Ok(scale_down(state, pool, actual - desired))
    } else {
        Ok(Vec::new())
    }
}

fn scale_up(state: &ScalingState, pool: &BackendPool, delta: u64) -> RouterResult<Vec<ScaleRequest>> {
    if !pool.has_instances() {
        let primary = pool.primary().ok_or_else(|| {
            RouterError::InvalidConfiguration(format!(
                "pool {} has no backend with weight 1 to receive the first instances",
                pool.id
            ))
        })?;
        let backend = &pool.backends[primary];
        return Ok(vec![ScaleRequest::new(state, &backend.id, delta)]);
    }

    Ok(pool
        .backends
        .iter()
        .map(|b| ScaleRequest::new(state, &b.id, b.current_instance_count.saturating_add(delta)))
        .collect())
}

fn scale_down(state: &ScalingState, pool: &BackendPool, deficit: u64) -> Vec<ScaleRequest> {
    let mut remaining = deficit;
    let mut requests = Vec::new();

    for backend in &pool.backends {
        if remaining == 0 {
            break;
        }
        let count = backend.current_instance_count;
        if count > remaining {
            requests.push(ScaleRequest::new(state, &backend.id, count - remaining));
            break;
        }
        if count > 0 {
            requests.push(ScaleRequest::new(state, &backend.id, 0));
            remaining -= count;
        }
    }

    requests
}
