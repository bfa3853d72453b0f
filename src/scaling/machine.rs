//! Scaling state machine.
//!
//! # States
//! ```text
//! Pending → InProgress → Successful | Failed
//! Successful | Failed → Pending   (new desired capacity, or actual drifted)
//! ```
//!
//! Every function here is pure: it takes the current record and pool by
//! value and returns the next record, the pool to persist (if any) and the
//! scale requests to issue. `None` means nothing changed and nothing is written.

use crate::error::{RouterError, RouterResult};
use crate::pool::{rebalance, BackendPool};
use crate::scaling::event::{EventEffect, StatusEvent};
use crate::scaling::redistribute::{plan, ScaleRequest};
use crate::scaling::state::{CapacityPatch, ScalingState, ScalingStatus};

/// Result of one state machine step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: ScalingState,
    /// Pool to persist, when instance counts or weights changed.
    pub pool: Option<BackendPool>,
    pub requests: Vec<ScaleRequest>,
}

impl Transition {
    fn state_only(state: ScalingState) -> Self {
        Self {
            state,
            pool: None,
            requests: Vec::new(),
        }
    }
}

/// Failure reason recorded when scaling stays active past the timeout.
pub fn stale_failure_reason(timeout_ms: u64) -> String {
    format!(
        "Scaling activity stayed in Pending or InProgress for more than {} minutes",
        timeout_ms / 60_000
    )
}

/// Apply an operator update.
///
/// Declaring a desired capacity while Pending or InProgress is rejected
/// without touching the record. A desired capacity above 0 moves the
/// dimension to Pending and redistributes immediately.
pub fn declare(
    mut state: ScalingState,
    pool: &BackendPool,
    patch: &CapacityPatch,
    now_ms: u64,
) -> RouterResult<Transition> {
    if patch.desired_capacity.is_some() && state.scaling_status.is_active() {
        return Err(RouterError::Busy {
            dimension_id: state.dimension_id,
            status: state.scaling_status,
        });
    }

    if let Some(actual) = patch.actual_capacity {
        state.actual_capacity = actual;
    }

    let mut requests = Vec::new();
    if let Some(desired) = patch.desired_capacity {
        state.desired_capacity = desired;
        if desired > 0 {
            state.set_status(ScalingStatus::Pending);
            requests = plan(&state, pool)?;
        }
    }

    if let Some(status) = patch.scaling_status {
        state.set_status(status);
    }

    state.last_modified = now_ms;
    Ok(Transition {
        state,
        pool: None,
        requests,
    })
}

/// Apply one endpoint lifecycle event. Unrecognized statuses change nothing.
pub fn on_status_event(
    mut state: ScalingState,
    pool: &BackendPool,
    event: &StatusEvent,
    now_ms: u64,
) -> RouterResult<Option<Transition>> {
    let mut transition = match event.status.effect() {
        EventEffect::Ignore => {
            tracing::info!(
                dimension_id = %state.dimension_id,
                status = %event.status,
                "Unhandled endpoint status"
            );
            return Ok(None);
        }
        EventEffect::SetStatus(ScalingStatus::Failed) => {
            let reason = event
                .failure_reason
                .clone()
                .unwrap_or_else(|| "Unknown reason".to_string());
            state.fail(reason);
            Transition::state_only(state)
        }
        EventEffect::SetStatus(status) => {
            state.set_status(status);
            Transition::state_only(state)
        }
        EventEffect::Converge => return converge(state, pool, event, now_ms).map(Some),
    };

    transition.state.last_modified = now_ms;
    Ok(Some(transition))
}

/// IN_SERVICE: record the reported count, then step toward or settle at
/// the desired capacity.
fn converge(
    mut state: ScalingState,
    pool: &BackendPool,
    event: &StatusEvent,
    now_ms: u64,
) -> RouterResult<Transition> {
    let backend_id = event.backend(&state.resource_name).ok_or_else(|| {
        RouterError::InvalidEvent(format!("{} event does not name a backend", event.status))
    })?;
    let count = event.reported_instance_count.ok_or_else(|| {
        RouterError::InvalidEvent(format!(
            "{} event for {} has no reported instance count",
            event.status, backend_id
        ))
    })?;
    let index = pool
        .position(&backend_id)
        .ok_or_else(|| RouterError::UnknownBackend(backend_id.clone()))?;

    let mut pool = pool.clone();
    pool.backends[index].current_instance_count = count;
    state.actual_capacity = pool.total_instances().ok_or_else(|| {
        RouterError::InvalidEvent(format!(
            "reported instance count {} for {} overflows the pool total",
            count, backend_id
        ))
    })?;

    let mut requests = Vec::new();
    if state.desired_capacity < state.actual_capacity && count > 0 {
        requests.push(ScaleRequest::new(&state, &backend_id, count - 1));
        state.set_status(ScalingStatus::InProgress);
    } else if state.is_converged() {
        pool = rebalance(&pool);
        state.set_status(ScalingStatus::Successful);
    } else {
        state.set_status(ScalingStatus::InProgress);
    }

    state.last_modified = now_ms;
    Ok(Transition {
        state,
        pool: Some(pool),
        requests,
    })
}

/// Poll-driven reconciliation.
///
/// A settled dimension whose actual capacity drifted from desired re-enters
/// Pending and redistributes. An active dimension whose last write is older
/// than `timeout_ms` is failed, or marked successful if it did converge.
/// Staleness is judged on the status as read.
pub fn reconcile(
    mut state: ScalingState,
    pool: &BackendPool,
    now_ms: u64,
    timeout_ms: u64,
) -> RouterResult<Option<Transition>> {
    let status = state.scaling_status;

    if !status.is_active() && !state.is_converged() {
        state.set_status(ScalingStatus::Pending);
        let requests = plan(&state, pool)?;
        state.last_modified = now_ms;
        return Ok(Some(Transition {
            state,
            pool: None,
            requests,
        }));
    }

    if status.is_active() && state.is_stale(now_ms, timeout_ms) {
        if state.is_converged() {
            state.set_status(ScalingStatus::Successful);
        } else {
            state.fail(stale_failure_reason(timeout_ms));
        }
        state.last_modified = now_ms;
        return Ok(Some(Transition::state_only(state)));
    }

    Ok(None)
}
