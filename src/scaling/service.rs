//! Scaling orchestration over the injected collaborators.
//!
//! Each operation is one read-modify-write of a dimension record:
//! read state and pool, run a pure machine step, compare-and-swap the state,
//! then persist the pool and issue scale requests. A version conflict re-runs
//! the whole step against fresh data, so requests are only ever issued by
//! the writer that won.

use std::sync::Arc;

use crate::config::{RouterConfig, ScalingConfig, SharedConfig};
use crate::error::{RouterError, RouterResult};
use crate::observability::metrics;
use crate::pool::{BackendPool, PoolRecord};
use crate::resilience::Backoff;
use crate::scaling::event::StatusEvent;
use crate::scaling::machine::{self, Transition};
use crate::scaling::redistribute::ScaleRequest;
use crate::scaling::state::{describe_changes, epoch_millis, CapacityPatch, ScalingState};
use crate::store::{load_pool, ConfigStore, ScalingControl, StateStore};

/// Outcome of one scaling operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    /// The record as stored after the operation.
    pub state: ScalingState,
    /// Whether the operation wrote a new version.
    pub changed: bool,
    pub requests: Vec<ScaleRequest>,
}

#[derive(Clone)]
pub struct ScalingService {
    states: Arc<dyn StateStore>,
    configs: Arc<dyn ConfigStore>,
    control: Arc<dyn ScalingControl>,
    config: SharedConfig,
}

impl ScalingService {
    pub fn new(
        states: Arc<dyn StateStore>,
        configs: Arc<dyn ConfigStore>,
        control: Arc<dyn ScalingControl>,
        config: SharedConfig,
    ) -> Self {
        Self {
            states,
            configs,
            control,
            config,
        }
    }

    /// Read a dimension, reconciling it first (staleness and drift).
    pub async fn get(&self, dimension_id: &str) -> RouterResult<ScalingState> {
        self.reconcile_dimension(dimension_id).await.map(|applied| applied.state)
    }

    pub async fn reconcile_dimension(&self, dimension_id: &str) -> RouterResult<Applied> {
        self.update(dimension_id, |state, pool, now, scaling| {
            machine::reconcile(state, pool, now, scaling.staleness_timeout_ms())
        })
        .await
    }

    /// Apply an operator update to a dimension.
    pub async fn patch(&self, dimension_id: &str, patch: &CapacityPatch) -> RouterResult<Applied> {
        self.update(dimension_id, |state, pool, now, _| {
            machine::declare(state, pool, patch, now).map(Some)
        })
        .await
    }

    /// Apply an endpoint status event to every dimension of its resource.
    ///
    /// Returns the ids of the dimensions the event was applied to; empty when
    /// no stored dimension tracks the resource.
    pub async fn handle_event(&self, event: &StatusEvent) -> RouterResult<Vec<String>> {
        let targets: Vec<String> = self
            .states
            .list_states()
            .await?
            .into_iter()
            .filter(|state| event.concerns(&state.resource_name))
            .map(|state| state.dimension_id)
            .collect();

        if targets.is_empty() {
            tracing::info!(
                resource = ?event.resource_name,
                endpoint = ?event.endpoint_name,
                status = %event.status,
                "No dimension tracks this resource, ignoring event"
            );
            return Ok(targets);
        }

        for dimension_id in &targets {
            self.update(dimension_id, |state, pool, now, _| {
                machine::on_status_event(state, pool, event, now)
            })
            .await?;
        }
        Ok(targets)
    }

    /// Reconcile every stored dimension. Failures are logged per dimension
    /// and do not stop the sweep; returns how many records changed.
    pub async fn reconcile_all(&self) -> RouterResult<usize> {
        let states = self.states.list_states().await?;
        let mut changed = 0;
        for state in states {
            match self.reconcile_dimension(&state.dimension_id).await {
                Ok(applied) if applied.changed => changed += 1,
                Ok(_) => {}
                Err(e) => tracing::error!(
                    dimension_id = %state.dimension_id,
                    error = %e,
                    "Reconciliation failed"
                ),
            }
        }
        Ok(changed)
    }

    /// Optimistic read-modify-write of one dimension.
    async fn update<F>(&self, dimension_id: &str, step: F) -> RouterResult<Applied>
    where
        F: Fn(ScalingState, &BackendPool, u64, &ScalingConfig) -> RouterResult<Option<Transition>>,
    {
        let mut attempt: u32 = 0;
        loop {
            let config = self.config.load_full();
            match self.try_update(dimension_id, &step, &config).await {
                Err(RouterError::VersionConflict { .. })
                    if attempt < config.scaling.max_conflict_retries =>
                {
                    attempt += 1;
                    metrics::record_conflict_retry();
                    let delay = Backoff::from_config(&config.scaling).delay(attempt);
                    tracing::warn!(
                        dimension_id = %dimension_id,
                        attempt,
                        delay = ?delay,
                        "Scaling state changed concurrently, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    async fn try_update<F>(
        &self,
        dimension_id: &str,
        step: &F,
        config: &RouterConfig,
    ) -> RouterResult<Applied>
    where
        F: Fn(ScalingState, &BackendPool, u64, &ScalingConfig) -> RouterResult<Option<Transition>>,
    {
        let now = epoch_millis();
        let stored = self.states.get_state(dimension_id).await?;
        let expected_version = stored.as_ref().map(|s| s.version);
        let before = match stored {
            Some(state) => state,
            None => {
                tracing::info!(dimension_id = %dimension_id, "Creating scaling record");
                ScalingState::initial(dimension_id, &config.scaling, now)
            }
        };

        let pool = load_pool(self.configs.as_ref(), &config.store, &config.pool).await?;

        let Some(transition) = step(before.clone(), &pool, now, &config.scaling)? else {
            if expected_version.is_some() {
                return Ok(Applied {
                    state: before,
                    changed: false,
                    requests: Vec::new(),
                });
            }
            let state = self.states.put_state(before, None).await?;
            return Ok(Applied {
                state,
                changed: true,
                requests: Vec::new(),
            });
        };

        let Transition {
            state: next,
            pool: next_pool,
            requests,
        } = transition;

        let state = self.states.put_state(next, expected_version).await?;
        metrics::record_transition(before.scaling_status, state.scaling_status);
        tracing::info!(
            dimension_id = %dimension_id,
            version = state.version,
            changes = %describe_changes(&before, &state),
            "Scaling state updated"
        );

        if let Some(next_pool) = next_pool {
            self.configs.put_pool(PoolRecord::from(&next_pool)).await?;
            metrics::record_pool_weights(&next_pool);
            tracing::info!(
                pool = %next_pool.id,
                weights = ?next_pool.weights(),
                instance_counts = ?next_pool.instance_counts(),
                "Pool updated"
            );
        }

        for request in &requests {
            let result = self.control.scale(request).await;
            metrics::record_control_request(&request.backend_id, result.is_ok());
            if let Err(e) = result {
                tracing::error!(
                    dimension_id = %dimension_id,
                    endpoint = %request.endpoint_name,
                    desired_instance_count = request.desired_instance_count,
                    error = %e,
                    "Scale request failed"
                );
                return Err(e);
            }
        }

        Ok(Applied {
            state,
            changed: true,
            requests,
        })
    }
}
