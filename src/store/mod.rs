//! External collaborators: durable key-value state and the scaling control plane.
//!
//! # Data Flow
//! ```text
//! Routing:  CounterStore::fetch_and_increment → ConfigStore::get_pool
//! Scaling:  StateStore::get_state → machine → StateStore::put_state (CAS)
//!             → ConfigStore::put_pool → ScalingControl::scale
//! ```
//!
//! # Design Decisions
//! - Every collaborator is a trait so the core runs against in-memory fakes
//! - The counter increment must be linearizable for routing to stay fair
//! - State writes are compare-and-swap on `version`

use async_trait::async_trait;

use crate::config::{PoolConfig, StoreConfig};
use crate::error::RouterResult;
use crate::pool::{BackendPool, PoolRecord};
use crate::scaling::redistribute::ScaleRequest;
use crate::scaling::state::ScalingState;

pub mod control;
pub mod memory;

pub use control::{HttpScalingControl, RecordingControl};
pub use memory::MemoryStore;

/// Durable request counter.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Return the current value of `counter_id`, then increment it by one.
    /// A counter that was never used starts at 0.
    async fn fetch_and_increment(&self, counter_id: &str) -> RouterResult<u64>;
}

/// Pool record storage.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_pool(&self, pool_id: &str) -> RouterResult<Option<PoolRecord>>;
    async fn put_pool(&self, record: PoolRecord) -> RouterResult<()>;
}

/// Scaling record storage.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get_state(&self, dimension_id: &str) -> RouterResult<Option<ScalingState>>;

    /// Write `state` if the stored version still equals `expected_version`
    /// (`None`: no record may exist yet). Returns the record as stored, with
    /// its version bumped. Fails with `VersionConflict` otherwise.
    async fn put_state(
        &self,
        state: ScalingState,
        expected_version: Option<u64>,
    ) -> RouterResult<ScalingState>;

    async fn list_states(&self) -> RouterResult<Vec<ScalingState>>;
}

/// Managed "scale this endpoint variant to N instances" API.
#[async_trait]
pub trait ScalingControl: Send + Sync {
    async fn scale(&self, request: &ScaleRequest) -> RouterResult<()>;
}

/// Load the pool, writing the bootstrap pool first if none is stored.
pub async fn load_pool(
    configs: &dyn ConfigStore,
    store: &StoreConfig,
    bootstrap: &PoolConfig,
) -> RouterResult<BackendPool> {
    if let Some(record) = configs.get_pool(&store.config_id).await? {
        return BackendPool::try_from(record);
    }

    let pool = BackendPool::bootstrap(&store.config_id, &bootstrap.servers, &bootstrap.weights);
    configs.put_pool(PoolRecord::from(&pool)).await?;
    tracing::info!(
        pool = %pool.id,
        servers = ?pool.ids(),
        weights = ?pool.weights(),
        "Stored bootstrap pool configuration"
    );
    Ok(pool)
}
