//! In-process implementation of the state collaborators.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{RouterError, RouterResult};
use crate::pool::PoolRecord;
use crate::scaling::state::ScalingState;
use crate::store::{ConfigStore, CounterStore, StateStore};

/// Serialized form of the whole store.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    counters: BTreeMap<String, u64>,
    pools: Vec<PoolRecord>,
    states: Vec<ScalingState>,
}

/// Counters, pools and scaling records held in concurrent maps.
///
/// Each map entry is updated under its shard lock, which makes the counter
/// increment and the state compare-and-swap atomic.
#[derive(Clone, Default)]
pub struct MemoryStore {
    counters: Arc<DashMap<String, u64>>,
    pools: Arc<DashMap<String, PoolRecord>>,
    states: Arc<DashMap<String, ScalingState>>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot if the file exists; later saves go to the same path.
    pub fn load_from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let store = Self {
            snapshot_path: Some(path.to_path_buf()),
            ..Self::default()
        };

        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            let snapshot: Snapshot = serde_json::from_reader(reader)?;
            for (id, value) in snapshot.counters {
                store.counters.insert(id, value);
            }
            for record in snapshot.pools {
                store.pools.insert(record.id.clone(), record);
            }
            for state in snapshot.states {
                store.states.insert(state.dimension_id.clone(), state);
            }
            tracing::info!(
                path = %path.display(),
                pools = store.pools.len(),
                dimensions = store.states.len(),
                "Loaded store snapshot"
            );
        }
        Ok(store)
    }

    /// Write a snapshot to the path given to [`MemoryStore::load_from_file`].
    pub fn save_to_file(&self) -> std::io::Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let snapshot = Snapshot {
            counters: self
                .counters
                .iter()
                .map(|r| (r.key().clone(), *r.value()))
                .collect(),
            pools: self.pools.iter().map(|r| r.value().clone()).collect(),
            states: self.states.iter().map(|r| r.value().clone()).collect(),
        };

        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, &snapshot)?;
        tracing::info!(path = %path.display(), dimensions = snapshot.states.len(), "Saved store snapshot");
        Ok(())
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn fetch_and_increment(&self, counter_id: &str) -> RouterResult<u64> {
        let mut entry = self.counters.entry(counter_id.to_string()).or_insert(0);
        let previous = *entry;
        *entry = previous.wrapping_add(1);
        Ok(previous)
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get_pool(&self, pool_id: &str) -> RouterResult<Option<PoolRecord>> {
        Ok(self.pools.get(pool_id).map(|r| r.value().clone()))
    }

    async fn put_pool(&self, record: PoolRecord) -> RouterResult<()> {
        self.pools.insert(record.id.clone(), record);
        Ok(())
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get_state(&self, dimension_id: &str) -> RouterResult<Option<ScalingState>> {
        Ok(self.states.get(dimension_id).map(|r| r.value().clone()))
    }

    async fn put_state(
        &self,
        mut state: ScalingState,
        expected_version: Option<u64>,
    ) -> RouterResult<ScalingState> {
        let dimension_id = state.dimension_id.clone();
        match (self.states.entry(dimension_id.clone()), expected_version) {
            (Entry::Occupied(mut occupied), Some(expected)) if occupied.get().version == expected => {
                state.version = expected + 1;
                occupied.insert(state.clone());
                Ok(state)
            }
            (Entry::Vacant(vacant), None) => {
                state.version = 1;
                vacant.insert(state.clone());
                Ok(state)
            }
            _ => Err(RouterError::VersionConflict { dimension_id }),
        }
    }

    async fn list_states(&self) -> RouterResult<Vec<ScalingState>> {
        let mut states: Vec<ScalingState> = self.states.iter().map(|r| r.value().clone()).collect();
        states.sort_by(|a, b| a.dimension_id.cmp(&b.dimension_id));
        Ok(states)
    }
}
