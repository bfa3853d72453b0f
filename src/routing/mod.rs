//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Invocation request
//!     → store::load_pool (bootstrap default if absent)
//!     → BackendPool::total_weight (reject unroutable pools before counting)
//!     → CounterStore::fetch_and_increment
//!         on failure → wall clock ms mod 1000, tagged Fallback
//!     → pool::select (counter → backend bucket)
//!     → RoutingDecision
//! ```
//!
//! # Design Decisions
//! - Nothing is cached between decisions; the pool is read per request
//! - The counter is the only write on the routing path
//! - A counter outage degrades fairness, never availability

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{PoolConfig, SharedConfig, StoreConfig};
use crate::error::{RouterError, RouterResult};
use crate::observability::metrics;
use crate::pool::{Backend, BackendPool, PoolRecord};
use crate::scaling::state::epoch_millis;
use crate::store::{load_pool, ConfigStore, CounterStore};

/// Where the counter value behind a decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterSource {
    /// The durable counter: exact weighted rotation.
    Exact,
    /// Wall-clock substitute used while the counter store is unavailable.
    Fallback,
}

impl CounterSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for CounterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one routing decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub server: String,
    pub request_id: Uuid,
    /// Counter value the next decision should observe.
    pub request_count: u64,
    pub counter_source: CounterSource,
}

/// Counter substitute derived from the wall clock.
pub fn fallback_counter(now_ms: u64) -> u64 {
    now_ms % 1000
}

/// Make one routing decision against the stored pool.
pub async fn route_request(
    counters: &dyn CounterStore,
    configs: &dyn ConfigStore,
    store: &StoreConfig,
    bootstrap: &PoolConfig,
) -> RouterResult<RoutingDecision> {
    let pool = load_pool(configs, store, bootstrap).await?;
    pool.total_weight()?;

    let (counter, counter_source) = match counters.fetch_and_increment(&store.counter_id).await {
        Ok(value) => (value, CounterSource::Exact),
        Err(e) => {
            let value = fallback_counter(epoch_millis());
            tracing::warn!(
                counter = %store.counter_id,
                error = %e,
                fallback = value,
                "Counter unavailable, routing with fallback counter"
            );
            metrics::record_counter_fallback();
            (value, CounterSource::Fallback)
        }
    };

    let selection = pool.select(counter)?;
    metrics::record_decision(&selection.backend_id, counter_source.as_str());
    tracing::debug!(
        server = %selection.backend_id,
        counter,
        counter_source = %counter_source,
        "Routing decision"
    );

    Ok(RoutingDecision {
        server: selection.backend_id,
        request_id: Uuid::new_v4(),
        request_count: selection.request_count,
        counter_source,
    })
}

/// Weighted router over injected collaborators.
#[derive(Clone)]
pub struct WeightedRouter {
    counters: Arc<dyn CounterStore>,
    configs: Arc<dyn ConfigStore>,
    config: SharedConfig,
}

impl WeightedRouter {
    pub fn new(
        counters: Arc<dyn CounterStore>,
        configs: Arc<dyn ConfigStore>,
        config: SharedConfig,
    ) -> Self {
        Self {
            counters,
            configs,
            config,
        }
    }

    /// Pick the backend for the next request.
    pub async fn next_server(&self) -> RouterResult<RoutingDecision> {
        let config = self.config.load_full();
        route_request(
            self.counters.as_ref(),
            self.configs.as_ref(),
            &config.store,
            &config.pool,
        )
        .await
    }

    /// Current pool, bootstrapping it if absent.
    pub async fn pool(&self) -> RouterResult<BackendPool> {
        let config = self.config.load_full();
        load_pool(self.configs.as_ref(), &config.store, &config.pool).await
    }

    /// Replace the servers and weights of the pool.
    ///
    /// Instance counts survive when the server list is unchanged and reset to
    /// zero otherwise.
    pub async fn update_pool(&self, servers: Vec<String>, weights: Vec<i64>) -> RouterResult<BackendPool> {
        let weights = validate_pool_update(&servers, &weights)?;
        let current = self.pool().await?;

        let same_servers = current.ids() == servers.iter().map(String::as_str).collect::<Vec<_>>();
        let backends = servers
            .into_iter()
            .zip(weights)
            .enumerate()
            .map(|(i, (id, weight))| {
                let count = if same_servers {
                    current.backends[i].current_instance_count
                } else {
                    0
                };
                Backend::new(id, weight, count)
            })
            .collect();

        let pool = BackendPool::new(current.id, backends);
        self.configs.put_pool(PoolRecord::from(&pool)).await?;
        metrics::record_pool_weights(&pool);
        tracing::info!(
            pool = %pool.id,
            servers = ?pool.ids(),
            weights = ?pool.weights(),
            counts_kept = same_servers,
            "Pool configuration updated"
        );
        Ok(pool)
    }
}

fn validate_pool_update(servers: &[String], weights: &[i64]) -> RouterResult<Vec<u64>> {
    if servers.is_empty() {
        return Err(RouterError::InvalidRequest("servers must not be empty".into()));
    }
    if servers.len() != weights.len() {
        return Err(RouterError::InvalidRequest(
            "servers and weights must have the same length".into(),
        ));
    }
    for (i, server) in servers.iter().enumerate() {
        if server.is_empty() {
            return Err(RouterError::InvalidRequest(format!("server {} has an empty id", i)));
        }
        if servers[..i].contains(server) {
            return Err(RouterError::InvalidRequest(format!("duplicate server {}", server)));
        }
    }

    let mut checked = Vec::with_capacity(weights.len());
    for (server, &weight) in servers.iter().zip(weights) {
        let weight = u64::try_from(weight).map_err(|_| {
            RouterError::InvalidRequest(format!("weight for {} must be a non-negative integer", server))
        })?;
        checked.push(weight);
    }

    if checked.iter().all(|&w| w == 0) {
        return Err(RouterError::InvalidRequest(
            "total weight must be greater than 0".into(),
        ));
    }
    Ok(checked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{self, RouterConfig};
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    struct UnavailableCounter;

    #[async_trait]
    impl CounterStore for UnavailableCounter {
        async fn fetch_and_increment(&self, _counter_id: &str) -> RouterResult<u64> {
            Err(RouterError::store("counter table unreachable"))
        }
    }

    fn router(counters: Arc<dyn CounterStore>, store: &MemoryStore) -> WeightedRouter {
        WeightedRouter::new(
            counters,
            Arc::new(store.clone()),
            config::watcher::shared(RouterConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_bootstrap_pool_rotation() {
        let store = MemoryStore::new();
        let router = router(Arc::new(store.clone()), &store);

        let mut servers = Vec::new();
        for _ in 0..10 {
            let decision = router.next_server().await.unwrap();
            assert_eq!(decision.counter_source, CounterSource::Exact);
            servers.push(decision.server);
        }
        assert_eq!(
            servers,
            vec![
                "server1", "server1", "server1", "server1", "server1", "server2", "server2",
                "server2", "server3", "server3"
            ]
        );
    }

    #[tokio::test]
    async fn test_request_count_follows_counter() {
        let store = MemoryStore::new();
        let router = router(Arc::new(store.clone()), &store);

        let first = router.next_server().await.unwrap();
        let second = router.next_server().await.unwrap();
        assert_eq!(first.request_count, 1);
        assert_eq!(second.request_count, 2);
        assert_ne!(first.request_id, second.request_id);
    }

    #[tokio::test]
    async fn test_counter_outage_uses_fallback() {
        let store = MemoryStore::new();
        let router = router(Arc::new(UnavailableCounter), &store);

        let decision = router.next_server().await.unwrap();
        assert_eq!(decision.counter_source, CounterSource::Fallback);
        assert!(decision.request_count <= 1000);
        assert!(["server1", "server2", "server3"].contains(&decision.server.as_str()));
    }

    #[tokio::test]
    async fn test_unroutable_pool_does_not_consume_counter() {
        let store = MemoryStore::new();
        store
            .put_pool(PoolRecord {
                id: "server_config".into(),
                servers: vec!["a".into(), "b".into()],
                weights: vec![0, 0],
                current_instance_count: vec![],
            })
            .await
            .unwrap();
        let router = router(Arc::new(store.clone()), &store);

        let err = router.next_server().await.unwrap_err();
        assert!(matches!(err, RouterError::InvalidConfiguration(_)));
        assert_eq!(store.fetch_and_increment("request_counter").await.unwrap(), 0);
    }

    #[test]
    fn test_fallback_counter_range() {
        assert_eq!(fallback_counter(1_700_000_000_123), 123);
        assert_eq!(fallback_counter(999), 999);
    }

    #[tokio::test]
    async fn test_update_pool_keeps_counts_for_same_servers() {
        let store = MemoryStore::new();
        let router = router(Arc::new(store.clone()), &store);

        let pool = router
            .update_pool(
                vec!["server1".into(), "server2".into(), "server3".into()],
                vec![1, 1, 0],
            )
            .await
            .unwrap();
        assert_eq!(pool.weights(), vec![1, 1, 0]);
        assert_eq!(pool.instance_counts(), vec![5, 3, 2]);

        let pool = router
            .update_pool(vec!["a".into(), "b".into()], vec![2, 1])
            .await
            .unwrap();
        assert_eq!(pool.instance_counts(), vec![0, 0]);
        assert_eq!(router.pool().await.unwrap(), pool);
    }

    #[tokio::test]
    async fn test_update_pool_rejects_bad_input() {
        let store = MemoryStore::new();
        let router = router(Arc::new(store.clone()), &store);

        let cases: Vec<(Vec<&str>, Vec<i64>)> = vec![
            (vec![], vec![]),
            (vec!["a", "b"], vec![1]),
            (vec!["a", "b"], vec![1, -1]),
            (vec!["a", "b"], vec![0, 0]),
            (vec!["a", "a"], vec![1, 1]),
        ];
        for (servers, weights) in cases {
            let servers = servers.into_iter().map(String::from).collect();
            let err = router.update_pool(servers, weights).await.unwrap_err();
            assert!(matches!(err, RouterError::InvalidRequest(_)));
        }

        let err = router
            .update_pool(vec!["a".into(), "b".into()], vec![1, -3])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("weight for b"));
    }
}
