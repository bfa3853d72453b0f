//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};

use crate::config::loader::load_config;
use crate::config::schema::RouterConfig;

/// Configuration shared by every handler. Swapped whole on reload.
pub type SharedConfig = Arc<ArcSwap<RouterConfig>>;

pub fn shared(config: RouterConfig) -> SharedConfig {
    Arc::new(ArcSwap::from_pointee(config))
}

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<RouterConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<RouterConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file in a background thread.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Config file change detected, reloading...");
                        match load_config(&path) {
                            Ok(new_config) => {
                                let _ = tx.send(new_config);
                            }
                            Err(e) => {
                                tracing::error!(
                                    "Failed to reload config: {}. Keeping current configuration.",
                                    e
                                );
                            }
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Swap reloaded configurations into `shared` until shutdown.
///
/// Listener and store keys are fixed at startup; a reload that changes them
/// is applied to everything else and logged.
pub async fn apply_updates(
    shared: SharedConfig,
    mut updates: mpsc::UnboundedReceiver<RouterConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(mut next) = update else { break };
                let current = shared.load_full();
                if next.listener != current.listener || next.store != current.store {
                    tracing::warn!("Listener and store settings require a restart; keeping current values");
                    next.listener = current.listener.clone();
                    next.store = current.store.clone();
                }
                shared.store(Arc::new(next));
                tracing::info!("Configuration reloaded");
            }
            _ = shutdown.recv() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_apply_updates_keeps_startup_only_fields() {
        let shared = shared(RouterConfig::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let mut next = RouterConfig::default();
        next.scaling.staleness_timeout_secs = 60;
        next.store.counter_id = "other_counter".into();
        tx.send(next).unwrap();
        drop(tx);

        apply_updates(shared.clone(), rx, shutdown_rx).await;
        drop(shutdown_tx);

        let config = shared.load();
        assert_eq!(config.scaling.staleness_timeout_secs, 60);
        assert_eq!(config.store.counter_id, "request_counter");
    }
}
