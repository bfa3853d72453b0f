//! Background staleness reconciliation.

use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::SharedConfig;
use crate::scaling::service::ScalingService;

/// Periodically reconciles every stored dimension.
pub struct Reconciler {
    service: ScalingService,
    config: SharedConfig,
}

impl Reconciler {
    pub fn new(service: ScalingService, config: SharedConfig) -> Self {
        Self { service, config }
    }

    /// Run until shutdown. The interval is read once at start.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let interval_secs = self.config.load().scaling.reconcile_interval_secs;
        if interval_secs == 0 {
            tracing::info!("Background reconciliation disabled");
            return;
        }

        tracing::info!(interval = interval_secs, "Reconciler starting");

        let mut ticker = time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Reconciler received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn sweep(&self) {
        match self.service.reconcile_all().await {
            Ok(0) => tracing::debug!("Reconciliation sweep found nothing to do"),
            Ok(changed) => tracing::info!(changed, "Reconciliation sweep updated dimensions"),
            Err(e) => tracing::error!(error = %e, "Reconciliation sweep failed"),
        }
    }
}
