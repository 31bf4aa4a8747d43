use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::health::HealthMonitor;
use crate::registry::AdapterRegistry;

/// Background loop probing every registered adapter on a fixed interval.
pub struct HealthProbeScheduler {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl HealthProbeScheduler {
    pub fn start(registry: Arc<AdapterRegistry>, health: Arc<HealthMonitor>, interval: Duration) -> Self {
        let (shutdown, mut stop) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_secs = interval.as_secs(), "Health probe scheduler started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let adapters = registry.all().await;
                        if adapters.is_empty() {
                            continue;
                        }
                        let results = health.check_all(&adapters).await;
                        let unhealthy = results.values().filter(|ok| !**ok).count();
                        debug!(probed = results.len(), unhealthy, "Scheduled health probe finished");
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Health probe scheduler stopped");
        });

        Self { shutdown, handle }
    }

    /// Signal the loop to stop and wait for the in-flight round to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}
