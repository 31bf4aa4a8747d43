//! Per-operator liveness tracking.
//!
//! The status table is shared by the orchestrator (reads on every search,
//! failure feedback afterwards), the probe scheduler and the API. Reads never
//! wait on an in-flight probe.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use ferry_core::{AdapterHealthStatus, HealthState, OperatorAdapter};
use ferry_shared::models::OperatorHealthChangedEvent;
use futures::future::join_all;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct HealthMonitorConfig {
    /// Consecutive search failures before an operator is marked unhealthy.
    pub failure_threshold: u32,
    pub probe_timeout: Duration,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 2,
            probe_timeout: Duration::from_secs(5),
        }
    }
}

pub struct HealthMonitor {
    config: HealthMonitorConfig,
    statuses: DashMap<String, AdapterHealthStatus>,
    events: broadcast::Sender<OperatorHealthChangedEvent>,
}

impl HealthMonitor {
    pub fn new(config: HealthMonitorConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config: HealthMonitorConfig {
                failure_threshold: config.failure_threshold.max(1),
                ..config
            },
            statuses: DashMap::new(),
            events,
        }
    }

    pub fn failure_threshold(&self) -> u32 {
        self.config.failure_threshold
    }

    /// Transition notifications. Lagging receivers lose the oldest events.
    pub fn subscribe(&self) -> broadcast::Receiver<OperatorHealthChangedEvent> {
        self.events.subscribe()
    }

    /// Probe every adapter concurrently. An error, a panic or a probe that
    /// outlives the timeout counts as unhealthy. An adapter retired by a
    /// reload mid-round is left out: its operator was not observed.
    pub async fn check_all(&self, adapters: &[Arc<dyn OperatorAdapter>]) -> HashMap<String, bool> {
        let probe_timeout = self.config.probe_timeout;

        let probes = adapters.iter().map(|adapter| {
            let adapter = Arc::clone(adapter);
            tokio::spawn(async move {
                match tokio::time::timeout(probe_timeout, adapter.health_check()).await {
                    Ok(Ok(true)) => Some((true, None)),
                    Ok(Ok(false)) => Some((false, Some("health endpoint reported failure".to_string()))),
                    Ok(Err(e)) if e.is_shutdown() => None,
                    Ok(Err(e)) => Some((false, Some(e.to_string()))),
                    Err(_) => Some((
                        false,
                        Some(format!("health probe timed out after {}ms", probe_timeout.as_millis())),
                    )),
                }
            })
        });
        let outcomes = join_all(probes).await;

        let mut results = HashMap::with_capacity(adapters.len());
        for (adapter, outcome) in adapters.iter().zip(outcomes) {
            let code = adapter.operator_code();
            let observed = outcome.unwrap_or_else(|e| {
                error!(operator = %code, error = %e, "Health probe task panicked");
                Some((false, Some("health probe panicked".to_string())))
            });
            let Some((healthy, reason)) = observed else {
                debug!(operator = %code, "Skipping probe of retired adapter");
                continue;
            };

            self.record_probe(code, healthy, reason);
            results.insert(code.to_string(), healthy);
        }

        debug!(probed = results.len(), "Health check round complete");
        results
    }

    /// Sorted copy of the status table.
    pub fn snapshot(&self) -> BTreeMap<String, AdapterHealthStatus> {
        self.statuses
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn status(&self, operator_code: &str) -> Option<AdapterHealthStatus> {
        self.statuses.get(operator_code).map(|s| s.value().clone())
    }

    /// Operators that were never observed count as dispatchable.
    pub fn is_dispatchable(&self, operator_code: &str) -> bool {
        self.statuses
            .get(operator_code)
            .map(|s| s.state != HealthState::Unhealthy)
            .unwrap_or(true)
    }

    /// Feedback from a failed search. Flips to unhealthy only once the
    /// consecutive failure count reaches the threshold.
    pub fn report_failure(&self, operator_code: &str, error: &str) {
        let threshold = self.config.failure_threshold;
        self.update(operator_code, |status| {
            status.consecutive_failures = status.consecutive_failures.saturating_add(1);
            status.last_error = Some(error.to_string());
            if status.consecutive_failures >= threshold {
                status.set_state(HealthState::Unhealthy);
            }
        });
    }

    /// Feedback from a successful search.
    pub fn record_success(&self, operator_code: &str) {
        self.update(operator_code, |status| {
            status.consecutive_failures = 0;
            status.last_error = None;
            status.set_state(HealthState::Healthy);
        });
    }

    /// Probe results set the state directly.
    pub fn record_probe(&self, operator_code: &str, healthy: bool, reason: Option<String>) {
        self.update(operator_code, |status| {
            if healthy {
                status.consecutive_failures = 0;
                status.last_error = None;
                status.set_state(HealthState::Healthy);
            } else {
                status.consecutive_failures = status.consecutive_failures.saturating_add(1);
                status.last_error = reason;
                status.set_state(HealthState::Unhealthy);
            }
        });
    }

    pub fn forget(&self, operator_code: &str) {
        self.statuses.remove(operator_code);
    }

    fn update(&self, operator_code: &str, apply: impl FnOnce(&mut AdapterHealthStatus)) {
        let event = {
            let mut status = self
                .statuses
                .entry(operator_code.to_string())
                .or_insert_with(|| AdapterHealthStatus::unknown(operator_code));

            let previous = status.state;
            apply(status.value_mut());
            status.last_checked = Some(Utc::now());

            (previous != status.state).then(|| {
                OperatorHealthChangedEvent::new(
                    operator_code,
                    previous.as_str(),
                    status.state.as_str(),
                    status.healthy,
                    status.last_error.clone(),
                )
            })
        };

        if let Some(event) = event {
            if event.healthy {
                info!(operator = %operator_code, from = %event.previous_state, "Operator is healthy");
            } else {
                warn!(
                    operator = %operator_code,
                    from = %event.previous_state,
                    error = ?event.last_error,
                    "Operator marked unhealthy"
                );
            }
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new(HealthMonitorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockAdapter;

    #[test]
    fn test_unknown_operator_is_dispatchable() {
        let monitor = HealthMonitor::default();
        assert!(monitor.is_dispatchable("CTN"));
        assert!(monitor.status("CTN").is_none());
    }

    #[test]
    fn test_failures_flip_only_at_threshold() {
        let monitor = HealthMonitor::default();

        monitor.report_failure("CTN", "502");
        let status = monitor.status("CTN").unwrap();
        assert_eq!(status.state, HealthState::Unknown);
        assert_eq!(status.consecutive_failures, 1);
        assert!(monitor.is_dispatchable("CTN"));

        monitor.report_failure("CTN", "502");
        let status = monitor.status("CTN").unwrap();
        assert_eq!(status.state, HealthState::Unhealthy);
        assert!(!status.healthy);
        assert_eq!(status.last_error.as_deref(), Some("502"));
        assert!(!monitor.is_dispatchable("CTN"));
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let monitor = HealthMonitor::new(HealthMonitorConfig {
            failure_threshold: 3,
            ..Default::default()
        });

        monitor.report_failure("GNV", "timeout");
        monitor.report_failure("GNV", "timeout");
        monitor.record_success("GNV");
        monitor.report_failure("GNV", "timeout");
        monitor.report_failure("GNV", "timeout");

        let status = monitor.status("GNV").unwrap();
        assert_eq!(status.state, HealthState::Healthy);
        assert_eq!(status.consecutive_failures, 2);
    }

    #[tokio::test]
    async fn test_check_all_probes_and_updates_table() {
        let monitor = HealthMonitor::default();
        let up = Arc::new(MockAdapter::with_results("UP", vec![]));
        let down = Arc::new(MockAdapter::with_results("DOWN", vec![]));
        down.set_healthy(false);

        let adapters: Vec<Arc<dyn OperatorAdapter>> = vec![up.clone(), down.clone()];
        let results = monitor.check_all(&adapters).await;

        assert_eq!(results.get("UP"), Some(&true));
        assert_eq!(results.get("DOWN"), Some(&false));
        assert_eq!(monitor.status("UP").unwrap().state, HealthState::Healthy);
        assert_eq!(monitor.status("DOWN").unwrap().state, HealthState::Unhealthy);
        assert_eq!(monitor.snapshot().keys().cloned().collect::<Vec<_>>(), vec!["DOWN", "UP"]);

        // An unhealthy operator recovers on the next good probe.
        down.set_healthy(true);
        monitor.check_all(&adapters).await;
        assert!(monitor.is_dispatchable("DOWN"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_probe_counts_as_unhealthy() {
        let monitor = HealthMonitor::new(HealthMonitorConfig {
            probe_timeout: Duration::from_secs(1),
            ..Default::default()
        });
        let slow: Arc<dyn OperatorAdapter> =
            Arc::new(MockAdapter::with_results("SLOW", vec![]).with_delay(Duration::from_secs(30)));

        let results = monitor.check_all(&[slow]).await;
        assert_eq!(results.get("SLOW"), Some(&false));
        assert!(monitor.status("SLOW").unwrap().last_error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_transitions_are_broadcast() {
        let monitor = HealthMonitor::default();
        let mut events = monitor.subscribe();

        monitor.record_success("CTN");
        monitor.record_success("CTN");
        monitor.report_failure("CTN", "boom");
        monitor.report_failure("CTN", "boom");

        let first = events.recv().await.unwrap();
        assert_eq!((first.previous_state.as_str(), first.state.as_str()), ("unknown", "healthy"));

        let second = events.recv().await.unwrap();
        assert_eq!((second.previous_state.as_str(), second.state.as_str()), ("healthy", "unhealthy"));
        assert!(!second.healthy);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_check_all_ignores_retired_adapter() {
        let monitor = HealthMonitor::default();
        let retired = Arc::new(MockAdapter::with_results("CTN", vec![]));
        retired.shutdown().await;

        // The replacement was already observed healthy after the reload.
        monitor.record_success("CTN");
        let adapters: Vec<Arc<dyn OperatorAdapter>> = vec![retired];
        let results = monitor.check_all(&adapters).await;

        assert!(results.is_empty());
        assert_eq!(monitor.status("CTN").unwrap().state, HealthState::Healthy);
    }

    #[test]
    fn test_forget_drops_status() {
        let monitor = HealthMonitor::default();
        monitor.report_failure("OLD", "gone");
        monitor.forget("OLD");
        assert!(monitor.snapshot().is_empty());
    }
}
