//! Concurrent fan-out of one search request to every eligible operator.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use ferry_core::{AdapterError, AggregatedSearchResponse, OperatorOutcome, SearchRequest, SearchResult};
use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::health::HealthMonitor;
use crate::metrics::SearchMetrics;
use crate::registry::AdapterRegistry;

/// Result of one operator's task, before it is folded into the response.
enum TaskOutput {
    Done {
        result: Result<Vec<SearchResult>, AdapterError>,
        elapsed: Duration,
    },
    TimedOut,
}

/// A merged sailing tagged with its position in its operator's response.
struct Ranked {
    result: SearchResult,
    position: usize,
}

pub struct SearchOrchestrator {
    registry: Arc<AdapterRegistry>,
    health: Arc<HealthMonitor>,
    default_timeout: Duration,
    metrics: Option<SearchMetrics>,
}

impl SearchOrchestrator {
    pub fn new(registry: Arc<AdapterRegistry>, health: Arc<HealthMonitor>, default_timeout: Duration) -> Self {
        Self {
            registry,
            health,
            default_timeout,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: SearchMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    pub fn health(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    /// Query every registered, non-excluded operator concurrently and merge the
    /// results. Never fails: operators that error, panic or time out contribute
    /// nothing and are reported in `outcomes`.
    pub async fn search_all(&self, request: &SearchRequest) -> AggregatedSearchResponse {
        let adapters: Vec<_> = self
            .registry
            .all()
            .await
            .into_iter()
            .filter(|adapter| request.wants_operator(adapter.operator_code()))
            .collect();

        if adapters.is_empty() {
            debug!("No operators eligible for search");
            return AggregatedSearchResponse::empty(request.clone());
        }

        let mut outcomes = BTreeMap::new();
        let mut dispatched = Vec::with_capacity(adapters.len());
        let mut tasks = Vec::with_capacity(adapters.len());
        let shared_request = Arc::new(request.clone());

        for adapter in adapters {
            let code = adapter.operator_code().to_string();
            if !self.health.is_dispatchable(&code) {
                debug!(operator = %code, "Skipping unhealthy operator");
                self.record_metric(&code, &OperatorOutcome::SkippedUnhealthy, None);
                outcomes.insert(code, OperatorOutcome::SkippedUnhealthy);
                continue;
            }

            let budget = match adapter.timeout() {
                t if t.is_zero() => self.default_timeout,
                t => t,
            };
            let request = Arc::clone(&shared_request);

            tasks.push(tokio::spawn(async move {
                let started = Instant::now();
                match tokio::time::timeout(budget, adapter.search(&request)).await {
                    Ok(result) => TaskOutput::Done {
                        result,
                        elapsed: started.elapsed(),
                    },
                    Err(_) => TaskOutput::TimedOut,
                }
            }));
            dispatched.push((code, budget));
        }

        let joined = join_all(tasks).await;

        let mut merged = Vec::new();
        let mut failures = Vec::new();
        let mut successes = Vec::new();

        for ((code, budget), joined) in dispatched.into_iter().zip(joined) {
            let (outcome, elapsed) = match joined {
                Ok(TaskOutput::Done {
                    result: Ok(results),
                    elapsed,
                }) => {
                    debug!(operator = %code, count = results.len(), elapsed_ms = elapsed.as_millis() as u64, "Operator search succeeded");
                    let outcome = OperatorOutcome::Succeeded {
                        result_count: results.len(),
                        elapsed_ms: elapsed.as_millis() as u64,
                    };
                    merged.extend(
                        results
                            .into_iter()
                            .enumerate()
                            .map(|(position, result)| Ranked { result, position }),
                    );
                    successes.push(code.clone());
                    (outcome, Some(elapsed))
                }
                Ok(TaskOutput::Done { result: Err(e), elapsed }) if e.is_timeout() => {
                    warn!(operator = %code, error = %e, "Operator search timed out");
                    failures.push((code.clone(), e.to_string()));
                    (
                        OperatorOutcome::TimedOut {
                            timeout_ms: budget.as_millis() as u64,
                        },
                        Some(elapsed),
                    )
                }
                Ok(TaskOutput::Done { result: Err(e), elapsed }) => {
                    warn!(operator = %code, error = %e, elapsed_ms = elapsed.as_millis() as u64, "Operator search failed");
                    // A retired adapter says nothing about its operator's health.
                    if !e.is_shutdown() {
                        failures.push((code.clone(), e.to_string()));
                    }
                    (
                        OperatorOutcome::Failed {
                            error: e.to_string(),
                            elapsed_ms: elapsed.as_millis() as u64,
                        },
                        Some(elapsed),
                    )
                }
                Ok(TaskOutput::TimedOut) => {
                    warn!(operator = %code, timeout_ms = budget.as_millis() as u64, "Operator search timed out");
                    failures.push((code.clone(), format!("timed out after {}ms", budget.as_millis())));
                    (
                        OperatorOutcome::TimedOut {
                            timeout_ms: budget.as_millis() as u64,
                        },
                        Some(budget),
                    )
                }
                Err(e) => {
                    error!(operator = %code, error = %e, "Operator search task aborted");
                    failures.push((code.clone(), "search task panicked".to_string()));
                    (
                        OperatorOutcome::Failed {
                            error: "search task panicked".to_string(),
                            elapsed_ms: 0,
                        },
                        None,
                    )
                }
            };

            self.record_metric(&code, &outcome, elapsed);
            outcomes.insert(code, outcome);
        }

        self.feed_health(successes, failures);

        if let Some(max_price) = request.max_price {
            merged.retain(|ranked| ranked.result.base_price <= max_price);
        }
        merged.sort_by(compare_ranked);
        let results: Vec<SearchResult> = merged.into_iter().map(|ranked| ranked.result).collect();

        if let Some(metrics) = &self.metrics {
            metrics.record_results(results.len());
        }

        let response = AggregatedSearchResponse::new(request.clone(), results, outcomes);
        info!(
            search_id = %response.search_id,
            results = response.total_results,
            operators = response.outcomes.len(),
            failed = response.failed_operators().len(),
            "Aggregated search complete"
        );
        response
    }

    /// Health feedback runs off the request path.
    fn feed_health(&self, successes: Vec<String>, failures: Vec<(String, String)>) {
        if successes.is_empty() && failures.is_empty() {
            return;
        }

        let health = Arc::clone(&self.health);
        tokio::spawn(async move {
            for code in successes {
                health.record_success(&code);
            }
            for (code, error) in failures {
                health.report_failure(&code, &error);
            }
        });
    }

    fn record_metric(&self, operator_code: &str, outcome: &OperatorOutcome, elapsed: Option<Duration>) {
        if let Some(metrics) = &self.metrics {
            metrics.record_outcome(operator_code, outcome.label(), elapsed);
        }
    }
}

/// Price, then departure, then the operator's own order, then operator code.
fn compare_ranked(a: &Ranked, b: &Ranked) -> Ordering {
    a.result
        .base_price
        .cmp(&b.result.base_price)
        .then_with(|| a.result.departure_time.cmp(&b.result.departure_time))
        .then_with(|| a.position.cmp(&b.position))
        .then_with(|| a.result.operator_code.cmp(&b.result.operator_code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::TransportSettings;
    use crate::health::HealthMonitorConfig;
    use crate::mock::{sailing, search_request, MockAdapter};
    use ferry_core::{HealthState, OperatorAdapter};
    use rust_decimal::Decimal;

    async fn orchestrator(adapters: Vec<Arc<MockAdapter>>) -> SearchOrchestrator {
        let registry = Arc::new(AdapterRegistry::new(TransportSettings::default()));
        for adapter in adapters {
            registry.register(adapter).await;
        }
        SearchOrchestrator::new(registry, Arc::new(HealthMonitor::default()), Duration::from_secs(30))
    }

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_no_operators_yields_empty_response() {
        let orchestrator = orchestrator(vec![]).await;
        let response = orchestrator.search_all(&search_request()).await;

        assert!(response.results.is_empty());
        assert_eq!(response.total_results, 0);
        assert!(response.outcomes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_equal_price_orders_by_departure_and_timeout_is_isolated() {
        let a = Arc::new(MockAdapter::with_results("A", vec![sailing("A", "A-1", 80, 8, 0)]));
        let b = Arc::new(MockAdapter::with_results("B", vec![sailing("B", "B-1", 80, 7, 0)]));
        let c = Arc::new(
            MockAdapter::with_results("C", vec![sailing("C", "C-1", 10, 6, 0)])
                .with_delay(Duration::from_secs(60))
                .with_timeout(Duration::from_secs(2)),
        );
        let orchestrator = orchestrator(vec![a, b, c]).await;

        let started = Instant::now();
        let response = orchestrator.search_all(&search_request()).await;

        assert!(started.elapsed() < Duration::from_secs(3));
        let routes: Vec<&str> = response.results.iter().map(|r| r.route_id.as_str()).collect();
        assert_eq!(routes, vec!["B-1", "A-1"]);
        assert_eq!(response.total_results, 2);
        assert_eq!(response.outcome("C"), Some(&OperatorOutcome::TimedOut { timeout_ms: 2000 }));
        assert!(matches!(response.outcome("A"), Some(OperatorOutcome::Succeeded { result_count: 1, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cheaper_result_first_regardless_of_completion_order() {
        let slow_cheap = Arc::new(
            MockAdapter::with_results("SLOW", vec![sailing("SLOW", "S-1", 40, 12, 0)])
                .with_delay(Duration::from_millis(900)),
        );
        let fast_pricey = Arc::new(MockAdapter::with_results("FAST", vec![sailing("FAST", "F-1", 90, 6, 0)]));
        let orchestrator = orchestrator(vec![slow_cheap, fast_pricey]).await;

        let response = orchestrator.search_all(&search_request()).await;
        assert_eq!(response.results[0].route_id, "S-1");
        assert_eq!(response.results[1].route_id, "F-1");
    }

    #[tokio::test]
    async fn test_one_failing_operator_does_not_affect_others() {
        let good = Arc::new(MockAdapter::with_results(
            "GOOD",
            vec![sailing("GOOD", "G-1", 55, 9, 0), sailing("GOOD", "G-2", 45, 10, 0)],
        ));
        let bad = Arc::new(MockAdapter::failing("BAD"));
        let orchestrator = orchestrator(vec![good, bad]).await;

        let response = orchestrator.search_all(&search_request()).await;

        assert_eq!(response.total_results, 2);
        assert_eq!(response.failed_operators(), vec!["BAD".to_string()]);
        assert!(matches!(response.outcome("BAD"), Some(OperatorOutcome::Failed { .. })));
        let prices: Vec<Decimal> = response.results.iter().map(|r| r.base_price).collect();
        assert_eq!(prices, vec![Decimal::new(45, 0), Decimal::new(55, 0)]);
    }

    #[tokio::test]
    async fn test_panicking_adapter_is_contained() {
        let ok = Arc::new(MockAdapter::with_results("OK", vec![sailing("OK", "O-1", 30, 9, 0)]));
        let boom = Arc::new(MockAdapter::panicking("BOOM"));
        let orchestrator = orchestrator(vec![ok, boom]).await;

        let response = orchestrator.search_all(&search_request()).await;
        assert_eq!(response.total_results, 1);
        assert!(matches!(response.outcome("BOOM"), Some(OperatorOutcome::Failed { .. })));
    }

    #[tokio::test]
    async fn test_total_outage_is_still_a_response() {
        let orchestrator = orchestrator(vec![
            Arc::new(MockAdapter::failing("X")),
            Arc::new(MockAdapter::failing("Y")),
        ])
        .await;

        let response = orchestrator.search_all(&search_request()).await;
        assert!(response.results.is_empty());
        assert_eq!(response.failed_operators().len(), 2);
    }

    #[tokio::test]
    async fn test_retired_adapter_failure_does_not_feed_health() {
        let retired = Arc::new(MockAdapter::with_results("CTN", vec![sailing("CTN", "CTN-1", 50, 9, 0)]));
        let orchestrator = orchestrator(vec![retired.clone()]).await;
        retired.shutdown().await;

        for _ in 0..3 {
            let response = orchestrator.search_all(&search_request()).await;
            assert!(matches!(response.outcome("CTN"), Some(OperatorOutcome::Failed { .. })));
        }
        settle().await;

        assert!(orchestrator.health().status("CTN").is_none());
        assert!(orchestrator.health().is_dispatchable("CTN"));
    }

    #[tokio::test]
    async fn test_failures_feed_health_and_unhealthy_operators_are_skipped() {
        let bad = Arc::new(MockAdapter::failing("BAD"));
        let orchestrator = orchestrator(vec![bad.clone()]).await;

        orchestrator.search_all(&search_request()).await;
        settle().await;
        assert_eq!(orchestrator.health().status("BAD").unwrap().consecutive_failures, 1);

        orchestrator.search_all(&search_request()).await;
        settle().await;
        assert_eq!(orchestrator.health().status("BAD").unwrap().state, HealthState::Unhealthy);

        let response = orchestrator.search_all(&search_request()).await;
        assert_eq!(response.outcome("BAD"), Some(&OperatorOutcome::SkippedUnhealthy));
        assert_eq!(bad.search_calls(), 2);
    }

    #[tokio::test]
    async fn test_success_resets_health() {
        let registry = Arc::new(AdapterRegistry::new(TransportSettings::default()));
        registry
            .register(Arc::new(MockAdapter::with_results("OK", vec![])))
            .await;
        let health = Arc::new(HealthMonitor::new(HealthMonitorConfig {
            failure_threshold: 3,
            ..Default::default()
        }));
        health.report_failure("OK", "flaky");
        let orchestrator = SearchOrchestrator::new(registry, Arc::clone(&health), Duration::from_secs(5));

        orchestrator.search_all(&search_request()).await;
        settle().await;

        let status = health.status("OK").unwrap();
        assert_eq!(status.state, HealthState::Healthy);
        assert_eq!(status.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_preferred_operators_and_max_price() {
        let a = Arc::new(MockAdapter::with_results(
            "A",
            vec![sailing("A", "A-1", 50, 8, 0), sailing("A", "A-2", 150, 9, 0)],
        ));
        let b = Arc::new(MockAdapter::with_results("B", vec![sailing("B", "B-1", 20, 8, 0)]));
        let orchestrator = orchestrator(vec![a, b.clone()]).await;

        let mut request = search_request();
        request.preferred_operators = vec!["a".to_string()];
        request.max_price = Some(Decimal::new(100, 0));

        let response = orchestrator.search_all(&request).await;
        let routes: Vec<&str> = response.results.iter().map(|r| r.route_id.as_str()).collect();
        assert_eq!(routes, vec!["A-1"]);
        assert!(response.outcome("B").is_none());
        assert_eq!(b.search_calls(), 0);
    }

    #[tokio::test]
    async fn test_ties_keep_operator_order_then_code() {
        let a = Arc::new(MockAdapter::with_results(
            "A",
            vec![sailing("A", "A-first", 60, 8, 0), sailing("A", "A-second", 60, 8, 0)],
        ));
        let b = Arc::new(MockAdapter::with_results("B", vec![sailing("B", "B-first", 60, 8, 0)]));
        let orchestrator = orchestrator(vec![b, a]).await;

        let response = orchestrator.search_all(&search_request()).await;
        let routes: Vec<&str> = response.results.iter().map(|r| r.route_id.as_str()).collect();
        assert_eq!(routes, vec!["A-first", "B-first", "A-second"]);

        let prices: Vec<_> = response.results.windows(2).map(|w| w[0].base_price <= w[1].base_price).collect();
        assert!(prices.into_iter().all(|ordered| ordered));
    }

    #[tokio::test]
    async fn test_metrics_record_outcomes() {
        let registry = prometheus::Registry::new();
        let metrics = SearchMetrics::new(&registry).unwrap();
        let orchestrator = orchestrator(vec![
            Arc::new(MockAdapter::with_results("A", vec![sailing("A", "A-1", 10, 8, 0)])),
            Arc::new(MockAdapter::failing("B")),
        ])
        .await
        .with_metrics(metrics);

        orchestrator.search_all(&search_request()).await;

        let families = registry.gather();
        let outcomes = families
            .iter()
            .find(|f| f.get_name() == "ferry_operator_outcomes_total")
            .unwrap();
        assert_eq!(outcomes.get_metric().len(), 2);
    }
}
