use std::time::Duration;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

/// Search fan-out instrumentation, registered against a caller-owned registry.
#[derive(Clone)]
pub struct SearchMetrics {
    operator_outcomes: IntCounterVec,
    operator_latency: HistogramVec,
    results: IntCounter,
}

impl SearchMetrics {
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        let operator_outcomes = IntCounterVec::new(
            Opts::new("ferry_operator_outcomes_total", "Per-operator search outcomes"),
            &["operator", "outcome"],
        )?;
        let operator_latency = HistogramVec::new(
            HistogramOpts::new("ferry_operator_search_seconds", "Per-operator search latency")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["operator"],
        )?;
        let results = IntCounter::new("ferry_search_results_total", "Sailings returned by aggregated searches")?;

        registry.register(Box::new(operator_outcomes.clone()))?;
        registry.register(Box::new(operator_latency.clone()))?;
        registry.register(Box::new(results.clone()))?;

        Ok(Self {
            operator_outcomes,
            operator_latency,
            results,
        })
    }

    pub fn record_outcome(&self, operator_code: &str, outcome: &str, elapsed: Option<Duration>) {
        self.operator_outcomes.with_label_values(&[operator_code, outcome]).inc();
        if let Some(elapsed) = elapsed {
            self.operator_latency
                .with_label_values(&[operator_code])
                .observe(elapsed.as_secs_f64());
        }
    }

    pub fn record_results(&self, count: usize) {
        self.results.inc_by(count as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_are_exported() {
        let registry = Registry::new();
        let metrics = SearchMetrics::new(&registry).unwrap();

        metrics.record_outcome("CTN", "succeeded", Some(Duration::from_millis(120)));
        metrics.record_outcome("GNV", "timed_out", None);
        metrics.record_results(7);

        let names: Vec<String> = registry.gather().iter().map(|f| f.get_name().to_string()).collect();
        assert!(names.contains(&"ferry_operator_outcomes_total".to_string()));
        assert!(names.contains(&"ferry_operator_search_seconds".to_string()));
        assert_eq!(metrics.results.get(), 7);
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        SearchMetrics::new(&registry).unwrap();
        assert!(SearchMetrics::new(&registry).is_err());
    }
}
