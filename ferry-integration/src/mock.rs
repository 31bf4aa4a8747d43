//! Scriptable in-memory adapter for orchestrator, registry and health tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use ferry_core::booking::{BookingConfirmation, BookingRequest, OperatorBookingStatus};
use ferry_core::{AdapterError, AdapterResult, IntegrationPattern, OperatorAdapter, SearchRequest, SearchResult};
use rust_decimal::Decimal;

pub(crate) enum MockBehaviour {
    Results(Vec<SearchResult>),
    Fail(AdapterError),
    Panic,
}

pub(crate) struct MockAdapter {
    code: String,
    behaviour: MockBehaviour,
    delay: Duration,
    timeout: Duration,
    healthy: AtomicBool,
    shut_down: AtomicBool,
    search_calls: AtomicUsize,
    probe_calls: AtomicUsize,
}

impl MockAdapter {
    fn new(code: &str, behaviour: MockBehaviour) -> Self {
        Self {
            code: code.to_string(),
            behaviour,
            delay: Duration::ZERO,
            timeout: Duration::from_secs(5),
            healthy: AtomicBool::new(true),
            shut_down: AtomicBool::new(false),
            search_calls: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_results(code: &str, results: Vec<SearchResult>) -> Self {
        Self::new(code, MockBehaviour::Results(results))
    }

    pub fn failing(code: &str) -> Self {
        Self::new(
            code,
            MockBehaviour::Fail(AdapterError::HttpStatus {
                status_code: 502,
                reason: "bad gateway".to_string(),
            }),
        )
    }

    pub fn panicking(code: &str) -> Self {
        Self::new(code, MockBehaviour::Panic)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> AdapterResult<()> {
        if self.is_shut_down() {
            return Err(AdapterError::ShutDown {
                operator_code: self.code.clone(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl OperatorAdapter for MockAdapter {
    fn operator_code(&self) -> &str {
        &self.code
    }

    fn integration(&self) -> IntegrationPattern {
        IntegrationPattern::Direct
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn search(&self, _request: &SearchRequest) -> AdapterResult<Vec<SearchResult>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_open()?;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.behaviour {
            MockBehaviour::Results(results) => Ok(results.clone()),
            MockBehaviour::Fail(error) => Err(error.clone()),
            MockBehaviour::Panic => panic!("mock adapter {} exploded", self.code),
        }
    }

    async fn health_check(&self) -> AdapterResult<bool> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_open()?;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.healthy.load(Ordering::SeqCst))
    }

    async fn create_booking(&self, request: &BookingRequest) -> AdapterResult<BookingConfirmation> {
        self.ensure_open()?;
        if let MockBehaviour::Fail(error) = &self.behaviour {
            return Err(error.clone());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(BookingConfirmation {
            operator_code: self.code.clone(),
            booking_reference: format!("{}-{}", self.code, request.route_id),
            status: OperatorBookingStatus::Confirmed,
            total_price: None,
            currency: None,
        })
    }

    async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}

pub(crate) fn search_request() -> SearchRequest {
    SearchRequest::one_way("PIR", "JTR", NaiveDate::from_ymd_opt(2026, 6, 20).unwrap(), 2)
}

/// A sailing on 2026-06-20 departing at `hour:minute` UTC.
pub(crate) fn sailing(operator: &str, route: &str, price: i64, hour: u32, minute: u32) -> SearchResult {
    let departure = Utc.with_ymd_and_hms(2026, 6, 20, hour, minute, 0).unwrap();
    SearchResult {
        operator_code: operator.to_string(),
        route_id: route.to_string(),
        departure_time: departure,
        arrival_time: departure + chrono::Duration::hours(5),
        duration_minutes: 300,
        available_seats: 100,
        available_vehicles: 10,
        base_price: Decimal::new(price, 0),
        currency: "EUR".to_string(),
        booking_reference: None,
        amenities: Vec::new(),
        vessel_name: format!("{} vessel", operator),
    }
}
