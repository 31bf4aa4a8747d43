use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, CoreResult};

pub const MAX_PASSENGERS_PER_SEARCH: u32 = 20;
pub const MAX_VEHICLES_PER_SEARCH: u32 = 5;
pub const MAX_PORT_CODE_LEN: usize = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PassengerCategory {
    Adult,
    Child,
    Infant,
    Senior,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VehicleCategory {
    Car,
    Motorcycle,
    Camper,
    Truck,
    Bus,
}

/// Normalized itinerary handed to every operator adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchRequest {
    pub departure_port: String,
    pub arrival_port: String,
    pub departure_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub passenger_count: u32,
    #[serde(default)]
    pub vehicle_count: u32,
    #[serde(default)]
    pub passenger_types: BTreeMap<PassengerCategory, u32>,
    #[serde(default)]
    pub vehicle_types: BTreeMap<VehicleCategory, u32>,
    /// Restrict the fan-out to these operator codes. Empty means every operator.
    #[serde(default)]
    pub preferred_operators: Vec<String>,
    pub max_price: Option<Decimal>,
    /// Preferred display currency. Forwarded to aggregator platforms and part
    /// of the cache key; results keep the operator's own currency.
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "EUR".to_string()
}

impl SearchRequest {
    /// One-way search with adults only.
    pub fn one_way(departure_port: &str, arrival_port: &str, departure_date: NaiveDate, passengers: u32) -> Self {
        Self {
            departure_port: departure_port.to_string(),
            arrival_port: arrival_port.to_string(),
            departure_date,
            return_date: None,
            passenger_count: passengers,
            vehicle_count: 0,
            passenger_types: BTreeMap::new(),
            vehicle_types: BTreeMap::new(),
            preferred_operators: Vec::new(),
            max_price: None,
            currency: default_currency(),
        }
    }

    /// Check the request invariants against the caller's notion of "today".
    pub fn validate(&self, today: NaiveDate) -> CoreResult<()> {
        for (label, code) in [("departure_port", &self.departure_port), ("arrival_port", &self.arrival_port)] {
            if code.trim().is_empty() {
                return Err(CoreError::ValidationError(format!("{} is required", label)));
            }
            if code.len() > MAX_PORT_CODE_LEN {
                return Err(CoreError::ValidationError(format!(
                    "{} must be at most {} characters",
                    label, MAX_PORT_CODE_LEN
                )));
            }
        }

        if self.departure_port.eq_ignore_ascii_case(&self.arrival_port) {
            return Err(CoreError::ValidationError(
                "Departure and arrival ports must differ".to_string(),
            ));
        }

        if self.departure_date < today {
            return Err(CoreError::ValidationError(
                "Departure date cannot be in the past".to_string(),
            ));
        }

        if let Some(return_date) = self.return_date {
            if return_date <= self.departure_date {
                return Err(CoreError::ValidationError(
                    "Return date must be after departure date".to_string(),
                ));
            }
        }

        if self.passenger_count == 0 || self.passenger_count > MAX_PASSENGERS_PER_SEARCH {
            return Err(CoreError::ValidationError(format!(
                "Passenger count must be between 1 and {}",
                MAX_PASSENGERS_PER_SEARCH
            )));
        }

        if self.vehicle_count > MAX_VEHICLES_PER_SEARCH {
            return Err(CoreError::ValidationError(format!(
                "Vehicle count must be at most {}",
                MAX_VEHICLES_PER_SEARCH
            )));
        }

        if !self.passenger_types.is_empty() {
            let total = category_total("Passenger", self.passenger_types.values())?;
            if total != self.passenger_count {
                return Err(CoreError::ValidationError(format!(
                    "Passenger categories add up to {} but passenger count is {}",
                    total, self.passenger_count
                )));
            }
        }

        if !self.vehicle_types.is_empty() {
            let total = category_total("Vehicle", self.vehicle_types.values())?;
            if total != self.vehicle_count {
                return Err(CoreError::ValidationError(format!(
                    "Vehicle categories add up to {} but vehicle count is {}",
                    total, self.vehicle_count
                )));
            }
        }

        Ok(())
    }

    /// True when the operator may be queried for this request.
    pub fn wants_operator(&self, operator_code: &str) -> bool {
        self.preferred_operators.is_empty()
            || self.preferred_operators.iter().any(|c| c.eq_ignore_ascii_case(operator_code))
    }

    /// Stable key for caching an aggregated response.
    pub fn cache_key(&self) -> String {
        let passengers = self
            .passenger_types
            .iter()
            .map(|(k, v)| format!("{:?}={}", k, v))
            .collect::<Vec<_>>()
            .join(",");
        let vehicles = self
            .vehicle_types
            .iter()
            .map(|(k, v)| format!("{:?}={}", k, v))
            .collect::<Vec<_>>()
            .join(",");
        let mut operators = self.preferred_operators.iter().map(|c| c.to_uppercase()).collect::<Vec<_>>();
        operators.sort();

        format!(
            "search:{}:{}:{}:{}:{}:{}:{}:{}:{}:{}:{}",
            self.departure_port.to_uppercase(),
            self.arrival_port.to_uppercase(),
            self.departure_date,
            self.return_date.map(|d| d.to_string()).unwrap_or_default(),
            self.passenger_count,
            self.vehicle_count,
            passengers,
            vehicles,
            operators.join(","),
            self.max_price.map(|p| p.normalize().to_string()).unwrap_or_default(),
            self.currency.to_uppercase(),
        )
    }
}

/// Category counts come straight from client JSON, so the sum is checked.
fn category_total<'a>(label: &str, mut counts: impl Iterator<Item = &'a u32>) -> CoreResult<u32> {
    counts
        .try_fold(0u32, |acc, count| acc.checked_add(*count))
        .ok_or_else(|| CoreError::ValidationError(format!("{} category counts are out of range", label)))
}

/// One sailing, normalized across operators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub operator_code: String,
    pub route_id: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub duration_minutes: u32,
    pub available_seats: u32,
    pub available_vehicles: u32,
    pub base_price: Decimal,
    pub currency: String,
    pub booking_reference: Option<String>,
    pub amenities: Vec<String>,
    pub vessel_name: String,
}

/// What happened to one operator during a search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OperatorOutcome {
    Succeeded { result_count: usize, elapsed_ms: u64 },
    Failed { error: String, elapsed_ms: u64 },
    TimedOut { timeout_ms: u64 },
    SkippedUnhealthy,
}

impl OperatorOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            OperatorOutcome::Succeeded { .. } => "succeeded",
            OperatorOutcome::Failed { .. } => "failed",
            OperatorOutcome::TimedOut { .. } => "timed_out",
            OperatorOutcome::SkippedUnhealthy => "skipped_unhealthy",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, OperatorOutcome::Failed { .. } | OperatorOutcome::TimedOut { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregatedSearchResponse {
    pub search_id: Uuid,
    pub results: Vec<SearchResult>,
    pub total_results: usize,
    pub request: SearchRequest,
    pub completed_at: DateTime<Utc>,
    pub outcomes: BTreeMap<String, OperatorOutcome>,
}

impl AggregatedSearchResponse {
    pub fn new(
        request: SearchRequest,
        results: Vec<SearchResult>,
        outcomes: BTreeMap<String, OperatorOutcome>,
    ) -> Self {
        Self {
            search_id: Uuid::new_v4(),
            total_results: results.len(),
            results,
            request,
            completed_at: Utc::now(),
            outcomes,
        }
    }

    pub fn empty(request: SearchRequest) -> Self {
        Self::new(request, Vec::new(), BTreeMap::new())
    }

    pub fn outcome(&self, operator_code: &str) -> Option<&OperatorOutcome> {
        self.outcomes.get(operator_code)
    }

    /// Every dispatched operator answered. Only such responses are safe to
    /// replay from a cache: a skipped or failed operator must be retried on
    /// the next search.
    pub fn is_complete(&self) -> bool {
        !self.outcomes.is_empty()
            && self
                .outcomes
                .values()
                .all(|o| matches!(o, OperatorOutcome::Succeeded { .. }))
    }

    pub fn failed_operators(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.is_failure())
            .map(|(code, _)| code.as_str())
            .collect()
    }
}
