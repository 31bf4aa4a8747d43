//! Adapter for operators sold through an aggregator platform.
//!
//! The platform takes a normalized itinerary plus the operator filter, and
//! authenticates with a bearer token.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use ferry_core::booking::{BookingConfirmation, BookingRequest};
use ferry_core::search::{PassengerCategory, VehicleCategory};
use ferry_core::{
    AdapterError, AdapterResult, IntegrationPattern, OperatorAdapter, OperatorConfig, SearchRequest, SearchResult,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::http::{AuthScheme, OperatorTransport, TransportSettings};
use super::{booking_confirmation, parse, ConfirmationFields};

pub const DEFAULT_AGGREGATOR_BASE_URL: &str = "https://api.lyko.tech/v1";

const AGGREGATOR_BOOKING_FIELDS: ConfirmationFields = ConfirmationFields {
    reference: "booking_reference",
    status: "status",
    price: "total_price",
};

#[derive(Debug, Serialize)]
struct AggregatorSearchPayload<'a> {
    departure_port: &'a str,
    arrival_port: &'a str,
    departure_date: NaiveDate,
    return_date: Option<NaiveDate>,
    passengers: u32,
    vehicles: u32,
    passenger_types: &'a BTreeMap<PassengerCategory, u32>,
    vehicle_types: &'a BTreeMap<VehicleCategory, u32>,
    currency: &'a str,
    operators: [&'a str; 1],
}

#[derive(Debug, Serialize)]
struct AggregatorBookingPayload<'a> {
    operator: &'a str,
    #[serde(flatten)]
    booking: &'a BookingRequest,
}

pub struct AggregatorProxyAdapter {
    operator_code: String,
    default_currency: String,
    transport: OperatorTransport,
    booking_timeout: Duration,
}

impl AggregatorProxyAdapter {
    pub fn new(config: &OperatorConfig, settings: &TransportSettings) -> AdapterResult<Self> {
        let token = config.api_key.clone().ok_or_else(|| AdapterError::Config {
            operator_code: config.code.clone(),
            reason: "aggregator integration requires an api_key".to_string(),
        })?;
        let base_url = config.endpoint.as_deref().unwrap_or(DEFAULT_AGGREGATOR_BASE_URL);

        let transport = OperatorTransport::new(
            &config.code,
            base_url,
            AuthScheme::Bearer(token),
            config.timeout_or(settings.default_timeout),
            settings,
        )?;

        Ok(Self {
            operator_code: config.code.clone(),
            default_currency: config.currency().to_string(),
            transport,
            booking_timeout: settings.booking_timeout,
        })
    }

    fn parse_search_response(&self, body: &Value) -> AdapterResult<Vec<SearchResult>> {
        let entries = parse::entries(body, "results")?;
        let mut results = Vec::with_capacity(entries.len());

        for entry in entries {
            match self.map_entry(entry) {
                Ok(result) => results.push(result),
                Err(reason) => {
                    warn!(operator = %self.operator_code, %reason, "Skipping malformed aggregator result");
                }
            }
        }

        Ok(results)
    }

    fn map_entry(&self, entry: &Value) -> parse::EntryResult<SearchResult> {
        let departure_time = parse::timestamp(entry, "departure_time")?;
        let arrival_time = parse::timestamp(entry, "arrival_time")?;

        Ok(SearchResult {
            operator_code: parse::optional_str(entry, "operator_code").unwrap_or_else(|| self.operator_code.clone()),
            route_id: parse::required_id(entry, "route_id")?,
            departure_time,
            arrival_time,
            duration_minutes: parse::duration_minutes(entry, "duration_minutes", departure_time, arrival_time)?,
            available_seats: parse::count(entry, "available_seats", Some(0))?,
            available_vehicles: parse::count(entry, "available_vehicles", Some(0))?,
            base_price: parse::price(entry, "price")?,
            currency: parse::optional_str(entry, "currency").unwrap_or_else(|| self.default_currency.clone()),
            booking_reference: parse::optional_str(entry, "booking_reference"),
            amenities: parse::string_list(entry, "amenities"),
            vessel_name: parse::optional_str(entry, "vessel_name").unwrap_or_default(),
        })
    }
}

#[async_trait]
impl OperatorAdapter for AggregatorProxyAdapter {
    fn operator_code(&self) -> &str {
        &self.operator_code
    }

    fn integration(&self) -> IntegrationPattern {
        IntegrationPattern::Aggregator
    }

    fn timeout(&self) -> Duration {
        self.transport.timeout()
    }

    async fn search(&self, request: &SearchRequest) -> AdapterResult<Vec<SearchResult>> {
        let payload = AggregatorSearchPayload {
            departure_port: &request.departure_port,
            arrival_port: &request.arrival_port,
            departure_date: request.departure_date,
            return_date: request.return_date,
            passengers: request.passenger_count,
            vehicles: request.vehicle_count,
            passenger_types: &request.passenger_types,
            vehicle_types: &request.vehicle_types,
            currency: &request.currency,
            operators: [self.operator_code.as_str()],
        };

        debug!(operator = %self.operator_code, "Searching aggregator platform");
        let body = self.transport.post_json("search", &payload, self.transport.timeout()).await?;
        self.parse_search_response(&body)
    }

    async fn health_check(&self) -> AdapterResult<bool> {
        self.transport.probe("health").await
    }

    async fn create_booking(&self, request: &BookingRequest) -> AdapterResult<BookingConfirmation> {
        let payload = AggregatorBookingPayload {
            operator: &self.operator_code,
            booking: request,
        };
        let body = self.transport.post_json("bookings", &payload, self.booking_timeout).await?;
        booking_confirmation(&self.operator_code, &self.default_currency, &body, &AGGREGATOR_BOOKING_FIELDS)
    }

    async fn get_booking_status(&self, booking_reference: &str) -> AdapterResult<BookingConfirmation> {
        let body = self
            .transport
            .get_json(&format!("bookings/{}", booking_reference), self.booking_timeout)
            .await?;
        booking_confirmation(&self.operator_code, &self.default_currency, &body, &AGGREGATOR_BOOKING_FIELDS)
    }

    async fn cancel_booking(&self, booking_reference: &str) -> AdapterResult<BookingConfirmation> {
        let body = self
            .transport
            .post_json(&format!("bookings/{}/cancel", booking_reference), &Value::Null, self.booking_timeout)
            .await?;
        booking_confirmation(&self.operator_code, &self.default_currency, &body, &AGGREGATOR_BOOKING_FIELDS)
    }

    async fn shutdown(&self) {
        self.transport.close().await;
    }
}
