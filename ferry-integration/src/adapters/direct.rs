//! Adapter for operators exposing their own reservation API.
//!
//! Direct APIs use a compact itinerary payload and an API key header. Fares
//! come back in the operator's own currency.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use ferry_core::booking::{BookingConfirmation, BookingRequest};
use ferry_core::{
    AdapterError, AdapterResult, IntegrationPattern, OperatorAdapter, OperatorConfig, SearchRequest, SearchResult,
};
use reqwest::header::HeaderName;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::http::{AuthScheme, OperatorTransport, TransportSettings};
use super::{booking_confirmation, parse, ConfirmationFields};

pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

const RESERVATION_FIELDS: ConfirmationFields = ConfirmationFields {
    reference: "reservation_id",
    status: "status",
    price: "total_fare",
};

#[derive(Debug, Serialize)]
struct DirectSearchPayload<'a> {
    from: &'a str,
    to: &'a str,
    date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    return_date: Option<NaiveDate>,
    passengers: u32,
    vehicles: u32,
}

pub struct DirectOperatorAdapter {
    operator_code: String,
    default_currency: String,
    transport: OperatorTransport,
    booking_timeout: Duration,
}

impl DirectOperatorAdapter {
    pub fn new(config: &OperatorConfig, settings: &TransportSettings) -> AdapterResult<Self> {
        let config_error = |reason: &str| AdapterError::Config {
            operator_code: config.code.clone(),
            reason: reason.to_string(),
        };

        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| config_error("direct integration requires an endpoint"))?;
        let key = config
            .api_key
            .clone()
            .ok_or_else(|| config_error("direct integration requires an api_key"))?;
        let header = HeaderName::from_bytes(
            config
                .api_key_header
                .as_deref()
                .unwrap_or(DEFAULT_API_KEY_HEADER)
                .as_bytes(),
        )
        .map_err(|_| config_error("api_key_header is not a valid header name"))?;

        let transport = OperatorTransport::new(
            &config.code,
            endpoint,
            AuthScheme::ApiKey { header, key },
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
        let sailings = parse::entries(body, "sailings")?;

        let results: Vec<SearchResult> = sailings
            .iter()
            .filter_map(|sailing| match self.map_sailing(sailing) {
                Ok(result) => Some(result),
                Err(reason) => {
                    warn!(operator = %self.operator_code, %reason, "Skipping malformed sailing");
                    None
                }
            })
            .collect();

        Ok(results)
    }

    fn map_sailing(&self, sailing: &Value) -> parse::EntryResult<SearchResult> {
        let departure_time = parse::timestamp(sailing, "departure")?;
        let arrival_time = parse::timestamp(sailing, "arrival")?;

        Ok(SearchResult {
            operator_code: self.operator_code.clone(),
            route_id: parse::required_id(sailing, "route_id")?,
            departure_time,
            arrival_time,
            duration_minutes: parse::duration_minutes(sailing, "duration", departure_time, arrival_time)?,
            available_seats: parse::count(sailing, "seats_available", Some(0))?,
            available_vehicles: parse::count(sailing, "vehicles_available", Some(0))?,
            base_price: parse::price(sailing, "fare")?,
            currency: parse::optional_str(sailing, "currency").unwrap_or_else(|| self.default_currency.clone()),
            booking_reference: parse::optional_str(sailing, "hold_reference"),
            amenities: parse::string_list(sailing, "services"),
            vessel_name: parse::optional_str(sailing, "vessel").unwrap_or_default(),
        })
    }
}

#[async_trait]
impl OperatorAdapter for DirectOperatorAdapter {
    fn operator_code(&self) -> &str {
        &self.operator_code
    }

    fn integration(&self) -> IntegrationPattern {
        IntegrationPattern::Direct
    }

    fn timeout(&self) -> Duration {
        self.transport.timeout()
    }

    async fn search(&self, request: &SearchRequest) -> AdapterResult<Vec<SearchResult>> {
        let payload = DirectSearchPayload {
            from: &request.departure_port,
            to: &request.arrival_port,
            date: request.departure_date,
            return_date: request.return_date,
            passengers: request.passenger_count,
            vehicles: request.vehicle_count,
        };

        debug!(operator = %self.operator_code, "Searching operator API");
        let body = self.transport.post_json("search", &payload, self.transport.timeout()).await?;
        self.parse_search_response(&body)
    }

    async fn health_check(&self) -> AdapterResult<bool> {
        self.transport.probe("status").await
    }

    async fn create_booking(&self, request: &BookingRequest) -> AdapterResult<BookingConfirmation> {
        let body = self.transport.post_json("reservations", request, self.booking_timeout).await?;
        booking_confirmation(&self.operator_code, &self.default_currency, &body, &RESERVATION_FIELDS)
    }

    async fn get_booking_status(&self, booking_reference: &str) -> AdapterResult<BookingConfirmation> {
        let body = self
            .transport
            .get_json(&format!("reservations/{}", booking_reference), self.booking_timeout)
            .await?;
        booking_confirmation(&self.operator_code, &self.default_currency, &body, &RESERVATION_FIELDS)
    }

    async fn cancel_booking(&self, booking_reference: &str) -> AdapterResult<BookingConfirmation> {
        let body = self
            .transport
            .delete_json(&format!("reservations/{}", booking_reference), self.booking_timeout)
            .await?;
        booking_confirmation(&self.operator_code, &self.default_currency, &body, &RESERVATION_FIELDS)
    }

    async fn shutdown(&self) {
        self.transport.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::booking::OperatorBookingStatus;
    use rust_decimal::Decimal;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(endpoint: Option<&str>) -> OperatorConfig {
        let mut config = OperatorConfig::new("CTN", IntegrationPattern::Direct, endpoint);
        config.api_key = Some("ctn-key".into());
        config.default_currency = Some("TND".to_string());
        config
    }

    fn request() -> SearchRequest {
        SearchRequest::one_way("TUN", "MRS", NaiveDate::from_ymd_opt(2026, 8, 14).unwrap(), 3)
    }

    fn sailing(route: Value, fare: Value) -> Value {
        json!({
            "route_id": route,
            "departure": "2026-08-14T12:00:00",
            "arrival": "2026-08-15T10:00:00",
            "duration": 1320,
            "seats_available": 300,
            "vehicles_available": 40,
            "fare": fare,
            "services": ["wifi"],
            "vessel": "Carthage"
        })
    }

    #[test]
    fn test_endpoint_is_required() {
        assert!(matches!(
            DirectOperatorAdapter::new(&config(None), &TransportSettings::default()),
            Err(AdapterError::Config { .. })
        ));
    }

    #[test]
    fn test_invalid_key_header_is_rejected() {
        let mut cfg = config(Some("https://ctn.example/api"));
        cfg.api_key_header = Some("bad header".to_string());
        assert!(matches!(
            DirectOperatorAdapter::new(&cfg, &TransportSettings::default()),
            Err(AdapterError::Config { .. })
        ));
    }

    #[tokio::test]
    async fn test_search_maps_sailings_with_operator_currency() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("x-api-key", "ctn-key"))
            .and(body_json(json!({
                "from": "TUN",
                "to": "MRS",
                "date": "2026-08-14",
                "passengers": 3,
                "vehicles": 0
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sailings": [sailing(json!(7001), json!("412.500"))]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = DirectOperatorAdapter::new(&config(Some(&server.uri())), &TransportSettings::default()).unwrap();
        let results = adapter.search(&request()).await.unwrap();

        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.operator_code, "CTN");
        assert_eq!(result.route_id, "7001");
        assert_eq!(result.currency, "TND");
        assert_eq!(result.base_price, Decimal::new(412500, 3));
        assert_eq!(result.duration_minutes, 1320);
        assert_eq!(result.amenities, vec!["wifi".to_string()]);
    }

    #[tokio::test]
    async fn test_three_valid_one_malformed_yields_three() {
        let server = MockServer::start().await;
        let mut broken = sailing(json!("S2"), json!(50));
        broken["departure"] = json!("whenever");

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sailings": [
                    sailing(json!("S1"), json!(40)),
                    broken,
                    sailing(json!("S3"), json!(60)),
                    sailing(json!("S4"), json!(70)),
                ]
            })))
            .mount(&server)
            .await;

        let adapter = DirectOperatorAdapter::new(&config(Some(&server.uri())), &TransportSettings::default()).unwrap();
        let results = adapter.search(&request()).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.route_id != "S2"));
    }

    #[tokio::test]
    async fn test_non_object_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["S1", "S2"])))
            .mount(&server)
            .await;

        let adapter = DirectOperatorAdapter::new(&config(Some(&server.uri())), &TransportSettings::default()).unwrap();
        assert!(adapter.search(&request()).await.is_err());
    }

    #[tokio::test]
    async fn test_search_after_shutdown_fails() {
        let server = MockServer::start().await;
        let adapter = DirectOperatorAdapter::new(&config(Some(&server.uri())), &TransportSettings::default()).unwrap();

        adapter.shutdown().await;
        assert!(matches!(
            adapter.search(&request()).await,
            Err(AdapterError::ShutDown { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_uses_delete() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/reservations/CTN-88"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "reservation_id": "CTN-88",
                "status": "cancelled",
                "total_fare": 120
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = DirectOperatorAdapter::new(&config(Some(&server.uri())), &TransportSettings::default()).unwrap();
        let confirmation = adapter.cancel_booking("CTN-88").await.unwrap();
        assert_eq!(confirmation.status, OperatorBookingStatus::Cancelled);
        assert_eq!(confirmation.total_price, Some(Decimal::new(120, 0)));
        assert_eq!(confirmation.currency.as_deref(), Some("TND"));
    }
}
