pub mod aggregator;
pub mod direct;
pub mod http;
mod parse;

use std::sync::Arc;

use ferry_core::booking::{BookingConfirmation, OperatorBookingStatus};
use ferry_core::{AdapterError, AdapterResult, IntegrationPattern, OperatorAdapter, OperatorConfig};
use serde_json::Value;

pub use aggregator::AggregatorProxyAdapter;
pub use direct::DirectOperatorAdapter;
pub use http::TransportSettings;

/// Build the adapter matching the operator's integration pattern.
pub fn build_adapter(config: &OperatorConfig, settings: &TransportSettings) -> AdapterResult<Arc<dyn OperatorAdapter>> {
    if config.code.trim().is_empty() {
        return Err(AdapterError::Config {
            operator_code: config.code.clone(),
            reason: "operator code must not be empty".to_string(),
        });
    }

    let adapter: Arc<dyn OperatorAdapter> = match config.integration {
        IntegrationPattern::Direct => Arc::new(DirectOperatorAdapter::new(config, settings)?),
        IntegrationPattern::Aggregator => Arc::new(AggregatorProxyAdapter::new(config, settings)?),
    };
    Ok(adapter)
}

/// Names of the reservation fields in an operator's booking responses.
pub(crate) struct ConfirmationFields {
    pub reference: &'static str,
    pub status: &'static str,
    pub price: &'static str,
}

pub(crate) fn booking_confirmation(
    operator_code: &str,
    default_currency: &str,
    body: &Value,
    fields: &ConfirmationFields,
) -> AdapterResult<BookingConfirmation> {
    let booking_reference = parse::required_id(body, fields.reference).map_err(AdapterError::invalid_response)?;

    let status = match parse::optional_str(body, fields.status) {
        None => OperatorBookingStatus::Pending,
        Some(raw) => serde_json::from_value(Value::String(raw.to_ascii_lowercase()))
            .map_err(|_| AdapterError::invalid_response(format!("unknown booking status '{}'", raw)))?,
    };

    let total_price = match body.get(fields.price) {
        None | Some(Value::Null) => None,
        Some(_) => Some(parse::price(body, fields.price).map_err(AdapterError::invalid_response)?),
    };

    Ok(BookingConfirmation {
        operator_code: operator_code.to_string(),
        booking_reference,
        status,
        total_price,
        currency: Some(parse::optional_str(body, "currency").unwrap_or_else(|| default_currency.to_string())),
    })
}
