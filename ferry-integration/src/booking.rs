//! Routes reservation calls to the owning operator's adapter.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ferry_core::booking::{BookingConfirmation, BookingRequest};
use ferry_core::AdapterError;
use tracing::{info, warn};

use crate::health::HealthMonitor;
use crate::registry::AdapterRegistry;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Operator {0} is not available")]
    OperatorUnavailable(String),

    #[error("Operator {operator_code} did not answer within {timeout_ms}ms")]
    Timeout { operator_code: String, timeout_ms: u64 },

    #[error("Operator {operator_code} rejected the request: {source}")]
    Operator {
        operator_code: String,
        #[source]
        source: AdapterError,
    },
}

pub type BookingResult<T> = Result<T, BookingError>;

pub struct BookingDispatcher {
    registry: Arc<AdapterRegistry>,
    health: Arc<HealthMonitor>,
    timeout: Duration,
}

impl BookingDispatcher {
    pub fn new(registry: Arc<AdapterRegistry>, health: Arc<HealthMonitor>, timeout: Duration) -> Self {
        Self {
            registry,
            health,
            timeout,
        }
    }

    pub async fn create_booking(&self, operator_code: &str, request: &BookingRequest) -> BookingResult<BookingConfirmation> {
        let adapter = self.adapter(operator_code).await?;
        let confirmation = self.run(operator_code, adapter.create_booking(request)).await?;
        info!(
            operator = %operator_code,
            booking_id = %request.booking_id,
            reference = %confirmation.booking_reference,
            "Operator booking created"
        );
        Ok(confirmation)
    }

    pub async fn get_booking_status(&self, operator_code: &str, booking_reference: &str) -> BookingResult<BookingConfirmation> {
        let adapter = self.adapter(operator_code).await?;
        self.run(operator_code, adapter.get_booking_status(booking_reference)).await
    }

    pub async fn cancel_booking(&self, operator_code: &str, booking_reference: &str) -> BookingResult<BookingConfirmation> {
        let adapter = self.adapter(operator_code).await?;
        let confirmation = self.run(operator_code, adapter.cancel_booking(booking_reference)).await?;
        info!(operator = %operator_code, reference = %booking_reference, "Operator booking cancelled");
        Ok(confirmation)
    }

    async fn adapter(&self, operator_code: &str) -> BookingResult<Arc<dyn ferry_core::OperatorAdapter>> {
        self.registry
            .get(operator_code)
            .await
            .ok_or_else(|| BookingError::OperatorUnavailable(operator_code.to_string()))
    }

    async fn run<F>(&self, operator_code: &str, call: F) -> BookingResult<BookingConfirmation>
    where
        F: Future<Output = Result<BookingConfirmation, AdapterError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(confirmation)) => Ok(confirmation),
            // Not health signals.
            Ok(Err(e @ (AdapterError::UnsupportedOperation { .. } | AdapterError::ShutDown { .. }))) => {
                Err(BookingError::Operator {
                    operator_code: operator_code.to_string(),
                    source: e,
                })
            }
            Ok(Err(e)) => {
                warn!(operator = %operator_code, error = %e, "Operator booking call failed");
                self.health.report_failure(operator_code, &e.to_string());
                Err(BookingError::Operator {
                    operator_code: operator_code.to_string(),
                    source: e,
                })
            }
            Err(_) => {
                let timeout_ms = self.timeout.as_millis() as u64;
                warn!(operator = %operator_code, timeout_ms, "Operator booking call timed out");
                self.health
                    .report_failure(operator_code, &format!("booking call timed out after {}ms", timeout_ms));
                Err(BookingError::Timeout {
                    operator_code: operator_code.to_string(),
                    timeout_ms,
                })
            }
        }
    }
}
