//! Capability interface implemented once per operator integration style.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::booking::{BookingConfirmation, BookingRequest};
use crate::operator::IntegrationPattern;
use crate::search::{SearchRequest, SearchResult};

/// Failures raised at the adapter boundary. They are values handed to the
/// orchestrator, never allowed to cross into another operator's task.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Timeout occurred after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP {status_code}: {reason}")]
    HttpStatus { status_code: u16, reason: String },

    #[error("Invalid response format: {reason}")]
    InvalidResponse { reason: String },

    #[error("Configuration error for operator {operator_code}: {reason}")]
    Config { operator_code: String, reason: String },

    #[error("Authentication failed for operator {operator_code}")]
    AuthenticationFailed { operator_code: String },

    #[error("Unsupported operation: {operation} for operator {operator_code}")]
    UnsupportedOperation { operation: String, operator_code: String },

    #[error("Adapter for operator {operator_code} has been shut down")]
    ShutDown { operator_code: String },
}

impl AdapterError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, AdapterError::Timeout { .. })
    }

    /// The adapter was retired by a reload. Says nothing about the operator.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, AdapterError::ShutDown { .. })
    }

    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse { reason: reason.into() }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            AdapterError::HttpStatus { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

pub type AdapterResult<T> = Result<T, AdapterError>;

/// One ferry operator behind a normalized search/booking surface.
///
/// Implementations enforce their own request timeout and translate every
/// transport, protocol or parse failure into an [`AdapterError`]. A response
/// body that cannot be read as a whole yields an error, never a partial list;
/// individual malformed entries inside a readable body are skipped.
#[async_trait]
pub trait OperatorAdapter: Send + Sync {
    fn operator_code(&self) -> &str;

    fn integration(&self) -> IntegrationPattern;

    /// Per-operator time budget for one search call.
    fn timeout(&self) -> Duration;

    async fn search(&self, request: &SearchRequest) -> AdapterResult<Vec<SearchResult>>;

    /// Cheap liveness probe with no side effects on booking state.
    async fn health_check(&self) -> AdapterResult<bool>;

    async fn create_booking(&self, _request: &BookingRequest) -> AdapterResult<BookingConfirmation> {
        Err(AdapterError::UnsupportedOperation {
            operation: "create_booking".to_string(),
            operator_code: self.operator_code().to_string(),
        })
    }

    async fn get_booking_status(&self, _booking_reference: &str) -> AdapterResult<BookingConfirmation> {
        Err(AdapterError::UnsupportedOperation {
            operation: "get_booking_status".to_string(),
            operator_code: self.operator_code().to_string(),
        })
    }

    async fn cancel_booking(&self, _booking_reference: &str) -> AdapterResult<BookingConfirmation> {
        Err(AdapterError::UnsupportedOperation {
            operation: "cancel_booking".to_string(),
            operator_code: self.operator_code().to_string(),
        })
    }

    /// Release pooled network resources. Calls made afterwards fail with
    /// [`AdapterError::ShutDown`].
    async fn shutdown(&self) {}
}
