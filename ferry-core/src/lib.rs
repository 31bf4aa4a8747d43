pub mod search;
pub mod operator;
pub mod adapter;
pub mod booking;
pub mod health;

pub use adapter::{AdapterError, AdapterResult, OperatorAdapter};
pub use health::{AdapterHealthStatus, HealthState};
pub use operator::{IntegrationPattern, OperatorConfig};
pub use search::{AggregatedSearchResponse, OperatorOutcome, SearchRequest, SearchResult};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
