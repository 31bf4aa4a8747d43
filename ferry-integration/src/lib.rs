pub mod adapters;
pub mod booking;
pub mod health;
pub mod metrics;
pub mod orchestrator;
pub mod registry;
pub mod scheduler;

#[cfg(test)]
mod mock;

pub use adapters::{build_adapter, TransportSettings};
pub use booking::{BookingDispatcher, BookingError, BookingResult};
pub use health::{HealthMonitor, HealthMonitorConfig};
pub use metrics::SearchMetrics;
pub use orchestrator::SearchOrchestrator;
pub use registry::{AdapterRegistry, ReloadSummary};
pub use scheduler::HealthProbeScheduler;
