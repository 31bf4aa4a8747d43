use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Liveness state of one operator. There is no terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Unknown => "unknown",
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdapterHealthStatus {
    pub operator_code: String,
    pub state: HealthState,
    /// Unknown operators count as healthy so they still receive traffic.
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub last_checked: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl AdapterHealthStatus {
    pub fn unknown(operator_code: &str) -> Self {
        Self {
            operator_code: operator_code.to_string(),
            state: HealthState::Unknown,
            healthy: true,
            consecutive_failures: 0,
            last_checked: None,
            last_error: None,
        }
    }

    pub fn set_state(&mut self, state: HealthState) {
        self.state = state;
        self.healthy = state != HealthState::Unhealthy;
    }
}
