use uuid::Uuid;

/// Published whenever the health monitor flips an operator between up and down.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct OperatorHealthChangedEvent {
    pub event_id: Uuid,
    pub operator_code: String,
    pub previous_state: String,
    pub state: String,
    pub healthy: bool,
    pub last_error: Option<String>,
    pub changed_at: i64,
}

impl OperatorHealthChangedEvent {
    pub fn new(
        operator_code: &str,
        previous_state: &str,
        state: &str,
        healthy: bool,
        last_error: Option<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            operator_code: operator_code.to_string(),
            previous_state: previous_state.to_string(),
            state: state.to_string(),
            healthy,
            last_error,
            changed_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn topic() -> &'static str {
        "operator.health"
    }
}
