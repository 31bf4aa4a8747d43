use std::time::Duration;

use ferry_shared::Masked;
use serde::{Deserialize, Serialize};

/// How the platform reaches an operator's inventory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationPattern {
    /// The operator's own reservation API.
    Direct,
    /// An aggregator platform that proxies several operators.
    #[default]
    Aggregator,
}

/// Operator integration settings, maintained outside the search core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperatorConfig {
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Operators under maintenance stay configured but receive no traffic.
    #[serde(default)]
    pub maintenance: bool,
    #[serde(default)]
    pub integration: IntegrationPattern,
    pub endpoint: Option<String>,
    pub api_key: Option<Masked<String>>,
    /// Header carrying the API key for direct integrations. Defaults to `X-API-Key`.
    #[serde(default)]
    pub api_key_header: Option<String>,
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub default_currency: Option<String>,
}

fn default_active() -> bool {
    true
}

impl OperatorConfig {
    pub fn new(code: &str, integration: IntegrationPattern, endpoint: Option<&str>) -> Self {
        Self {
            code: code.to_string(),
            name: None,
            active: true,
            maintenance: false,
            integration,
            endpoint: endpoint.map(|e| e.to_string()),
            api_key: None,
            api_key_header: None,
            timeout_ms: None,
            default_currency: None,
        }
    }

    /// Whether the registry should build an adapter for this operator.
    pub fn is_dispatchable(&self) -> bool {
        self.active && !self.maintenance
    }

    /// Per-operator timeout, falling back to the platform default.
    pub fn timeout_or(&self, default: Duration) -> Duration {
        self.timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(default)
    }

    pub fn currency(&self) -> &str {
        self.default_currency.as_deref().unwrap_or("EUR")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_config_defaults() {
        let json = r#"{ "code": "CTN", "integration": "direct", "endpoint": "https://api.ctn.example/v1", "api_key": "secret", "timeout_ms": null }"#;
        let config: OperatorConfig = serde_json::from_str(json).unwrap();
        assert!(config.active);
        assert!(!config.maintenance);
        assert_eq!(config.integration, IntegrationPattern::Direct);
        assert_eq!(config.currency(), "EUR");
        assert!(!format!("{:?}", config).contains("secret"));
    }

    #[test]
    fn test_timeout_fallback() {
        let mut config = OperatorConfig::new("GNV", IntegrationPattern::Aggregator, None);
        assert_eq!(config.timeout_or(Duration::from_secs(30)), Duration::from_secs(30));

        config.timeout_ms = Some(0);
        assert_eq!(config.timeout_or(Duration::from_secs(30)), Duration::from_secs(30));

        config.timeout_ms = Some(2500);
        assert_eq!(config.timeout_or(Duration::from_secs(30)), Duration::from_millis(2500));
    }

    #[test]
    fn test_maintenance_is_not_dispatchable() {
        let mut config = OperatorConfig::new("CORS", IntegrationPattern::Aggregator, None);
        assert!(config.is_dispatchable());

        config.maintenance = true;
        assert!(!config.is_dispatchable());

        config.maintenance = false;
        config.active = false;
        assert!(!config.is_dispatchable());
    }
}
