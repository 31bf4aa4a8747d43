use std::env;
use std::time::Duration;

use config::builder::DefaultState;
use config::ConfigBuilder;
use ferry_core::OperatorConfig;
use ferry_shared::Masked;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub database: Option<DatabaseConfig>,
    pub redis: Option<RedisConfig>,
    pub kafka: Option<KafkaConfig>,
    #[serde(default)]
    pub integration: IntegrationConfig,
    /// Used when no database is configured.
    #[serde(default)]
    pub operators: Vec<OperatorConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
}

fn default_rate_limit() -> i64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: Masked<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: Masked<String>,
    #[serde(default)]
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: Masked<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IntegrationConfig {
    pub default_timeout_secs: u64,
    pub booking_timeout_secs: u64,
    pub health_check_interval_secs: u64,
    pub probe_timeout_secs: u64,
    pub failure_threshold: u32,
    pub connect_timeout_secs: u64,
    pub pool_max_idle_per_host: usize,
    pub cache_ttl_seconds: u64,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 30,
            booking_timeout_secs: 60,
            health_check_interval_secs: 60,
            probe_timeout_secs: 5,
            failure_threshold: 2,
            connect_timeout_secs: 5,
            pool_max_idle_per_host: 20,
            cache_ttl_seconds: 300,
        }
    }
}

impl IntegrationConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    pub fn booking_timeout(&self) -> Duration {
        Duration::from_secs(self.booking_timeout_secs)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. FERRY__INTEGRATION__FAILURE_THRESHOLD=3
            .add_source(config::Environment::with_prefix("FERRY").separator("__"));

        Self::build(builder)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, config::ConfigError> {
        builder.build()?.try_deserialize()
    }
}
