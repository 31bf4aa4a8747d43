use std::sync::Arc;

use ferry_integration::{AdapterRegistry, HealthMonitor, SearchOrchestrator};
use ferry_shared::Masked;
use ferry_store::{OperatorConfigSource, RedisClient};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: Masked<String>,
}

#[derive(Clone)]
pub struct ApiSettings {
    pub cache_ttl_seconds: u64,
    pub rate_limit_per_minute: i64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: 300,
            rate_limit_per_minute: 120,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SearchOrchestrator>,
    pub operator_source: Arc<dyn OperatorConfigSource>,
    /// Search cache and rate limiting. Both are skipped without Redis.
    pub redis: Option<Arc<RedisClient>>,
    pub metrics: prometheus::Registry,
    pub auth: AuthConfig,
    pub settings: ApiSettings,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<SearchOrchestrator>,
        operator_source: Arc<dyn OperatorConfigSource>,
        metrics: prometheus::Registry,
        auth: AuthConfig,
    ) -> Self {
        Self {
            orchestrator,
            operator_source,
            redis: None,
            metrics,
            auth,
            settings: ApiSettings::default(),
        }
    }

    pub fn with_redis(mut self, redis: Arc<RedisClient>) -> Self {
        self.redis = Some(redis);
        self
    }

    pub fn with_settings(mut self, settings: ApiSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        self.orchestrator.registry()
    }

    pub fn health(&self) -> &Arc<HealthMonitor> {
        self.orchestrator.health()
    }
}
