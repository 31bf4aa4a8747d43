//! Sources of operator integration settings for registry (re)loads.

use async_trait::async_trait;
use ferry_core::{IntegrationPattern, OperatorConfig};
use ferry_shared::Masked;
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::StoreResult;

#[async_trait]
pub trait OperatorConfigSource: Send + Sync {
    async fn load_operators(&self) -> StoreResult<Vec<OperatorConfig>>;
}

/// Fixed list from the application config.
pub struct StaticOperatorSource {
    operators: Vec<OperatorConfig>,
}

impl StaticOperatorSource {
    pub fn new(operators: Vec<OperatorConfig>) -> Self {
        Self { operators }
    }
}

#[async_trait]
impl OperatorConfigSource for StaticOperatorSource {
    async fn load_operators(&self) -> StoreResult<Vec<OperatorConfig>> {
        Ok(self.operators.clone())
    }
}

pub struct PgOperatorRepository {
    pool: PgPool,
}

impl PgOperatorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OperatorRow {
    code: String,
    name: Option<String>,
    active: bool,
    maintenance: bool,
    integration: String,
    endpoint: Option<String>,
    api_key: Option<String>,
    api_key_header: Option<String>,
    timeout_ms: Option<i64>,
    default_currency: Option<String>,
}

impl OperatorRow {
    fn into_config(self) -> Option<OperatorConfig> {
        let integration = match self.integration.to_ascii_lowercase().as_str() {
            "direct" => IntegrationPattern::Direct,
            "aggregator" => IntegrationPattern::Aggregator,
            other => {
                warn!(operator = %self.code, integration = %other, "Unknown integration pattern, operator ignored");
                return None;
            }
        };

        Some(OperatorConfig {
            code: self.code,
            name: self.name,
            active: self.active,
            maintenance: self.maintenance,
            integration,
            endpoint: self.endpoint,
            api_key: self.api_key.map(Masked::new),
            api_key_header: self.api_key_header,
            timeout_ms: self.timeout_ms.and_then(|ms| u64::try_from(ms).ok()),
            default_currency: self.default_currency,
        })
    }
}

#[async_trait]
impl OperatorConfigSource for PgOperatorRepository {
    async fn load_operators(&self) -> StoreResult<Vec<OperatorConfig>> {
        let rows = sqlx::query_as::<_, OperatorRow>(
            r#"
            SELECT code, name, active, maintenance, integration, endpoint,
                   api_key, api_key_header, timeout_ms, default_currency
            FROM ferry_operators
            ORDER BY code
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let configs: Vec<OperatorConfig> = rows.into_iter().filter_map(OperatorRow::into_config).collect();
        debug!(count = configs.len(), "Loaded operator configs from database");
        Ok(configs)
    }
}
