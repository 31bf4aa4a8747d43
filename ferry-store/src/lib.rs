pub mod app_config;
pub mod database;
pub mod events;
pub mod operator_repo;
pub mod redis_repo;

pub use database::DbClient;
pub use events::EventProducer;
pub use operator_repo::{OperatorConfigSource, PgOperatorRepository, StaticOperatorSource};
pub use redis_repo::RedisClient;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
