use std::net::SocketAddr;
use std::sync::Arc;

use ferry_api::{
    app,
    state::{ApiSettings, AppState, AuthConfig},
};
use ferry_integration::{
    AdapterRegistry, HealthMonitor, HealthMonitorConfig, HealthProbeScheduler, SearchMetrics, SearchOrchestrator,
    TransportSettings,
};
use ferry_shared::models::OperatorHealthChangedEvent;
use ferry_store::app_config::{Config, IntegrationConfig};
use ferry_store::{DbClient, EventProducer, OperatorConfigSource, PgOperatorRepository, RedisClient, StaticOperatorSource};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ferry_api=debug,ferry_integration=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().expect("Failed to load config");
    tracing::info!("Starting Ferry API on port {}", config.server.port);

    // Operator configs: Postgres when configured, otherwise the static list
    let operator_source: Arc<dyn OperatorConfigSource> = match &config.database {
        Some(database) => {
            let db = DbClient::new(database.url.expose())
                .await
                .expect("Failed to connect to Postgres");
            if database.run_migrations {
                db.migrate().await.expect("Failed to run migrations");
            }
            Arc::new(PgOperatorRepository::new(db.pool.clone()))
        }
        None => Arc::new(StaticOperatorSource::new(config.operators.clone())),
    };

    let operators = operator_source.load_operators().await.unwrap_or_else(|e| {
        tracing::error!("Failed to load operator configs, starting with none: {}", e);
        Vec::new()
    });

    let integration = &config.integration;
    let registry = Arc::new(AdapterRegistry::initialize(&operators, transport_settings(integration)));
    let health = Arc::new(HealthMonitor::new(HealthMonitorConfig {
        failure_threshold: integration.failure_threshold,
        probe_timeout: integration.probe_timeout(),
    }));

    let metrics_registry = prometheus::Registry::new();
    let search_metrics = SearchMetrics::new(&metrics_registry).expect("Failed to register metrics");

    let orchestrator = Arc::new(
        SearchOrchestrator::new(Arc::clone(&registry), Arc::clone(&health), integration.default_timeout())
            .with_metrics(search_metrics),
    );

    let scheduler = HealthProbeScheduler::start(
        Arc::clone(&registry),
        Arc::clone(&health),
        integration.health_check_interval(),
    );

    // Kafka is optional: health transitions are published when it is configured
    if let Some(kafka) = &config.kafka {
        let producer = EventProducer::new(&kafka.brokers).expect("Failed to create Kafka producer");
        tokio::spawn(forward_health_events(health.subscribe(), producer));
    }

    let mut app_state = AppState::new(
        orchestrator,
        operator_source,
        metrics_registry,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    )
    .with_settings(ApiSettings {
        cache_ttl_seconds: integration.cache_ttl_seconds,
        rate_limit_per_minute: config.server.rate_limit_per_minute,
    });

    if let Some(redis) = &config.redis {
        let redis_client = RedisClient::new(redis.url.expose()).expect("Failed to create Redis client");
        app_state = app_state.with_redis(Arc::new(redis_client));
    }

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Shutting down operator integrations");
    scheduler.stop().await;
    registry.shutdown().await;
}

fn transport_settings(integration: &IntegrationConfig) -> TransportSettings {
    TransportSettings {
        default_timeout: integration.default_timeout(),
        booking_timeout: integration.booking_timeout(),
        probe_timeout: integration.probe_timeout(),
        connect_timeout: integration.connect_timeout(),
        pool_max_idle_per_host: integration.pool_max_idle_per_host,
        ..TransportSettings::default()
    }
}

async fn forward_health_events(mut events: broadcast::Receiver<OperatorHealthChangedEvent>, producer: EventProducer) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Err(e) = producer
                    .publish_json(OperatorHealthChangedEvent::topic(), &event.operator_code, &event)
                    .await
                {
                    tracing::error!("Failed to publish health event: {}", e);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Health event forwarder lagged, {} events dropped", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
