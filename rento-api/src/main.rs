use anyhow::Context;
use rento_api::{
    app,
    metrics::{Metrics, MetricsEventSink},
    middleware::JwtIdentityProvider,
    AppState, RateLimitSettings,
};
use rento_booking::{BookingOrchestrator, Repositories};
use rento_catalog::PricingEngine;
use rento_core::events::{EventSink, LogEventSink};
use rento_core::rate_limit::RateLimitStore;
use rento_store::app_config::{Config, StorageBackend};
use rento_store::{
    DbClient, MemoryRateLimitStore, MemoryStore, PgBookingRepository, PgLedgerRepository,
    PgListingRepository, RedisRateLimitStore,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "rento_api=debug,rento_booking=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!(
        "Starting Rento API on port {} ({})",
        config.server.port,
        config.server.environment
    );

    let repos = repositories(&config).await?;

    let gateway = rento_gateway::build_gateway(config.payment.provider, config.payment.gateway_config())
        .context("Failed to build payment gateway")?;

    let rate_limiter: Arc<dyn RateLimitStore> = match &config.redis.url {
        Some(url) => Arc::new(RedisRateLimitStore::new(url).context("Invalid Redis URL")?),
        None => {
            tracing::info!("Redis not configured, rate limiting per instance");
            Arc::new(MemoryRateLimitStore::new())
        }
    };

    let metrics = Arc::new(Metrics::new().context("Failed to register metrics")?);
    let events: Arc<dyn EventSink> = Arc::new(MetricsEventSink::new(metrics.clone(), event_sink(&config)?));

    let orchestrator = BookingOrchestrator::new(
        repos,
        gateway,
        events,
        PricingEngine::new(config.pricing.clone()),
    )
    .with_gateway_timeout(config.payment.timeout());

    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        identity: Arc::new(JwtIdentityProvider::new(&config.auth.jwt_secret)),
        rate_limiter,
        rate_limit: RateLimitSettings {
            max_requests: config.rate_limit.max_requests,
            window: config.rate_limit.window(),
        },
        metrics,
        production: config.server.is_production(),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    Ok(())
}

async fn repositories(config: &Config) -> anyhow::Result<Repositories> {
    match config.storage.backend {
        StorageBackend::Postgres => {
            let db = DbClient::new(&config.database.url, config.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;

            let listings = Arc::new(PgListingRepository::new(db.pool.clone()));
            Ok(Repositories {
                listings: listings.clone(),
                profiles: listings,
                bookings: Arc::new(PgBookingRepository::new(db.pool.clone())),
                ledger: Arc::new(PgLedgerRepository::new(db.pool.clone())),
            })
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Ok(Repositories::shared(Arc::new(MemoryStore::new())))
        }
    }
}

#[cfg(feature = "kafka")]
fn event_sink(config: &Config) -> anyhow::Result<Arc<dyn EventSink>> {
    match &config.kafka.brokers {
        Some(brokers) => {
            let sink = rento_store::KafkaEventSink::new(brokers, &config.kafka.topic)
                .context("Failed to create Kafka producer")?;
            tracing::info!("Publishing events to Kafka topic {}", config.kafka.topic);
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(LogEventSink)),
    }
}

#[cfg(not(feature = "kafka"))]
fn event_sink(config: &Config) -> anyhow::Result<Arc<dyn EventSink>> {
    if config.kafka.brokers.is_some() {
        tracing::warn!("Kafka brokers configured but the kafka feature is disabled; logging events only");
    }
    Ok(Arc::new(LogEventSink))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
