mod config;
mod metrics;
mod processor;

use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use config::OutboxProcessorConfig;
use db_pool::DbConfig;
use event_log::KafkaEventLog;
use event_store::PostgresEventStore;
use metrics::OutboxMetrics;
use outbox_store::{PgOutboxListener, PgOutboxRepository};
use rdkafka::config::ClientConfig;
use rdkafka::producer::FutureProducer;
use resilience::{presets, CircuitBreaker};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    if cfg!(debug_assertions) {
        let _ = dotenvy::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "outbox_processor=info,info".into()),
        )
        .with_target(false)
        .json()
        .init();

    info!("starting outbox processor");

    let config = OutboxProcessorConfig::from_env().context("failed to load configuration")?;

    let db_config = DbConfig::for_service("outbox-processor");
    let db_pool = db_pool::create_pool(db_config)
        .await
        .context("failed to create database pool")?;

    outbox_store::MIGRATOR
        .run(&db_pool)
        .await
        .context("failed to run outbox-store migrations")?;
    event_store::MIGRATOR
        .run(&db_pool)
        .await
        .context("failed to run event-store migrations")?;
    info!("database migrations completed");

    let outbox: Arc<dyn outbox_store::OutboxRepository> =
        Arc::new(PgOutboxRepository::new(db_pool.clone()));
    let event_store: Arc<dyn event_store::EventStore> =
        Arc::new(PostgresEventStore::new(db_pool.clone()));

    let producer: FutureProducer = ClientConfig::new()
        .set("bootstrap.servers", &config.kafka_brokers)
        .set("client.id", "outbox-processor")
        .set("enable.idempotence", "true")
        .set("acks", "all")
        .set("max.in.flight.requests.per.connection", "5")
        .create()
        .context("failed to create kafka producer")?;
    let event_log: Arc<dyn event_log::EventLog> = Arc::new(KafkaEventLog::new(
        producer,
        presets::kafka_config().timeout.duration,
    ));

    let circuit_breaker = CircuitBreaker::new(presets::kafka_config().circuit_breaker);

    let listener = PgOutboxListener::connect(&config.database_url)
        .await
        .context("failed to connect outbox notification listener")?;

    let metrics = Arc::new(OutboxMetrics::new("outbox-processor"));
    let cancel = CancellationToken::new();

    let metrics_server = HttpServer::new(|| {
        App::new().route("/metrics", web::get().to(metrics::serve_metrics))
    })
    .bind(("0.0.0.0", config.metrics_port))
    .context("failed to bind metrics server")?
    .run();
    let metrics_handle = metrics_server.handle();
    let metrics_task = tokio::spawn(metrics_server);
    info!(port = config.metrics_port, "serving /metrics");

    let handles = processor::spawn(
        outbox,
        event_store,
        event_log,
        circuit_breaker,
        listener,
        metrics,
        config.worker_count,
        config.batch_size,
        config.max_retries,
        config.poll_interval,
        cancel.clone(),
    );

    shutdown_signal().await;
    info!("shutdown signal received, draining outbox processor");
    cancel.cancel();

    let _ = handles.dispatcher.await;
    let _ = handles.listener.await;
    for worker in handles.workers {
        let _ = worker.await;
    }

    metrics_handle.stop(true).await;
    let _ = metrics_task.await;

    info!("outbox processor shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c signal"),
        _ = terminate => info!("received SIGTERM signal"),
    }
}
