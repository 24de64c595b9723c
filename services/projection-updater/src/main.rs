mod config;
mod consumer;
mod dispatch;
mod metrics;

use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use config::ProjectionUpdaterConfig;
use db_pool::DbConfig;
use dispatch::DispatchRegistry;
use event_log::{ConsumerSettings, KafkaEventLogConsumer};
use metrics::ProjectionMetrics;
use projection_store::{PostgresProjectionRepository, ProjectionRepository};
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
            std::env::var("RUST_LOG").unwrap_or_else(|_| "projection_updater=info,info".into()),
        )
        .with_target(false)
        .json()
        .init();

    info!("starting projection updater");

    let config = ProjectionUpdaterConfig::from_env().context("failed to load configuration")?;

    let db_config = DbConfig::for_service("projection-updater");
    let db_pool = db_pool::create_pool(db_config)
        .await
        .context("failed to create database pool")?;

    projection_store::MIGRATOR
        .run(&db_pool)
        .await
        .context("failed to run projection-store migrations")?;
    info!("database migrations completed");

    let projections: Arc<dyn ProjectionRepository> =
        Arc::new(PostgresProjectionRepository::new(db_pool.clone()));

    let consumer_settings = ConsumerSettings {
        brokers: config.kafka_brokers.clone(),
        group_id: config.consumer_group.clone(),
        topics: config.subscribed_topics.clone(),
    };
    let consumer = KafkaEventLogConsumer::new(&consumer_settings)
        .context("failed to create kafka consumer")?;

    info!(
        topics = ?config.subscribed_topics,
        group = %config.consumer_group,
        "subscribed to event log"
    );

    let registry = DispatchRegistry::with_builtin_handlers();
    let metrics = Arc::new(ProjectionMetrics::new("projection-updater"));
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

    let loop_handle = tokio::spawn(consumer::run(
        consumer,
        registry,
        projections,
        metrics,
        config.poll_timeout,
        cancel.clone(),
    ));

    shutdown_signal().await;
    info!("shutdown signal received, draining projection updater");
    cancel.cancel();

    let _ = loop_handle.await;

    metrics_handle.stop(true).await;
    let _ = metrics_task.await;

    info!("projection updater shutdown complete");
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
