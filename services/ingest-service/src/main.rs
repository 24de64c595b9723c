use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use db_pool::DbConfig;
use event_envelope::{PlatformClock, RealClock};
use ingest_service::config::IngestServiceConfig;
use ingest_service::handlers::{self, AppState};
use outbox_store::{OutboxRepository, PgOutboxRepository};
use std::sync::Arc;
use tracing::info;
use tracing_actix_web::TracingLogger;

#[actix_web::main]
async fn main() -> Result<()> {
    if cfg!(debug_assertions) {
        let _ = dotenvy::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "ingest_service=info,info".into()),
        )
        .with_target(false)
        .json()
        .init();

    info!("starting ingest service");

    let config = IngestServiceConfig::from_env().context("failed to load configuration")?;

    let db_config = DbConfig::for_service("ingest-service");
    let db_pool = db_pool::create_pool(db_config)
        .await
        .context("failed to create database pool")?;

    outbox_store::MIGRATOR
        .run(&db_pool)
        .await
        .context("failed to run outbox-store migrations")?;
    info!("database migrations completed");

    let outbox: Arc<dyn OutboxRepository> = Arc::new(PgOutboxRepository::new(db_pool.clone()));
    let clock: Arc<dyn PlatformClock> = Arc::new(RealClock);

    let state = web::Data::new(AppState {
        outbox,
        clock,
        db_pool: db_pool.clone(),
    });

    let bind_addr = (config.host.clone(), config.port);
    info!(host = %config.host, port = config.port, "binding http server");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(TracingLogger::default())
            .wrap(Cors::permissive())
            .route("/health", web::get().to(handlers::health))
            .service(
                web::resource("/api/v1/events").route(web::post().to(handlers::ingest_event)),
            )
    })
    .bind(bind_addr)?
    .shutdown_timeout(config.shutdown_timeout_secs)
    .run()
    .await
    .context("http server failed")?;

    info!("ingest service shutdown complete");
    Ok(())
}
