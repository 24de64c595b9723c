mod config;
mod handlers;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use config::QueryServiceConfig;
use db_pool::DbConfig;
use handlers::AppState;
use projection_store::{PostgresProjectionRepository, ProjectionRepository};
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
            std::env::var("RUST_LOG").unwrap_or_else(|_| "query_service=info,info".into()),
        )
        .with_target(false)
        .json()
        .init();

    info!("starting query service");

    let config = QueryServiceConfig::from_env().context("failed to load configuration")?;

    let db_config = DbConfig::for_service("query-service");
    let db_pool = db_pool::create_pool(db_config)
        .await
        .context("failed to create database pool")?;

    // The projections table is owned by the projection updater, which
    // runs its migrations at startup; this service only ever reads.
    let projections: Arc<dyn ProjectionRepository> =
        Arc::new(PostgresProjectionRepository::new(db_pool.clone()));

    let state = web::Data::new(AppState { projections });
    let pool_data = web::Data::new(db_pool.clone());

    let bind_addr = (config.host.clone(), config.port);
    info!(host = %config.host, port = config.port, "binding http server");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(pool_data.clone())
            .wrap(TracingLogger::default())
            .wrap(Cors::permissive())
            .route("/health", web::get().to(handlers::health))
            .service(
                web::resource("/api/v1/projections/{type}")
                    .route(web::get().to(handlers::list_projections)),
            )
            .service(
                web::resource("/api/v1/projections/{type}/{aggregate_id}")
                    .route(web::get().to(handlers::get_projection)),
            )
    })
    .bind(bind_addr)?
    .run()
    .await
    .context("http server failed")?;

    info!("query service shutdown complete");
    Ok(())
}
