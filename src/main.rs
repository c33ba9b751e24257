use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpResponse, HttpServer, Responder, get};
use dotenvy::dotenv;
use std::sync::Arc;

mod api;
mod attendance;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod routes;
mod scan;
mod store;
mod utils;

use attendance::AttendanceService;
use attendance::locks::SessionLocks;
use config::Config;
use db::init_db;
use routes::Limiters;
use store::mysql::MySqlStore;
use utils::clock::BusinessClock;

use crate::docs::ApiDoc;
use serde_json::json;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({ "success": true, "status": "ok" }))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "attendance.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    let clock = BusinessClock::new(config.business_offset);
    info!(
        addr = %config.server_addr,
        prefix = %config.api_prefix,
        offset = %clock.offset(),
        "Server starting..."
    );

    let pool = init_db(&config.database_url, config.run_migrations).await?;
    let store = Arc::new(MySqlStore::new(pool));

    let service = Data::new(AttendanceService::new(
        store.clone(),
        store,
        SessionLocks::new(config.session_lock_idle),
        clock,
        config.active_status.clone(),
    ));
    let limiters = Limiters::new(config.rate_scan_per_min, config.rate_api_per_min);

    let server_addr = config.server_addr.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // wildcard so JS/CSS assets match
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(service.clone())
            .service(health)
            .configure(|cfg| routes::configure(cfg, &config, &limiters))
    })
    .bind(server_addr)?
    .run()
    .await?;

    Ok(())
}
