use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use care_match::config::{Settings, StorageBackend};
use care_match::routes::{self, AppState};
use care_match::services::{CatalogCache, MemoryStore, PostgresStore, Stores};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Initialize logging
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }

    info!("Starting CareMatch matching service...");

    // Load configuration
    let settings = Settings::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    info!("Configuration loaded successfully");

    let (stores, database) = match settings.storage.backend {
        StorageBackend::Postgres => {
            let db = &settings.database;
            let postgres = Arc::new(
                PostgresStore::from_settings(
                    &db.url,
                    db.max_connections,
                    db.min_connections,
                    db.acquire_timeout_secs,
                    db.idle_timeout_secs,
                )
                .await
                .map_err(|e| {
                    error!("Failed to connect to PostgreSQL: {}", e);
                    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
                })?,
            );
            info!(
                "PostgreSQL store initialized (max: {} connections)",
                db.max_connections.unwrap_or(10)
            );
            (Stores::shared(postgres.clone()), Some(postgres))
        }
        StorageBackend::Memory => {
            info!("Using in-memory store; data is lost on restart");
            let memory = Arc::new(MemoryStore::new());
            let service = memory.insert_service("Home Care").await;
            info!("Seeded service '{}' ({})", service.name, service.id);
            (Stores::shared(memory), None)
        }
    };

    let catalog = Arc::new(CatalogCache::new(
        stores.services.clone(),
        settings.cache.catalog_size,
        Duration::from_secs(settings.cache.catalog_ttl_secs),
    ));
    info!(
        "Service catalog cache initialized ({} entries, TTL: {}s)",
        settings.cache.catalog_size, settings.cache.catalog_ttl_secs
    );

    // Build application state
    let mut app_state = AppState::build(stores.with_services(catalog), &settings);
    if let Some(database) = database {
        app_state = app_state.with_database(database);
    }

    info!("Matching engine initialized with {:?}", settings.matching);

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(routes::handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(routes::handle_query_payload_error))
            .app_data(web::PathConfig::default().error_handler(routes::handle_path_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
