use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hyperbot_dashboard::config::MEMORY_DB_URL;
use hyperbot_dashboard::services::{InMemoryStore, PgStore};
use hyperbot_dashboard::{AppState, Config, configure_app};

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hyperbot_dashboard=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(io::Error::other)?;

    info!(
        "Starting HyperBot dashboard backend on {}:{}",
        config.host, config.port
    );

    let state = if config.uses_memory_store() {
        warn!(
            "DB_URL is {}; data lives in memory and is lost on restart",
            MEMORY_DB_URL
        );
        AppState::new(config.clone(), Arc::new(InMemoryStore::new()))
    } else {
        let store = PgStore::connect(&config.database_url, config.database_max_connections)
            .await
            .map_err(io::Error::other)?;
        info!("Database connection pool established");

        if config.run_migrations {
            store.migrate().await.map_err(io::Error::other)?;
        }

        AppState::new(config.clone(), Arc::new(store))
    };

    // Refuse to start against an unreachable database
    let health = state.health.check_health().await;
    if !health.is_healthy() {
        return Err(io::Error::other(format!(
            "Database ping failed: {}",
            health.error.unwrap_or_default()
        )));
    }
    info!(
        "Connected to {} store {} ({}ms)",
        health.database_type,
        config.database_name,
        health.latency_ms.unwrap_or_default()
    );

    match &config.jwt_secret {
        Some(_) => info!("JWT authentication enabled"),
        None => warn!("JWT_SECRET not set. Protected endpoints will answer 500."),
    }
    if config.enable_debug_routes {
        warn!("Debug routes are mounted under /debug");
    }

    let state = web::Data::new(state);
    let server_addr = format!("{}:{}", config.host, config.port);

    HttpServer::new(move || {
        let cors_config = config.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _req| {
                origin
                    .to_str()
                    .is_ok_and(|origin| cors_config.origin_allowed(origin))
            })
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allow_any_header()
            .supports_credentials()
            .max_age(3600);

        let state = state.clone();
        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .configure(move |cfg| configure_app(cfg, state))
    })
    .bind(&server_addr)?
    .run()
    .await
}
