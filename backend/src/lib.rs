//! HyperBot Dashboard backend
//!
//! User listings, search and activity analytics for the HyperBot dashboard,
//! served as JSON over HTTP.

use std::sync::Arc;
use std::time::Instant;

use actix_web::web;

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::AppError;

use services::{
    ActivityAnalyticsService, ActivityStore, HealthService, JwtAuth, StoreInfo, UserService,
    UserStore,
};

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub users: UserService,
    pub analytics: ActivityAnalyticsService,
    pub health: HealthService,
    /// Store backend name, e.g. `postgres`
    pub backend: &'static str,
    pub started_at: Instant,
}

impl AppState {
    /// Wire every service to one store
    pub fn new<S>(config: Config, store: Arc<S>) -> Self
    where
        S: UserStore + ActivityStore + StoreInfo + 'static,
    {
        let health = HealthService::new(store.clone(), config.database_name.clone());

        Self {
            users: UserService::new(store.clone()),
            analytics: ActivityAnalyticsService::new(store.clone(), store.clone()),
            health,
            backend: store.backend(),
            started_at: Instant::now(),
            config,
        }
    }
}

/// Register state, extractors config and every route
pub fn configure_app(cfg: &mut web::ServiceConfig, state: web::Data<AppState>) {
    if let Some(secret) = state.config.jwt_secret.as_deref() {
        cfg.app_data(web::Data::new(JwtAuth::new(secret)));
    }

    let debug_routes = state.config.enable_debug_routes;

    cfg.app_data(state)
        .app_data(handlers::json_config())
        .configure(handlers::configure_system_routes)
        .service(
            web::scope("/apiv1/hyperbot")
                .configure(handlers::configure_user_routes)
                .configure(handlers::configure_analytics_routes),
        );

    if debug_routes {
        cfg.configure(handlers::configure_debug_routes);
    }
}
