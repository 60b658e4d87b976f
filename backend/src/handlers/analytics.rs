//! Activity analytics handlers
//!
//! Timeframe-based visitor, command and URL statistics.

use actix_web::{HttpResponse, web};
use tracing::{debug, info};

use super::ApiResponse;
use crate::AppState;
use crate::error::AppError;
use crate::models::{AnalyticsStatsRequest, AnalyticsTimeframeRequest, AnalyticsUsersRequest};
use crate::services::AuthenticatedUser;

/// POST /apiv1/hyperbot/analytics/overview
///
/// Body: `{"timeframe": "1d" | "3d" | "7d" | "30d" | "90d"}`
pub async fn overview(
    _user: AuthenticatedUser,
    state: web::Data<AppState>,
    body: web::Json<AnalyticsTimeframeRequest>,
) -> Result<HttpResponse, AppError> {
    let overview = state.analytics.overview(&body.timeframe).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(overview)))
}

/// POST /apiv1/hyperbot/analytics/users
pub async fn daily_active_users(
    _user: AuthenticatedUser,
    state: web::Data<AppState>,
    body: web::Json<AnalyticsUsersRequest>,
) -> Result<HttpResponse, AppError> {
    debug!(
        "Daily active users requested (timeframe={}, unique_only={})",
        body.timeframe, body.unique_only
    );
    let users = state.analytics.daily_active_users(&body.timeframe).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(users)))
}

/// POST /apiv1/hyperbot/analytics/commands
pub async fn command_stats(
    _user: AuthenticatedUser,
    state: web::Data<AppState>,
    body: web::Json<AnalyticsStatsRequest>,
) -> Result<HttpResponse, AppError> {
    debug!(
        "Command stats requested (timeframe={}, stats_type={})",
        body.timeframe, body.stats_type
    );
    let stats = state.analytics.command_stats(&body.timeframe).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(stats)))
}

/// POST /apiv1/hyperbot/analytics/urls
pub async fn url_stats(
    _user: AuthenticatedUser,
    state: web::Data<AppState>,
    body: web::Json<AnalyticsStatsRequest>,
) -> Result<HttpResponse, AppError> {
    debug!(
        "URL stats requested (timeframe={}, stats_type={})",
        body.timeframe, body.stats_type
    );
    let stats = state.analytics.url_stats(&body.timeframe).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(stats)))
}

/// POST /apiv1/hyperbot/analytics/summary
pub async fn summary(
    _user: AuthenticatedUser,
    state: web::Data<AppState>,
    body: web::Json<AnalyticsTimeframeRequest>,
) -> Result<HttpResponse, AppError> {
    let summary = state.analytics.summary(&body.timeframe).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(summary)))
}

/// GET /apiv1/hyperbot/analytics/debug
pub async fn debug_structure(
    _user: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let info = state
        .analytics
        .debug_structure(&state.config.database_name)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(info)))
}

/// POST /apiv1/hyperbot/analytics/create-sample
pub async fn create_sample(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let result = state.analytics.create_sample_data().await?;
    info!(
        "User {} created {} sample activity events",
        user.user_id, result.sample_count
    );
    Ok(HttpResponse::Ok().json(ApiResponse::new(result)))
}

/// Configure analytics routes, relative to `/apiv1/hyperbot`
pub fn configure_analytics_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/analytics/overview").route(web::post().to(overview)))
        .service(web::resource("/analytics/users").route(web::post().to(daily_active_users)))
        .service(web::resource("/analytics/commands").route(web::post().to(command_stats)))
        .service(web::resource("/analytics/urls").route(web::post().to(url_stats)))
        .service(web::resource("/analytics/summary").route(web::post().to(summary)))
        .service(web::resource("/analytics/debug").route(web::get().to(debug_structure)))
        .service(web::resource("/analytics/create-sample").route(web::post().to(create_sample)));
}
