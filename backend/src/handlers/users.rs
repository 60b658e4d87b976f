//! User handlers
//!
//! Paginated user listing, filtered search and user-level analytics. Every
//! route requires a valid dashboard token.

use actix_web::{HttpResponse, web};
use chrono::Utc;
use tracing::info;

use super::ApiResponse;
use crate::AppState;
use crate::error::AppError;
use crate::models::{AnalyticsRequest, UserSearchRequest, UsersRequest};
use crate::services::AuthenticatedUser;

/// POST /apiv1/hyperbot/users
///
/// Body: `{"get_data": "...", "limit": 50, "skip": 0}`
pub async fn list_users(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
    body: web::Json<UsersRequest>,
) -> Result<HttpResponse, AppError> {
    let page = state.users.get_users(&body).await?;

    info!(
        "User {} listed {} users (page {} of {})",
        user.user_id,
        page.users.len(),
        page.current_page,
        page.total_pages
    );

    Ok(HttpResponse::Ok().json(ApiResponse::new(page)))
}

/// POST /apiv1/hyperbot/users/search
pub async fn search_users(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
    body: web::Json<UserSearchRequest>,
) -> Result<HttpResponse, AppError> {
    let page = state.users.search_users(&body).await?;
    info!("User {} searched users: {} matches", user.user_id, page.total_count);

    Ok(HttpResponse::Ok().json(ApiResponse::new(page)))
}

/// POST /apiv1/hyperbot/analytics
pub async fn user_analytics(
    _user: AuthenticatedUser,
    state: web::Data<AppState>,
    body: web::Json<AnalyticsRequest>,
) -> Result<HttpResponse, AppError> {
    let report = state
        .users
        .user_analytics(&body.date_range, Utc::now())
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::new(report)))
}

/// GET /apiv1/hyperbot/stats
pub async fn quick_stats(
    _user: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let stats = state
        .users
        .quick_stats(state.started_at.elapsed())
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::new(stats)))
}

/// Configure user routes, relative to `/apiv1/hyperbot`
pub fn configure_user_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/users").route(web::post().to(list_users)))
        .service(web::resource("/users/search").route(web::post().to(search_users)))
        .service(web::resource("/analytics").route(web::post().to(user_analytics)))
        .service(web::resource("/stats").route(web::get().to(quick_stats)));
}
