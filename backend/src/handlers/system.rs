//! System handlers
//!
//! Service info, health, and the opt-in `/debug` routes used to diagnose
//! token delivery from the dashboard frontend.

use std::collections::BTreeMap;

use actix_web::{HttpRequest, HttpResponse, web};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::AppState;
use crate::error::AppError;
use crate::services::{AuthError, AuthenticatedUser, JwtAuth, extract_token};

const SERVICE_NAME: &str = "HyperBot Dashboard Backend";

/// Routes advertised by `GET /`
const API_ENDPOINTS: [&str; 13] = [
    "/apiv1/hyperbot/users",
    "/apiv1/hyperbot/users/search",
    "/apiv1/hyperbot/analytics",
    "/apiv1/hyperbot/stats",
    "/apiv1/hyperbot/analytics/overview",
    "/apiv1/hyperbot/analytics/users",
    "/apiv1/hyperbot/analytics/commands",
    "/apiv1/hyperbot/analytics/urls",
    "/apiv1/hyperbot/analytics/summary",
    "/apiv1/hyperbot/analytics/debug",
    "/apiv1/hyperbot/analytics/create-sample",
    "/health",
    "/",
];

const DEBUG_ENDPOINTS: [&str; 3] = ["/debug/auth", "/debug/jwt", "/debug/jwt/test"];

/// Headers whose values are never echoed back
const REDACTED_HEADERS: [&str; 2] = ["authorization", "cookie"];

#[derive(Serialize)]
struct ServiceInfo {
    message: &'static str,
    status: &'static str,
    version: &'static str,
    environment: &'static str,
    jwt_secret_configured: bool,
    endpoints: Vec<&'static str>,
}

/// GET /
pub async fn root(state: web::Data<AppState>) -> HttpResponse {
    let mut endpoints = API_ENDPOINTS.to_vec();
    if state.config.enable_debug_routes {
        endpoints.extend(DEBUG_ENDPOINTS);
    }

    HttpResponse::Ok().json(ServiceInfo {
        message: SERVICE_NAME,
        status: "running",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.backend,
        jwt_secret_configured: state.config.jwt_secret.is_some(),
        endpoints,
    })
}

/// GET /health
///
/// 200 with the health report while the store answers, 503 otherwise.
pub async fn health_check(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let report = state.health.check_health().await;

    if report.is_healthy() {
        Ok(HttpResponse::Ok().json(report))
    } else {
        tracing::warn!(
            "Health check failed: {}",
            report.error.as_deref().unwrap_or("unknown error")
        );
        Err(AppError::ServiceUnavailable("Database connection failed".to_string()))
    }
}

/// First `len` characters of a token, marked as truncated
fn preview(token: &str, len: usize) -> String {
    let head: String = token.chars().take(len).collect();
    format!("{head}...")
}

fn cookie_names(req: &HttpRequest) -> Vec<String> {
    req.cookies()
        .map(|cookies| cookies.iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default()
}

fn redacted_headers(req: &HttpRequest) -> BTreeMap<String, String> {
    req.headers()
        .iter()
        .map(|(name, value)| {
            let name = name.as_str().to_string();
            let value = if REDACTED_HEADERS.contains(&name.as_str()) {
                "[redacted]".to_string()
            } else {
                value.to_str().unwrap_or("[binary]").to_string()
            };
            (name, value)
        })
        .collect()
}

#[derive(Serialize)]
struct AuthDebug {
    cookies: Vec<String>,
    headers: BTreeMap<String, String>,
    token_found: bool,
    token_preview: Option<String>,
    jwt_secret_configured: bool,
}

/// GET /debug/auth
pub async fn debug_auth(req: HttpRequest, auth: Option<web::Data<JwtAuth>>) -> HttpResponse {
    let token = extract_token(&req);

    HttpResponse::Ok().json(AuthDebug {
        cookies: cookie_names(&req),
        headers: redacted_headers(&req),
        token_found: token.is_some(),
        token_preview: token.as_deref().map(|t| preview(t, 20)),
        jwt_secret_configured: auth.is_some(),
    })
}

#[derive(Serialize)]
struct JwtDebug {
    cookies: Vec<String>,
    extracted_token: Option<String>,
    jwt_secret_configured: bool,
    jwt_payload: Option<Map<String, Value>>,
    jwt_error: Option<String>,
    cookie_header_present: bool,
}

/// GET|POST /debug/jwt
pub async fn debug_jwt(req: HttpRequest, auth: Option<web::Data<JwtAuth>>) -> HttpResponse {
    let token = extract_token(&req);

    let (jwt_payload, jwt_error) = match (token.as_deref(), auth.as_deref()) {
        (None, _) => (None, None),
        (Some(_), None) => (None, Some(AuthError::NotConfigured.to_string())),
        (Some(token), Some(auth)) => match auth.decode_payload(token) {
            Ok(payload) => (Some(payload), None),
            Err(e) => (None, Some(e.to_string())),
        },
    };

    HttpResponse::Ok().json(JwtDebug {
        cookies: cookie_names(&req),
        extracted_token: token.as_deref().map(|t| preview(t, 50)),
        jwt_secret_configured: auth.is_some(),
        jwt_payload,
        jwt_error,
        cookie_header_present: req.headers().contains_key("cookie"),
    })
}

#[derive(Serialize)]
#[serde(untagged)]
enum JwtTestResult {
    Verified {
        success: bool,
        message: &'static str,
        user: AuthenticatedUser,
    },
    Rejected {
        success: bool,
        error: String,
        error_type: &'static str,
    },
}

/// POST /debug/jwt/test
///
/// Always 200; the outcome is in the body.
pub async fn debug_jwt_test(req: HttpRequest, auth: Option<web::Data<JwtAuth>>) -> HttpResponse {
    let outcome = match auth.as_deref() {
        Some(auth) => auth.authenticate(&req),
        None => Err(AuthError::NotConfigured),
    };

    let result = match outcome {
        Ok(user) => JwtTestResult::Verified {
            success: true,
            message: "JWT verification successful",
            user,
        },
        Err(e) => JwtTestResult::Rejected {
            success: false,
            error: e.to_string(),
            error_type: e.kind(),
        },
    };

    HttpResponse::Ok().json(result)
}

/// Configure `/` and `/health`
pub fn configure_system_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(root))
        .route("/health", web::get().to(health_check));
}

/// Configure the `/debug` routes; only mounted when enabled in config
pub fn configure_debug_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/debug")
            .route("/auth", web::get().to(debug_auth))
            .route("/jwt", web::get().to(debug_jwt))
            .route("/jwt", web::post().to(debug_jwt))
            .route("/jwt/test", web::post().to(debug_jwt_test)),
    );
}
