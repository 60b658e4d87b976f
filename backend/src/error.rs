use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use std::fmt;

use crate::services::{AnalyticsError, AuthError, StoreError};

/// Application-level error type
#[derive(Debug)]
pub enum AppError {
    /// Database error
    Database(String),
    /// Validation error
    Validation(String),
    /// Authentication error
    Unauthorized(String),
    /// A dependency (usually the database) cannot be reached
    ServiceUnavailable(String),
    /// Internal server error
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
    meta: ErrorMeta,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorMeta {
    request_id: String,
}

impl AppError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message sent to clients; server-side failures carry no detail
    fn client_message(&self) -> String {
        match self {
            Self::Database(_) => "Database error".to_string(),
            Self::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database(msg) => write!(f, "Database error: {msg}"),
            Self::Validation(msg) => write!(f, "Validation error: {msg}"),
            Self::Unauthorized(msg) => write!(f, "{msg}"),
            Self::ServiceUnavailable(msg) => write!(f, "Service unavailable: {msg}"),
            Self::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_response = ErrorResponse {
            error: ErrorBody {
                code: self.error_code().to_string(),
                message: self.client_message(),
            },
            meta: ErrorMeta {
                request_id: uuid::Uuid::new_v4().to_string(),
            },
        };

        HttpResponse::build(self.status_code()).json(error_response)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        tracing::error!("Store error: {}", err);
        Self::Database(err.to_string())
    }
}

impl From<AnalyticsError> for AppError {
    fn from(err: AnalyticsError) -> Self {
        match err {
            AnalyticsError::InvalidTimeframe(_) => Self::Validation(err.to_string()),
            AnalyticsError::Store(e) => e.into(),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NotConfigured => Self::Internal(err.to_string()),
            _ => Self::Unauthorized(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::ServiceUnavailable("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::Database("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_auth_error_mapping() {
        let err: AppError = AuthError::Expired.into();
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert_eq!(err.to_string(), "Token has expired. Please login again.");

        let err: AppError = AuthError::NotConfigured.into();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn test_timeframe_error_is_validation() {
        let err: AppError = AnalyticsError::InvalidTimeframe("2w".into()).into();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(err.to_string().contains("Invalid timeframe"));
    }

    #[actix_rt::test]
    async fn test_error_body_shape() {
        let resp = AppError::Validation("bad limit".into()).error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(json["error"]["message"], "Validation error: bad limit");
        assert!(json["meta"]["requestId"].is_string());
    }

    #[actix_rt::test]
    async fn test_server_errors_hide_detail() {
        let err: AppError = StoreError::Malformed {
            id: "row-42".into(),
            reason: "relation bot_users is corrupt".into(),
        }
        .into();
        assert!(err.to_string().contains("row-42"));

        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "DATABASE_ERROR");
        assert_eq!(json["error"]["message"], "Database error");

        let resp = AppError::Internal("JWT secret missing".into()).error_response();
        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(json["error"]["message"], "Internal server error");
    }
}
