use actix_web::web;
use serde::Serialize;

use crate::error::AppError;

pub mod analytics;
pub mod system;
pub mod users;

#[cfg(test)]
mod test_support;




pub use analytics::configure_analytics_routes;
pub use system::{configure_debug_routes, configure_system_routes};
pub use users::configure_user_routes;

/// Standard API response wrapper
#[derive(Serialize)]
pub(crate) struct ApiResponse<T: Serialize> {
    data: T,
    meta: ResponseMeta,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResponseMeta {
    request_id: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub(crate) fn new(data: T) -> Self {
        Self {
            data,
            meta: ResponseMeta {
                request_id: uuid::Uuid::new_v4().to_string(),
            },
        }
    }
}

/// Render malformed or mistyped JSON bodies as validation errors
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, req| {
        tracing::debug!("Rejected body for {}: {}", req.path(), err);
        AppError::Validation(err.to_string()).into()
    })
}
