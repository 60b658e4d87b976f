//! Shared fixtures for the HTTP tests

use std::sync::Arc;

use actix_web::web;
use serde_json::{Value, json};

use crate::AppState;
use crate::config::Config;
use crate::models::UserDocument;
use crate::services::{InMemoryStore, JwtAuth};

pub const TEST_SECRET: &str = "dashboard-test-secret";

/// Config for an in-memory store with auth and debug routes enabled
pub fn create_test_config(jwt_secret: Option<&str>) -> Config {
    Config::from_lookup(|key| match key {
        "DB_URL" => Some("memory://".to_string()),
        "JWT_SECRET" => jwt_secret.map(String::from),
        "ENABLE_DEBUG_ROUTES" => Some("true".to_string()),
        _ => None,
    })
    .unwrap()
}

pub fn create_test_app_state(store: InMemoryStore) -> web::Data<AppState> {
    web::Data::new(AppState::new(
        create_test_config(Some(TEST_SECRET)),
        Arc::new(store),
    ))
}

/// `Authorization` header carrying a freshly issued token
pub fn bearer() -> (&'static str, String) {
    let token = JwtAuth::new(TEST_SECRET)
        .issue("dashboard-admin", "admin@xydevs.com", "admin")
        .unwrap();
    ("Authorization", format!("Bearer {token}"))
}

/// A bot user with the given tier, download count and join date
pub fn bot_user(id: &str, username: &str, tier: &str, downloads: i64, joined: &str) -> UserDocument {
    UserDocument::new(
        id,
        json!({
            "User Info": {
                "user_id": id,
                "username": username,
                "nama_depan": format!("{username} first"),
                "waktu_ditambahkan": joined
            },
            "Bot Usage": {
                "total_downloads": downloads,
                "total_size": {"$numberLong": (downloads * 1024).to_string()}
            },
            "Membership": {"tier": tier, "subscription_expired": false},
            "DownloaderUsage": {"internal": true}
        }),
    )
}

/// Body of a success envelope
pub fn data(body: &Value) -> &Value {
    &body["data"]
}
