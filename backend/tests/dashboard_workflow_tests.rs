//! End-to-End Dashboard Workflow Tests
//!
//! Drive the public API the way the dashboard frontend does. The PostgreSQL
//! variants need a database.
//! Run with: `cargo test --test dashboard_workflow_tests -- --ignored`

use std::sync::Arc;

use actix_web::{App, http::StatusCode, test, web};
use serde_json::{Value, json};
use uuid::Uuid;

use hyperbot_dashboard::config::Config;
use hyperbot_dashboard::models::UserDocument;
use hyperbot_dashboard::services::{
    ActivityStore, InMemoryStore, JwtAuth, PgStore, StoreInfo, UserStore,
};
use hyperbot_dashboard::{AppState, configure_app};

// ============================================================================
// Test Helpers
// ============================================================================

const SECRET: &str = "workflow-test-secret";

/// Connect to the test database and migrate it; None when unavailable
async fn try_create_test_store() -> Option<PgStore> {
    let _ = dotenvy::from_filename("backend/.env");
    let _ = dotenvy::dotenv();

    let database_url = std::env::var("DATABASE_URL").ok()?;
    let store = PgStore::connect(&database_url, 5).await.ok()?;
    store.migrate().await.ok()?;
    Some(store)
}

fn config(database_url: &str) -> Config {
    let database_url = database_url.to_string();
    Config::from_lookup(|key| match key {
        "DB_URL" => Some(database_url.clone()),
        "JWT_SECRET" => Some(SECRET.to_string()),
        _ => None,
    })
    .unwrap()
}

fn auth_header() -> (&'static str, String) {
    let token = JwtAuth::new(SECRET)
        .issue("workflow-admin", "ops@xydevs.com", "ops")
        .unwrap();
    ("Authorization", format!("Bearer {token}"))
}

fn user(id: &str, tag: &str, tier: &str, downloads: i64, joined: &str) -> UserDocument {
    UserDocument::new(
        id,
        json!({
            "User Info": {
                "user_id": id,
                "username": format!("{tag}_{id}"),
                "nama_depan": "Workflow",
                "waktu_ditambahkan": joined
            },
            "Bot Usage": {
                "total_downloads": downloads,
                "total_size": downloads * 2048,
                "TikTok": {"tiktok_usage": downloads},
                "last_feature_usage": {"TikTok": ["video"]}
            },
            "Membership": {"tier": tier}
        }),
    )
}

/// POST a JSON body with a valid token; yields `(status, body)`
macro_rules! post {
    ($app:expr, $uri:expr, $body:expr $(,)?) => {{
        let req = test::TestRequest::post()
            .uri($uri)
            .insert_header(auth_header())
            .set_json($body)
            .to_request();
        let resp = test::call_service($app, req).await;
        let status: StatusCode = resp.status();
        let body: Value = test::read_body_json(resp).await;
        (status, body)
    }};
}

// ============================================================================
// In-memory workflow
// ============================================================================

#[actix_rt::test]
async fn test_dashboard_session_in_memory() {
    let store = InMemoryStore::with_users(vec![
        user("11", "mem", "Premium", 8, "2024-04-01 09:00:00"),
        user("12", "mem", "Trial", 0, "2024-04-02 09:00:00"),
        user("13", "mem", "Zenith", 30, "2024-04-03 09:00:00"),
    ])
    .await
    .unwrap();
    let state = web::Data::new(AppState::new(config("memory://"), Arc::new(store)));
    let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, state))).await;

    // Landing page: first page of users
    let (status, body) = post!(
        &app,
        "/apiv1/hyperbot/users",
        json!({"get_data": "users", "limit": 2}),
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["users"][0]["_id"], "13");
    assert_eq!(body["data"]["has_next"], true);

    // Next page
    let (_, body) = post!(
        &app,
        "/apiv1/hyperbot/users",
        json!({"get_data": "users", "limit": 2, "skip": 2}),
    );
    assert_eq!(body["data"]["users"][0]["_id"], "11");
    assert_eq!(body["data"]["has_next"], false);

    // TikTok users only
    let (_, body) = post!(
        &app,
        "/apiv1/hyperbot/users/search",
        json!({"get_data": "users", "platform_filter": "tiktok"}),
    );
    assert_eq!(body["data"]["total_count"], 2);

    // Seed activity, then load the analytics page
    let (status, _) = post!(&app, "/apiv1/hyperbot/analytics/create-sample", json!({}));
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post!(
        &app,
        "/apiv1/hyperbot/analytics/summary",
        json!({"timeframe": "30d"}),
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["overview"]["period_total_analytics"], 285);

    let (_, body) = post!(
        &app,
        "/apiv1/hyperbot/analytics",
        json!({"get_data": "analytics", "date_range": "7d"}),
    );
    assert_eq!(body["data"]["platform_usage"]["tiktok_users"], 3);
    assert_eq!(body["data"]["overview"]["zenith_users"], 1);
}

// ============================================================================
// PostgreSQL workflow
// ============================================================================

#[actix_rt::test]
#[ignore]
async fn test_store_roundtrip_postgres() {
    let Some(store) = try_create_test_store().await else {
        eprintln!("Skipping test: DATABASE_URL not available");
        return;
    };

    let tag = format!("wf{}", Uuid::new_v4().simple());
    let id = format!("{tag}-1");
    store
        .upsert_user(&user(&id, &tag, "Plus", 5, "2024-02-01 10:00:00"))
        .await
        .unwrap();

    let filter = hyperbot_dashboard::models::UserFilter {
        search: Some(tag.clone()),
        ..Default::default()
    };
    assert_eq!(store.count_users(&filter).await.unwrap(), 1);

    let users = store.list_users(&filter, 0, 10).await.unwrap();
    assert_eq!(users[0].id, id);
    assert_eq!(users[0].total_downloads(), 5);

    // Upsert replaces the document
    store
        .upsert_user(&user(&id, &tag, "Zenith", 6, "2024-02-01 10:00:00"))
        .await
        .unwrap();
    let users = store.list_users(&filter, 0, 10).await.unwrap();
    assert_eq!(users[0].tier(), Some("Zenith"));

    assert!(store.ping().await.is_ok());
    assert_eq!(store.backend(), "postgres");
}

#[actix_rt::test]
#[ignore]
async fn test_dashboard_session_postgres() {
    let Some(store) = try_create_test_store().await else {
        eprintln!("Skipping test: DATABASE_URL not available");
        return;
    };

    let tag = format!("wf{}", Uuid::new_v4().simple());
    for (n, tier) in ["Premium", "Trial"].iter().enumerate() {
        let id = format!("{tag}-{n}");
        store
            .upsert_user(&user(&id, &tag, tier, n as i64 + 1, "2024-03-01 10:00:00"))
            .await
            .unwrap();
    }
    let events_before = store.count_events().await.unwrap();

    let state = web::Data::new(AppState::new(
        config("postgres://configured-by-test"),
        Arc::new(store.clone()),
    ));
    let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, state))).await;

    let (status, body) = post!(
        &app,
        "/apiv1/hyperbot/users/search",
        json!({"get_data": "users", "search_query": tag, "membership_filter": "premium"}),
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_count"], 1);

    let (status, body) = post!(&app, "/apiv1/hyperbot/analytics/create-sample", json!({}));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["sample_count"], 285);
    assert_eq!(store.count_events().await.unwrap(), events_before + 285);

    let (status, body) = post!(
        &app,
        "/apiv1/hyperbot/analytics/commands",
        json!({"timeframe": "30d"}),
    );
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["total_commands"].as_u64().unwrap() >= 2);
}
