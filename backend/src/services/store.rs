//! Storage traits
//!
//! The services depend on these traits rather than on a concrete database so
//! the same queries run against PostgreSQL in production and an in-memory
//! store in tests.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::models::{ActivityEvent, UserDocument, UserFilter};

/// Errors raised by storage backends
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Malformed record {id}: {reason}")]
    Malformed { id: String, reason: String },
}

/// Read access to bot user documents
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Count users matching `filter`
    async fn count_users(&self, filter: &UserFilter) -> Result<i64, StoreError>;

    /// One page of matching users, newest join date first
    async fn list_users(
        &self,
        filter: &UserFilter,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<UserDocument>, StoreError>;

    /// Every user document, for aggregate reports
    async fn scan_users(&self) -> Result<Vec<UserDocument>, StoreError>;

    /// Insert or replace a user document; the document must be a JSON object.
    /// The bot writes users itself, so this is only used to seed stores.
    async fn upsert_user(&self, user: &UserDocument) -> Result<(), StoreError>;
}

/// Reject documents that are not JSON objects
pub fn ensure_object(user: &UserDocument) -> Result<(), StoreError> {
    if user.document.is_object() {
        Ok(())
    } else {
        Err(StoreError::Malformed {
            id: user.id.clone(),
            reason: "document must be a JSON object".to_string(),
        })
    }
}

/// Access to the bot's activity log
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Events with `start <= created_at <= end`, oldest first
    async fn events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActivityEvent>, StoreError>;

    /// Insert a batch of events, returning how many were written
    async fn insert_events(&self, events: &[ActivityEvent]) -> Result<u64, StoreError>;

    async fn count_events(&self) -> Result<i64, StoreError>;
}

/// Backend introspection used by health and debug endpoints
#[async_trait]
pub trait StoreInfo: Send + Sync {
    /// Round-trip to the backend, returning the observed latency
    async fn ping(&self) -> Result<Duration, StoreError>;

    async fn describe(&self) -> Result<StoreDescription, StoreError>;

    /// Short backend name, e.g. `postgres`
    fn backend(&self) -> &'static str;
}

/// Snapshot of what a backend holds
#[derive(Debug, Clone, Serialize)]
pub struct StoreDescription {
    pub backend: String,
    pub tables: Vec<String>,
    pub user_count: i64,
    pub event_count: i64,
    pub sample_events: Vec<ActivityEvent>,
}

/// Maximum number of sample events included in a description
pub const SAMPLE_EVENT_LIMIT: usize = 2;
