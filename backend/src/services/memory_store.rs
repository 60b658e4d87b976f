//! In-memory store
//!
//! Backs `DB_URL=memory://` and the HTTP tests. Query semantics mirror the
//! PostgreSQL store.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::models::{ActivityEvent, UserDocument, UserFilter};
use crate::services::store::{
    ActivityStore, SAMPLE_EVENT_LIMIT, StoreDescription, StoreError, StoreInfo, UserStore,
    ensure_object,
};

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    users: Arc<RwLock<Vec<UserDocument>>>,
    events: Arc<RwLock<Vec<ActivityEvent>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_users(users: Vec<UserDocument>) -> Result<Self, StoreError> {
        let store = Self::new();
        for user in &users {
            store.upsert_user(user).await?;
        }
        Ok(store)
    }
}

/// Newest join date first; users without one go last
fn newest_first(a: &UserDocument, b: &UserDocument) -> Ordering {
    match (a.joined_at(), b.joined_at()) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn count_users(&self, filter: &UserFilter) -> Result<i64, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().filter(|u| filter.matches(u)).count() as i64)
    }

    async fn list_users(
        &self,
        filter: &UserFilter,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<UserDocument>, StoreError> {
        let users = self.users.read().await;
        let mut matching: Vec<&UserDocument> = users.iter().filter(|u| filter.matches(u)).collect();
        matching.sort_by(|a, b| newest_first(a, b));

        Ok(matching
            .into_iter()
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn scan_users(&self) -> Result<Vec<UserDocument>, StoreError> {
        Ok(self.users.read().await.clone())
    }

    async fn upsert_user(&self, user: &UserDocument) -> Result<(), StoreError> {
        ensure_object(user)?;

        let mut users = self.users.write().await;
        match users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => *existing = user.clone(),
            None => users.push(user.clone()),
        }
        Ok(())
    }
}

#[async_trait]
impl ActivityStore for InMemoryStore {
    async fn events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActivityEvent>, StoreError> {
        let events = self.events.read().await;
        let mut matching: Vec<ActivityEvent> = events
            .iter()
            .filter(|e| e.created_at >= start && e.created_at <= end)
            .cloned()
            .collect();
        matching.sort_by_key(|e| e.created_at);
        Ok(matching)
    }

    async fn insert_events(&self, events: &[ActivityEvent]) -> Result<u64, StoreError> {
        self.events.write().await.extend_from_slice(events);
        Ok(events.len() as u64)
    }

    async fn count_events(&self) -> Result<i64, StoreError> {
        Ok(self.events.read().await.len() as i64)
    }
}

#[async_trait]
impl StoreInfo for InMemoryStore {
    async fn ping(&self) -> Result<Duration, StoreError> {
        let start = Instant::now();
        let _ = self.users.read().await.len();
        Ok(start.elapsed())
    }

    async fn describe(&self) -> Result<StoreDescription, StoreError> {
        let users = self.users.read().await;
        let events = self.events.read().await;

        Ok(StoreDescription {
            backend: self.backend().to_string(),
            tables: vec!["activity_events".to_string(), "bot_users".to_string()],
            user_count: users.len() as i64,
            event_count: events.len() as i64,
            sample_events: events.iter().take(SAMPLE_EVENT_LIMIT).cloned().collect(),
        })
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;

    fn user(id: &str, joined: Option<&str>, tier: &str) -> UserDocument {
        let mut info = json!({"username": format!("user_{id}")});
        if let Some(joined) = joined {
            info["waktu_ditambahkan"] = json!(joined);
        }
        UserDocument::new(id, json!({"User Info": info, "Membership": {"tier": tier}}))
    }

    #[tokio::test]
    async fn test_list_orders_newest_first() {
        let store = InMemoryStore::with_users(vec![
            user("a", Some("2024-01-01 08:00"), "Freemium"),
            user("b", None, "Premium"),
            user("c", Some("2024-06-01 08:00"), "Premium"),
            user("d", Some("2024-03-01 08:00"), "Zenith"),
        ])
        .await
        .unwrap();

        let page = store.list_users(&UserFilter::default(), 0, 10).await.unwrap();
        let ids: Vec<&str> = page.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "d", "a", "b"]);

        let page = store.list_users(&UserFilter::default(), 1, 2).await.unwrap();
        let ids: Vec<&str> = page.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["d", "a"]);
    }

    #[tokio::test]
    async fn test_count_with_filter() {
        let store = InMemoryStore::with_users(vec![
            user("a", Some("2024-01-01"), "Premium"),
            user("b", Some("2024-01-02"), "Premium"),
            user("c", Some("2024-01-03"), "Freemium"),
        ])
        .await
        .unwrap();

        let filter = UserFilter {
            tier: Some("Premium".to_string()),
            ..Default::default()
        };
        assert_eq!(store.count_users(&filter).await.unwrap(), 2);
        assert_eq!(store.count_users(&UserFilter::default()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_rejects_non_objects() {
        let store = InMemoryStore::new();
        store.upsert_user(&user("a", None, "Trial")).await.unwrap();
        store.upsert_user(&user("a", None, "Zenith")).await.unwrap();

        let users = store.scan_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].tier(), Some("Zenith"));

        let result = store.upsert_user(&UserDocument::new("x", json!([1, 2]))).await;
        assert!(matches!(result, Err(StoreError::Malformed { .. })));
    }

    #[tokio::test]
    async fn test_events_between_is_inclusive_and_sorted() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let events = vec![
            ActivityEvent::new("1", "/start", now),
            ActivityEvent::new("2", "/mode", now - ChronoDuration::hours(2)),
            ActivityEvent::new("3", "/old", now - ChronoDuration::days(3)),
        ];
        assert_eq!(store.insert_events(&events).await.unwrap(), 3);

        let found = store
            .events_between(now - ChronoDuration::hours(2), now)
            .await
            .unwrap();
        let descriptions: Vec<&str> = found.iter().map(|e| e.description.as_str()).collect();
        assert_eq!(descriptions, vec!["/mode", "/start"]);
        assert_eq!(store.count_events().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_describe() {
        let store = InMemoryStore::with_users(vec![user("a", None, "Trial")]).await.unwrap();
        let now = Utc::now();
        store
            .insert_events(&[
                ActivityEvent::new("1", "/a", now),
                ActivityEvent::new("1", "/b", now),
                ActivityEvent::new("1", "/c", now),
            ])
            .await
            .unwrap();

        let description = store.describe().await.unwrap();
        assert_eq!(description.backend, "memory");
        assert_eq!(description.user_count, 1);
        assert_eq!(description.event_count, 3);
        assert_eq!(description.sample_events.len(), SAMPLE_EVENT_LIMIT);
        assert!(store.ping().await.is_ok());
    }
}
