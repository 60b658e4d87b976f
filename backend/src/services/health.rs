//! Health Service
//!
//! Checks that the backing store answers and reports how long it took.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::services::store::StoreInfo;

/// Overall service health
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Store connectivity as reported to clients
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub database: ConnectionState,
    /// Store backend, `postgres` or `memory`
    pub database_type: String,
    pub database_name: String,
    /// Ping round-trip in milliseconds
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

#[derive(Clone)]
pub struct HealthService {
    store: Arc<dyn StoreInfo>,
    database_name: String,
}

impl HealthService {
    pub fn new(store: Arc<dyn StoreInfo>, database_name: impl Into<String>) -> Self {
        Self {
            store,
            database_name: database_name.into(),
        }
    }

    /// Ping the store. Never fails; an unreachable store is reported as unhealthy.
    pub async fn check_health(&self) -> HealthReport {
        let (status, database, latency_ms, error) = match self.store.ping().await {
            Ok(latency) => (
                HealthStatus::Healthy,
                ConnectionState::Connected,
                Some(latency.as_millis() as u64),
                None,
            ),
            Err(e) => {
                tracing::warn!("Health check failed: {}", e);
                (
                    HealthStatus::Unhealthy,
                    ConnectionState::Disconnected,
                    None,
                    Some(e.to_string()),
                )
            }
        };

        HealthReport {
            status,
            database,
            database_type: self.store.backend().to_string(),
            database_name: self.database_name.clone(),
            latency_ms,
            error,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory_store::InMemoryStore;
    use crate::services::store::{StoreDescription, StoreError};
    use async_trait::async_trait;
    use std::time::Duration;

    struct UnreachableStore;

    #[async_trait]
    impl StoreInfo for UnreachableStore {
        async fn ping(&self) -> Result<Duration, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }

        async fn describe(&self) -> Result<StoreDescription, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }

        fn backend(&self) -> &'static str {
            "postgres"
        }
    }

    #[tokio::test]
    async fn test_healthy_store() {
        let service = HealthService::new(Arc::new(InMemoryStore::new()), "UsersDatabase");
        let report = service.check_health().await;

        assert!(report.is_healthy());
        assert_eq!(report.database, ConnectionState::Connected);
        assert_eq!(report.database_type, "memory");
        assert_eq!(report.database_name, "UsersDatabase");
        assert!(report.latency_ms.is_some());
        assert!(report.error.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_store() {
        let service = HealthService::new(Arc::new(UnreachableStore), "UsersDatabase");
        let report = service.check_health().await;

        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert_eq!(report.database, ConnectionState::Disconnected);
        assert!(report.latency_ms.is_none());
        assert!(report.error.unwrap().contains("pool timed out"));
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_value(HealthStatus::Healthy).unwrap(),
            serde_json::json!("healthy")
        );
        assert_eq!(
            serde_json::to_value(ConnectionState::Connected).unwrap(),
            serde_json::json!("connected")
        );
    }
}
