//! PostgreSQL store
//!
//! User documents live in `bot_users.document` as JSONB. Filters are rendered
//! into SQL over JSONB paths with every user-supplied value bound as a
//! parameter.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, info};

use crate::models::{ActivityEvent, SessionFilter, UserDocument, UserFilter, paths};
use crate::services::store::{
    ActivityStore, SAMPLE_EVENT_LIMIT, StoreDescription, StoreError, StoreInfo, UserStore,
    ensure_object,
};

/// Rows per multi-row INSERT; four binds per row keeps well under the
/// 65535 parameter limit
const INSERT_CHUNK_SIZE: usize = 1000;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded migrations
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn path_param(path: &[&str]) -> Vec<String> {
    path.iter().map(|segment| segment.to_string()).collect()
}

/// Escape `%`, `_` and `\` for a LIKE pattern
pub(crate) fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `(document #>> $n)`
fn push_text_path(qb: &mut QueryBuilder<'_, Postgres>, path: &[&str]) {
    qb.push("(document #>> ");
    qb.push_bind(path_param(path));
    qb.push(")");
}

fn push_non_empty(qb: &mut QueryBuilder<'_, Postgres>, path: &[&str]) {
    qb.push("COALESCE(");
    push_text_path(qb, path);
    qb.push(", '') <> ''");
}

/// Append a `WHERE` clause for `filter`
pub(crate) fn push_user_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    qb.push(" WHERE TRUE");

    if let Some(needle) = &filter.search {
        let pattern = format!("%{}%", escape_like(needle));
        qb.push(" AND (");
        for (i, path) in paths::SEARCHABLE.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            push_text_path(qb, path);
            qb.push(" ILIKE ");
            qb.push_bind(pattern.clone());
        }
        qb.push(")");
    }

    if let Some(prefix) = filter.joined_prefix() {
        qb.push(" AND ");
        push_text_path(qb, paths::JOINED_AT);
        qb.push(" LIKE ");
        qb.push_bind(format!("{prefix}%"));
    }

    if let Some(tier) = &filter.tier {
        qb.push(" AND ");
        push_text_path(qb, paths::TIER);
        qb.push(" = ");
        qb.push_bind(tier.clone());
    }

    match filter.session {
        Some(SessionFilter::WithSession) => {
            qb.push(" AND (");
            for (i, path) in paths::SESSION_STRINGS.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                push_non_empty(qb, path);
            }
            qb.push(")");
        }
        Some(SessionFilter::WithoutSession) => {
            for path in paths::SESSION_STRINGS {
                qb.push(" AND NOT (");
                push_non_empty(qb, path);
                qb.push(")");
            }
        }
        None => {}
    }

    if let Some(platform) = filter.platform {
        let usage = platform.usage_path();
        qb.push(" AND (CASE WHEN jsonb_typeof(document #> ");
        qb.push_bind(path_param(&usage));
        qb.push(") = 'number' THEN ");
        push_text_path(qb, &usage);
        qb.push("::numeric > 0 ELSE FALSE END)");
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn count_users(&self, filter: &UserFilter) -> Result<i64, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM bot_users");
        push_user_filter(&mut qb, filter);

        let total = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(total)
    }

    async fn list_users(
        &self,
        filter: &UserFilter,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<UserDocument>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id, document FROM bot_users");
        push_user_filter(&mut qb, filter);
        qb.push(" ORDER BY ");
        push_text_path(&mut qb, paths::JOINED_AT);
        qb.push(" COLLATE \"C\" DESC NULLS LAST, id ASC OFFSET ");
        qb.push_bind(skip);
        qb.push(" LIMIT ");
        qb.push_bind(limit);

        debug!("User query: {}", qb.sql());

        let rows = qb
            .build_query_as::<(String, Value)>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(id, document)| UserDocument::new(id, document))
            .collect())
    }

    async fn scan_users(&self) -> Result<Vec<UserDocument>, StoreError> {
        let rows: Vec<(String, Value)> = sqlx::query_as("SELECT id, document FROM bot_users")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(id, document)| UserDocument::new(id, document))
            .collect())
    }

    async fn upsert_user(&self, user: &UserDocument) -> Result<(), StoreError> {
        ensure_object(user)?;

        sqlx::query(
            r#"
            INSERT INTO bot_users (id, document, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (id) DO UPDATE
            SET document = EXCLUDED.document, updated_at = NOW()
            "#,
        )
        .bind(&user.id)
        .bind(&user.document)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ActivityStore for PgStore {
    async fn events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActivityEvent>, StoreError> {
        let events = sqlx::query_as::<_, ActivityEvent>(
            r#"
            SELECT user_id, description, timestamp_label, created_at
            FROM activity_events
            WHERE created_at >= $1 AND created_at <= $2
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    async fn insert_events(&self, events: &[ActivityEvent]) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for chunk in events.chunks(INSERT_CHUNK_SIZE) {
            let mut qb = QueryBuilder::<Postgres>::new(
                "INSERT INTO activity_events (user_id, description, timestamp_label, created_at) ",
            );
            qb.push_values(chunk, |mut row, event| {
                row.push_bind(event.user_id.clone())
                    .push_bind(event.description.clone())
                    .push_bind(event.timestamp_label.clone())
                    .push_bind(event.created_at);
            });
            inserted += qb.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn count_events(&self) -> Result<i64, StoreError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM activity_events")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }
}

#[async_trait]
impl StoreInfo for PgStore {
    async fn ping(&self) -> Result<Duration, StoreError> {
        let start = Instant::now();
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(start.elapsed())
    }

    async fn describe(&self) -> Result<StoreDescription, StoreError> {
        let tables: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = current_schema()
            ORDER BY table_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let user_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bot_users")
            .fetch_one(&self.pool)
            .await?;
        let event_count = self.count_events().await?;

        let sample_events = sqlx::query_as::<_, ActivityEvent>(
            r#"
            SELECT user_id, description, timestamp_label, created_at
            FROM activity_events
            ORDER BY id ASC
            LIMIT $1
            "#,
        )
        .bind(SAMPLE_EVENT_LIMIT as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(StoreDescription {
            backend: self.backend().to_string(),
            tables,
            user_count,
            event_count,
            sample_events,
        })
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
