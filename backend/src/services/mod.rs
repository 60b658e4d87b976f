pub mod activity_analytics;
pub mod health;
pub mod jwt_auth;
pub mod memory_store;
pub mod pg_store;
pub mod store;
pub mod users;

pub use activity_analytics::{
    ActivityAnalyticsService, AnalyticsError, DatabaseDebugInfo, display_host, growth_rate,
    parse_timeframe, sample_events,
};
pub use health::{ConnectionState, HealthReport, HealthService, HealthStatus};
pub use jwt_auth::{AUTH_COOKIE, AuthError, AuthenticatedUser, JwtAuth, extract_token};
pub use memory_store::InMemoryStore;
pub use pg_store::PgStore;
pub use store::{ActivityStore, StoreDescription, StoreError, StoreInfo, UserStore};
pub use users::{UserService, format_file_size};
