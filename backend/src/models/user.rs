//! Bot user documents and user query types
//!
//! A user record is the bot's complete JSON document, stored as-is. The
//! accessors here read the handful of paths the dashboard cares about.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// JSON paths into a user document
pub mod paths {
    pub const USER_ID: &[&str] = &["User Info", "user_id"];
    pub const USERNAME: &[&str] = &["User Info", "username"];
    pub const FIRST_NAME: &[&str] = &["User Info", "nama_depan"];
    pub const JOINED_AT: &[&str] = &["User Info", "waktu_ditambahkan"];
    pub const SESSION_USERNAME: &[&str] = &["Data Lengkap Sesi", "Basic Information", "Username"];
    pub const SESSION_FIRST_NAME: &[&str] =
        &["Data Lengkap Sesi", "Basic Information", "First Name"];

    pub const USER_SESSION_STRING: &[&str] = &["User Info", "session_string"];
    pub const SESSION_INFO_STRING: &[&str] = &["Data Lengkap Sesi", "Session Info", "session_string"];
    pub const SESSION_INFO_STRING_LEGACY: &[&str] =
        &["Data Lengkap Sesi", "Session Info", "Session String"];

    pub const TIER: &[&str] = &["Membership", "tier"];
    pub const SUBSCRIPTION_EXPIRED: &[&str] = &["Membership", "subscription_expired"];
    pub const TOTAL_DOWNLOADS: &[&str] = &["Bot Usage", "total_downloads"];
    pub const TOTAL_SIZE: &[&str] = &["Bot Usage", "total_size"];
    pub const LAST_DOWNLOAD_TIME: &[&str] = &["Bot Usage", "last_download_time"];
    pub const LAST_FEATURE_USAGE: &[&str] = &["Bot Usage", "last_feature_usage"];

    /// Fields matched by free-text search
    pub const SEARCHABLE: [&[&str]; 5] = [
        USER_ID,
        USERNAME,
        FIRST_NAME,
        SESSION_USERNAME,
        SESSION_FIRST_NAME,
    ];

    /// Every location a session string has been written to over time
    pub const SESSION_STRINGS: [&[&str]; 3] = [
        USER_SESSION_STRING,
        SESSION_INFO_STRING,
        SESSION_INFO_STRING_LEGACY,
    ];
}

/// Top-level sections returned by the listing endpoints
const PROJECTED_SECTIONS: [&str; 5] = [
    "User Info",
    "Bot Usage",
    "Membership",
    "Data Lengkap Sesi",
    "Referral",
];

/// A stored bot user
#[derive(Debug, Clone, PartialEq)]
pub struct UserDocument {
    pub id: String,
    pub document: Value,
}

impl UserDocument {
    pub fn new(id: impl Into<String>, document: Value) -> Self {
        Self {
            id: id.into(),
            document,
        }
    }

    /// Walk a nested path of object keys
    pub fn field(&self, path: &[&str]) -> Option<&Value> {
        path.iter()
            .try_fold(&self.document, |value, key| value.get(*key))
    }

    /// Scalar at `path` rendered as text, the way PostgreSQL's `#>>` does
    pub fn text(&self, path: &[&str]) -> Option<String> {
        match self.field(path)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// True when `path` holds anything other than null or an empty string
    pub fn has_value(&self, path: &[&str]) -> bool {
        match self.field(path) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }

    pub fn tier(&self) -> Option<&str> {
        self.field(paths::TIER).and_then(Value::as_str)
    }

    pub fn joined_at(&self) -> Option<String> {
        self.text(paths::JOINED_AT)
    }

    pub fn total_downloads(&self) -> i64 {
        self.field(paths::TOTAL_DOWNLOADS)
            .and_then(as_integer)
            .unwrap_or(0)
    }

    pub fn total_size(&self) -> i64 {
        self.field(paths::TOTAL_SIZE).and_then(as_integer).unwrap_or(0)
    }

    /// Whether any known session string location is populated
    pub fn has_session(&self) -> bool {
        paths::SESSION_STRINGS
            .iter()
            .any(|path| self.has_value(path))
    }

    pub fn subscription_expired(&self) -> bool {
        self.field(paths::SUBSCRIPTION_EXPIRED) == Some(&Value::Bool(true))
    }

    /// Usage counter for a platform, only when stored as a JSON number
    pub fn platform_usage(&self, platform: Platform) -> Option<f64> {
        self.field(&platform.usage_path())
            .and_then(Value::as_f64)
    }

    /// Whether the last-feature-usage list for a platform is non-empty
    pub fn used_feature(&self, platform: Platform) -> bool {
        self.field(paths::LAST_FEATURE_USAGE)
            .and_then(|usage| usage.get(platform.section()))
            .and_then(Value::as_array)
            .is_some_and(|entries| !entries.is_empty())
    }

    /// The listing view: `_id` plus the dashboard sections, with
    /// `Bot Usage.total_size` normalised to an integer
    pub fn projected(&self) -> Value {
        let mut out = Map::new();
        out.insert("_id".to_string(), Value::String(self.id.clone()));

        for section in PROJECTED_SECTIONS {
            if let Some(value) = self.document.get(section) {
                out.insert(section.to_string(), value.clone());
            }
        }

        if let Some(Value::Object(bot_usage)) = out.get_mut("Bot Usage") {
            bot_usage.insert("total_size".to_string(), Value::from(self.total_size()));
        }

        Value::Object(out)
    }
}

/// Read an integer from a JSON number or an extended-JSON `$numberLong`
pub fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::Object(obj) => obj
            .get("$numberLong")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok()),
        _ => None,
    }
}

/// Membership tiers, in ascending order of privilege
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MembershipTier {
    Freemium,
    Trial,
    Premium,
    Plus,
    Vip,
    Zenith,
}

impl MembershipTier {
    pub const ALL: [MembershipTier; 6] = [
        Self::Freemium,
        Self::Trial,
        Self::Premium,
        Self::Plus,
        Self::Vip,
        Self::Zenith,
    ];

    /// Tiers that count as paid for quick stats
    pub const PAID: [MembershipTier; 4] = [Self::Premium, Self::Plus, Self::Vip, Self::Zenith];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Freemium => "Freemium",
            Self::Trial => "Trial",
            Self::Premium => "Premium",
            Self::Plus => "Plus",
            Self::Vip => "VIP",
            Self::Zenith => "Zenith",
        }
    }

    /// Resolve a case-insensitive filter alias
    pub fn from_alias(alias: &str) -> Option<Self> {
        match alias.to_ascii_lowercase().as_str() {
            "freemium" => Some(Self::Freemium),
            "trial" => Some(Self::Trial),
            "premium" => Some(Self::Premium),
            "plus" => Some(Self::Plus),
            "vip" => Some(Self::Vip),
            "zenith" => Some(Self::Zenith),
            _ => None,
        }
    }
}

impl fmt::Display for MembershipTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Download platforms tracked in `Bot Usage`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Telegram,
    TikTok,
    Instagram,
    Doodstream,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Self::Telegram,
        Self::TikTok,
        Self::Instagram,
        Self::Doodstream,
    ];

    /// Section name under `Bot Usage`
    pub fn section(&self) -> &'static str {
        match self {
            Self::Telegram => "Telegram",
            Self::TikTok => "TikTok",
            Self::Instagram => "Instagram",
            Self::Doodstream => "Doodstream",
        }
    }

    pub fn usage_key(&self) -> &'static str {
        match self {
            Self::Telegram => "telegram_usage",
            Self::TikTok => "tiktok_usage",
            Self::Instagram => "instagram_usage",
            Self::Doodstream => "doodstream_usage",
        }
    }

    pub fn usage_path(&self) -> [&'static str; 3] {
        ["Bot Usage", self.section(), self.usage_key()]
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "telegram" => Ok(Self::Telegram),
            "tiktok" => Ok(Self::TikTok),
            "instagram" => Ok(Self::Instagram),
            "doodstream" => Ok(Self::Doodstream),
            _ => Err(format!("Unknown platform: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFilter {
    WithSession,
    WithoutSession,
}

impl FromStr for SessionFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "with_session" => Ok(Self::WithSession),
            "without_session" => Ok(Self::WithoutSession),
            _ => Err(format!("Unknown session filter: {s}")),
        }
    }
}

/// Resolved search criteria. Every populated field must match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserFilter {
    /// Case-insensitive literal substring over the searchable fields
    pub search: Option<String>,
    /// Join date, matched as a prefix of `waktu_ditambahkan`
    pub joined_on: Option<NaiveDate>,
    /// Exact `Membership.tier`
    pub tier: Option<String>,
    pub session: Option<SessionFilter>,
    pub platform: Option<Platform>,
}

impl UserFilter {
    /// Build a filter from request parameters, dropping values that do not parse
    pub fn from_request(request: &UserSearchRequest) -> Self {
        let search = request
            .search_query
            .as_deref()
            .filter(|q| !q.is_empty())
            .map(String::from);

        let joined_on = request
            .date_filter
            .as_deref()
            .filter(|d| !d.is_empty())
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

        let tier = request
            .membership_filter
            .as_deref()
            .filter(|m| !m.is_empty())
            .map(|m| match MembershipTier::from_alias(m) {
                Some(tier) => tier.as_str().to_string(),
                None => m.to_string(),
            });

        let session = request
            .session_filter
            .as_deref()
            .and_then(|s| s.parse().ok());

        let platform = request
            .platform_filter
            .as_deref()
            .and_then(|p| p.parse().ok());

        Self {
            search,
            joined_on,
            tier,
            session,
            platform,
        }
    }

    /// Normalised join date prefix, e.g. `2024-01-05`
    pub fn joined_prefix(&self) -> Option<String> {
        self.joined_on.map(|d| d.format("%Y-%m-%d").to_string())
    }

    pub fn matches(&self, user: &UserDocument) -> bool {
        if let Some(needle) = &self.search {
            let needle = needle.to_lowercase();
            let hit = paths::SEARCHABLE.iter().any(|path| {
                user.text(path)
                    .is_some_and(|value| value.to_lowercase().contains(&needle))
            });
            if !hit {
                return false;
            }
        }

        if let Some(prefix) = self.joined_prefix() {
            if !user.joined_at().is_some_and(|j| j.starts_with(&prefix)) {
                return false;
            }
        }

        if let Some(tier) = &self.tier {
            if user.tier() != Some(tier.as_str()) {
                return false;
            }
        }

        match self.session {
            Some(SessionFilter::WithSession) if !user.has_session() => return false,
            Some(SessionFilter::WithoutSession) if user.has_session() => return false,
            _ => {}
        }

        if let Some(platform) = self.platform {
            if !user.platform_usage(platform).is_some_and(|n| n > 0.0) {
                return false;
            }
        }

        true
    }
}

fn default_limit() -> i64 {
    50
}

fn default_date_range() -> String {
    "30d".to_string()
}

/// Body of `POST /apiv1/hyperbot/users`
#[derive(Debug, Clone, Deserialize)]
pub struct UsersRequest {
    pub get_data: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub skip: i64,
}

/// Body of `POST /apiv1/hyperbot/users/search`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserSearchRequest {
    pub get_data: String,
    #[serde(default)]
    pub search_query: Option<String>,
    #[serde(default)]
    pub date_filter: Option<String>,
    #[serde(default)]
    pub membership_filter: Option<String>,
    #[serde(default)]
    pub session_filter: Option<String>,
    #[serde(default)]
    pub platform_filter: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub skip: i64,
}

/// Body of `POST /apiv1/hyperbot/analytics`
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsRequest {
    pub get_data: String,
    #[serde(default = "default_date_range")]
    pub date_range: String,
}

/// Validated offset/limit pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub skip: i64,
    pub limit: i64,
}

impl PageWindow {
    pub const MAX_LIMIT: i64 = 100;

    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip: skip.max(0),
            limit: limit.clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn current_page(&self) -> i64 {
        self.skip / self.limit + 1
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        let pages = total / self.limit + i64::from(total % self.limit > 0);
        pages.max(1)
    }

    pub fn has_next(&self, total: i64) -> bool {
        self.end() < total
    }

    pub fn has_previous(&self) -> bool {
        self.skip > 0
    }

    pub fn showing_from(&self, total: i64) -> i64 {
        if total > 0 { self.skip.saturating_add(1) } else { 0 }
    }

    pub fn showing_to(&self, total: i64) -> i64 {
        self.end().min(total)
    }

    /// Exclusive end offset, pinned at `i64::MAX` for huge offsets
    fn end(&self) -> i64 {
        self.skip.saturating_add(self.limit)
    }
}

/// Echo of the filters a search ran with
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchParams {
    pub search_query: Option<String>,
    pub date_filter: Option<String>,
    pub membership_filter: Option<String>,
    pub session_filter: Option<String>,
    pub platform_filter: Option<String>,
}

impl From<&UserSearchRequest> for SearchParams {
    fn from(request: &UserSearchRequest) -> Self {
        Self {
            search_query: request.search_query.clone(),
            date_filter: request.date_filter.clone(),
            membership_filter: request.membership_filter.clone(),
            session_filter: request.session_filter.clone(),
            platform_filter: request.platform_filter.clone(),
        }
    }
}

/// One page of users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersPage {
    pub users: Vec<Value>,
    pub total_count: i64,
    pub current_page: i64,
    pub total_pages: i64,
    pub per_page: i64,
    pub has_next: bool,
    pub has_previous: bool,
    pub showing_from: i64,
    pub showing_to: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_params: Option<SearchParams>,
    pub query_time: DateTime<Utc>,
}

impl UsersPage {
    pub fn new(users: Vec<UserDocument>, total: i64, window: PageWindow) -> Self {
        Self {
            users: users.iter().map(UserDocument::projected).collect(),
            total_count: total,
            current_page: window.current_page(),
            total_pages: window.total_pages(total),
            per_page: window.limit,
            has_next: window.has_next(total),
            has_previous: window.has_previous(),
            showing_from: window.showing_from(total),
            showing_to: window.showing_to(total),
            search_params: None,
            query_time: Utc::now(),
        }
    }
}

/// Aggregate counters over all users
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserOverview {
    pub total_users: i64,
    pub total_downloads: i64,
    pub avg_downloads: f64,
    pub freemium_users: i64,
    pub trial_users: i64,
    pub premium_users: i64,
    pub plus_users: i64,
    pub vip_users: i64,
    pub zenith_users: i64,
    pub users_with_session: i64,
    pub expired_memberships: i64,
    pub active_memberships: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailySignups {
    pub date: String,
    pub new_users: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TierBreakdown {
    pub tier: String,
    pub count: i64,
    pub total_downloads: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: Option<String>,
    pub nama_depan: Option<String>,
    pub total_downloads: i64,
    pub membership_tier: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlatformUsage {
    pub telegram_users: i64,
    pub tiktok_users: i64,
    pub instagram_users: i64,
    pub doodstream_users: i64,
}

/// Response of `POST /apiv1/hyperbot/analytics`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAnalyticsReport {
    pub overview: UserOverview,
    pub daily_activity: Vec<DailySignups>,
    pub membership_distribution: Vec<TierBreakdown>,
    pub top_users: Vec<TopUser>,
    pub platform_usage: PlatformUsage,
    pub date_range: String,
    pub generated_at: DateTime<Utc>,
}

/// Response of `GET /apiv1/hyperbot/stats`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickStats {
    pub total_users: i64,
    pub total_downloads: i64,
    pub active_users: i64,
    pub premium_users: i64,
    pub users_with_session: i64,
    pub total_size: i64,
    pub total_size_human: String,
    pub uptime_seconds: u64,
    pub last_updated: DateTime<Utc>,
}
