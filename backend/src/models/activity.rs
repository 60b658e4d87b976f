//! Activity log events and analytics request/response types

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Western Indonesia Time (UTC+07:00, no daylight saving)
pub fn wib() -> FixedOffset {
    FixedOffset::east_opt(7 * 3600).expect("UTC+7 is a valid offset")
}

/// One bot interaction: a command, a URL, or any other message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ActivityEvent {
    pub user_id: String,
    pub description: String,
    /// Human-readable timestamp as written by the bot, e.g. `05-03-2024 10:11 WIB`
    pub timestamp_label: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ActivityEvent {
    pub fn new(
        user_id: impl Into<String>,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            description: description.into(),
            timestamp_label: None,
            created_at,
        }
    }

    pub fn is_command(&self) -> bool {
        self.description.starts_with('/')
    }

    pub fn is_url(&self) -> bool {
        self.description
            .get(..5)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("https"))
    }
}

/// Analytics lookback window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "3d")]
    ThreeDays,
    #[serde(rename = "7d")]
    #[default]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
    #[serde(rename = "90d")]
    NinetyDays,
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneDay => write!(f, "1d"),
            Self::ThreeDays => write!(f, "3d"),
            Self::SevenDays => write!(f, "7d"),
            Self::ThirtyDays => write!(f, "30d"),
            Self::NinetyDays => write!(f, "90d"),
        }
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1d" => Ok(Self::OneDay),
            "3d" => Ok(Self::ThreeDays),
            "7d" => Ok(Self::SevenDays),
            "30d" => Ok(Self::ThirtyDays),
            "90d" => Ok(Self::NinetyDays),
            _ => Err(format!(
                "Invalid timeframe: {s}. Valid values are: 1d, 3d, 7d, 30d, 90d"
            )),
        }
    }
}

impl Timeframe {
    pub fn days(&self) -> i64 {
        match self {
            Self::OneDay => 1,
            Self::ThreeDays => 3,
            Self::SevenDays => 7,
            Self::ThirtyDays => 30,
            Self::NinetyDays => 90,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::days(self.days())
    }

    /// Chart bucket granularity: hourly for short windows, monthly for 90d
    pub fn bucket_format(&self) -> &'static str {
        match self {
            Self::OneDay | Self::ThreeDays => "%Y-%m-%d %H:00",
            Self::SevenDays | Self::ThirtyDays => "%Y-%m-%d",
            Self::NinetyDays => "%Y-%m",
        }
    }
}

fn default_timeframe() -> String {
    Timeframe::default().to_string()
}

fn default_stats_type() -> String {
    "commands".to_string()
}

fn default_unique_only() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsTimeframeRequest {
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
}

impl Default for AnalyticsTimeframeRequest {
    fn default() -> Self {
        Self {
            timeframe: default_timeframe(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsStatsRequest {
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    /// `commands` or `urls`. Accepted and logged only; the route decides
    /// which list is computed.
    #[serde(default = "default_stats_type")]
    pub stats_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsUsersRequest {
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    #[serde(default = "default_unique_only")]
    pub unique_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartPoint {
    pub date: String,
    pub unique_visitors: i64,
    pub total_analytics: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsOverview {
    pub timeframe: String,
    pub period_unique_visitors: i64,
    pub period_total_analytics: i64,
    pub previous_period_total_analytics: i64,
    pub growth_rate: f64,
    pub chart_data: Vec<ChartPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyActiveUsers {
    pub unique_active_today: i64,
    pub total_active_today: i64,
    pub date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandStat {
    pub command: String,
    pub total_count: i64,
    pub unique_users: i64,
    pub trend_data: Vec<i64>,
    pub trend_dates: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandStats {
    pub timeframe: String,
    pub commands: Vec<CommandStat>,
    pub total_commands: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UrlStat {
    pub url: String,
    pub display_url: String,
    pub total_count: i64,
    pub unique_users: i64,
    pub trend_data: Vec<i64>,
    pub trend_dates: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UrlStats {
    pub timeframe: String,
    pub urls: Vec<UrlStat>,
    pub total_urls: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub timeframe: String,
    pub overview: AnalyticsOverview,
    pub daily_users: DailyActiveUsers,
    pub top_commands: CommandStats,
    pub top_urls: UrlStats,
    pub generated_at: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleDataResult {
    pub success: bool,
    pub message: String,
    pub sample_count: u64,
    pub date_range: String,
}
