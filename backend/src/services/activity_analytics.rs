//! Activity Analytics Service
//!
//! Visitor, command and URL statistics over the bot's activity log. Events
//! are fetched for the requested window and bucketed in Western Indonesia
//! Time, the bot's home timezone.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{
    ActivityEvent, AnalyticsOverview, AnalyticsSummary, ChartPoint, CommandStat, CommandStats,
    DailyActiveUsers, SampleDataResult, Timeframe, UrlStat, UrlStats, wib,
};
use crate::services::store::{ActivityStore, StoreDescription, StoreError, StoreInfo};

/// Entries in the command and URL leaderboards
const TOP_ENTRIES: usize = 10;

/// Days covered by generated sample data
const SAMPLE_DAYS: i64 = 30;

/// Daily trend bucket, independent of the timeframe's chart granularity
const TREND_FORMAT: &str = "%Y-%m-%d";

/// Errors that can occur during analytics operations
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("{0}")]
    InvalidTimeframe(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Parse a timeframe parameter
pub fn parse_timeframe(raw: &str) -> Result<Timeframe, AnalyticsError> {
    raw.parse().map_err(AnalyticsError::InvalidTimeframe)
}

/// What the debug endpoint reports about the backing store
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseDebugInfo {
    pub database_name: String,
    #[serde(flatten)]
    pub store: StoreDescription,
}

#[derive(Clone)]
pub struct ActivityAnalyticsService {
    events: Arc<dyn ActivityStore>,
    info: Arc<dyn StoreInfo>,
}

impl ActivityAnalyticsService {
    pub fn new(events: Arc<dyn ActivityStore>, info: Arc<dyn StoreInfo>) -> Self {
        Self { events, info }
    }

    pub async fn overview(&self, timeframe: &str) -> Result<AnalyticsOverview, AnalyticsError> {
        self.overview_at(parse_timeframe(timeframe)?, Utc::now()).await
    }

    /// Visitors and events for the window ending at `now`, compared against
    /// the window of equal length just before it
    pub async fn overview_at(
        &self,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> Result<AnalyticsOverview, AnalyticsError> {
        let start = now - timeframe.duration();
        let previous_start = start - timeframe.duration();

        let events = self.events.events_between(previous_start, now).await?;
        let (current, previous): (Vec<&ActivityEvent>, Vec<&ActivityEvent>) =
            events.iter().partition(|e| e.created_at >= start);

        let visitors: HashSet<&str> = current.iter().map(|e| e.user_id.as_str()).collect();
        let period_total = current.len() as i64;
        let previous_total = previous.len() as i64;

        debug!(
            "Overview {}: {} events, {} visitors, {} events in previous period",
            timeframe,
            period_total,
            visitors.len(),
            previous_total
        );

        Ok(AnalyticsOverview {
            timeframe: timeframe.to_string(),
            period_unique_visitors: visitors.len() as i64,
            period_total_analytics: period_total,
            previous_period_total_analytics: previous_total,
            growth_rate: growth_rate(period_total, previous_total),
            chart_data: chart_points(&current, timeframe.bucket_format()),
        })
    }

    pub async fn daily_active_users(
        &self,
        timeframe: &str,
    ) -> Result<DailyActiveUsers, AnalyticsError> {
        parse_timeframe(timeframe)?;
        self.daily_active_users_at(Utc::now()).await
    }

    /// Activity over the current WIB calendar day
    pub async fn daily_active_users_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<DailyActiveUsers, AnalyticsError> {
        let local = now.with_timezone(&wib());
        let day = local.date_naive();

        let day_start = day
            .and_time(NaiveTime::MIN)
            .and_local_timezone(wib())
            .single()
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(now);
        let day_end = day_start + Duration::days(1) - Duration::microseconds(1);

        let events = self.events.events_between(day_start, day_end).await?;
        let unique: HashSet<&str> = events.iter().map(|e| e.user_id.as_str()).collect();

        Ok(DailyActiveUsers {
            unique_active_today: unique.len() as i64,
            total_active_today: events.len() as i64,
            date: day.format("%Y-%m-%d").to_string(),
        })
    }

    pub async fn command_stats(&self, timeframe: &str) -> Result<CommandStats, AnalyticsError> {
        self.command_stats_at(parse_timeframe(timeframe)?, Utc::now())
            .await
    }

    /// Most used `/commands` in the window
    pub async fn command_stats_at(
        &self,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> Result<CommandStats, AnalyticsError> {
        let events = self
            .events
            .events_between(now - timeframe.duration(), now)
            .await?;

        let commands: Vec<CommandStat> = leaderboard(events.iter().filter(|e| e.is_command()))
            .into_iter()
            .map(|entry| CommandStat {
                command: entry.description,
                total_count: entry.total_count,
                unique_users: entry.unique_users,
                trend_data: entry.trend_data,
                trend_dates: entry.trend_dates,
            })
            .collect();

        Ok(CommandStats {
            timeframe: timeframe.to_string(),
            total_commands: commands.len(),
            commands,
        })
    }

    pub async fn url_stats(&self, timeframe: &str) -> Result<UrlStats, AnalyticsError> {
        self.url_stats_at(parse_timeframe(timeframe)?, Utc::now())
            .await
    }

    /// Most shared `https` links in the window
    pub async fn url_stats_at(
        &self,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> Result<UrlStats, AnalyticsError> {
        let events = self
            .events
            .events_between(now - timeframe.duration(), now)
            .await?;

        let urls: Vec<UrlStat> = leaderboard(events.iter().filter(|e| e.is_url()))
            .into_iter()
            .map(|entry| UrlStat {
                display_url: display_host(&entry.description).to_string(),
                url: entry.description,
                total_count: entry.total_count,
                unique_users: entry.unique_users,
                trend_data: entry.trend_data,
                trend_dates: entry.trend_dates,
            })
            .collect();

        Ok(UrlStats {
            timeframe: timeframe.to_string(),
            total_urls: urls.len(),
            urls,
        })
    }

    pub async fn summary(&self, timeframe: &str) -> Result<AnalyticsSummary, AnalyticsError> {
        self.summary_at(parse_timeframe(timeframe)?, Utc::now())
            .await
    }

    /// Every report for one timeframe, computed concurrently
    pub async fn summary_at(
        &self,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> Result<AnalyticsSummary, AnalyticsError> {
        let (overview, daily_users, top_commands, top_urls) = tokio::try_join!(
            self.overview_at(timeframe, now),
            self.daily_active_users_at(now),
            self.command_stats_at(timeframe, now),
            self.url_stats_at(timeframe, now),
        )?;

        Ok(AnalyticsSummary {
            timeframe: timeframe.to_string(),
            overview,
            daily_users,
            top_commands,
            top_urls,
            generated_at: now.with_timezone(&wib()),
        })
    }

    pub async fn debug_structure(
        &self,
        database_name: &str,
    ) -> Result<DatabaseDebugInfo, AnalyticsError> {
        let store = self.info.describe().await?;
        info!(
            "Store {} holds {} users and {} events",
            store.backend, store.user_count, store.event_count
        );

        Ok(DatabaseDebugInfo {
            database_name: database_name.to_string(),
            store,
        })
    }

    pub async fn create_sample_data(&self) -> Result<SampleDataResult, AnalyticsError> {
        self.create_sample_data_at(Utc::now()).await
    }

    /// Seed the activity log with a month of synthetic commands and links
    pub async fn create_sample_data_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SampleDataResult, AnalyticsError> {
        let events = sample_events(now);
        let inserted = self.events.insert_events(&events).await?;
        info!("Inserted {} sample activity events", inserted);

        Ok(SampleDataResult {
            success: true,
            message: format!("Created {inserted} sample analytics documents"),
            sample_count: inserted,
            date_range: format!(
                "Last {SAMPLE_DAYS} days from {}",
                now.with_timezone(&wib()).format("%Y-%m-%d")
            ),
        })
    }
}

/// Percentage change from `previous` to `current`
///
/// With no previous activity any current activity counts as 100% growth.
pub fn growth_rate(current: i64, previous: i64) -> f64 {
    if previous == 0 {
        if current > 0 { 100.0 } else { 0.0 }
    } else {
        (current - previous) as f64 / previous as f64 * 100.0
    }
}

/// Host part of a link, e.g. `d-s.io` for `https://d-s.io/e/abc`
pub fn display_host(url: &str) -> &str {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));

    match rest {
        Some(rest) => match rest.split('/').next() {
            Some(host) if !host.is_empty() => host,
            _ => url,
        },
        None => url,
    }
}

fn wib_bucket(event: &ActivityEvent, format: &str) -> String {
    event
        .created_at
        .with_timezone(&wib())
        .format(format)
        .to_string()
}

fn chart_points(events: &[&ActivityEvent], format: &str) -> Vec<ChartPoint> {
    let mut buckets: BTreeMap<String, (HashSet<&str>, i64)> = BTreeMap::new();
    for event in events {
        let (visitors, total) = buckets.entry(wib_bucket(event, format)).or_default();
        visitors.insert(event.user_id.as_str());
        *total += 1;
    }

    buckets
        .into_iter()
        .map(|(date, (visitors, total))| ChartPoint {
            date,
            unique_visitors: visitors.len() as i64,
            total_analytics: total,
        })
        .collect()
}

struct LeaderboardEntry {
    description: String,
    total_count: i64,
    unique_users: i64,
    trend_data: Vec<i64>,
    trend_dates: Vec<String>,
}

#[derive(Default)]
struct Tally<'a> {
    total: i64,
    users: HashSet<&'a str>,
    per_day: BTreeMap<String, i64>,
}

/// Group events by description and keep the busiest ones, ties by name
fn leaderboard<'a>(events: impl Iterator<Item = &'a ActivityEvent>) -> Vec<LeaderboardEntry> {
    let mut tallies: HashMap<&'a str, Tally<'a>> = HashMap::new();
    for event in events {
        let tally = tallies.entry(event.description.as_str()).or_default();
        tally.total += 1;
        tally.users.insert(event.user_id.as_str());
        *tally
            .per_day
            .entry(wib_bucket(event, TREND_FORMAT))
            .or_default() += 1;
    }

    let mut ranked: Vec<(&str, Tally)> = tallies.into_iter().collect();
    ranked.sort_by(|(a_name, a), (b_name, b)| b.total.cmp(&a.total).then_with(|| a_name.cmp(b_name)));

    ranked
        .into_iter()
        .take(TOP_ENTRIES)
        .map(|(description, tally)| LeaderboardEntry {
            description: description.to_string(),
            total_count: tally.total,
            unique_users: tally.users.len() as i64,
            trend_dates: tally.per_day.keys().cloned().collect(),
            trend_data: tally.per_day.into_values().collect(),
        })
        .collect()
}

/// A month of synthetic activity ending at `now`
///
/// Day `i` back from today gets `5 + i % 10` events cycling through
/// `/start`, `/mode` and a link, from ten rotating user ids.
pub fn sample_events(now: DateTime<Utc>) -> Vec<ActivityEvent> {
    let mut events = Vec::new();

    for day in 0..SAMPLE_DAYS {
        let at = now - Duration::days(day);
        let label = at.with_timezone(&wib()).format("%d-%m-%Y %H:%M WIB").to_string();

        for j in 0..(5 + day % 10) {
            let description = match j % 3 {
                0 => "/start".to_string(),
                1 => "/mode".to_string(),
                _ => format!("https://d-s.io/e/h7ecgw5oqn8{}", j % 100),
            };

            events.push(ActivityEvent {
                user_id: format!("762248265{}", j % 10),
                description,
                timestamp_label: Some(label.clone()),
                created_at: at,
            });
        }
    }

    events
}
