//! User Service
//!
//! Listing, search and aggregate reports over the bot's user documents.
//! Reports are computed in Rust over a full scan; the collection is small
//! enough that one pass beats a dozen JSONB aggregate queries.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use tracing::{debug, info};

use crate::models::{
    DailySignups, MembershipTier, PageWindow, Platform, PlatformUsage, QuickStats, SearchParams,
    TierBreakdown, TopUser, UserAnalyticsReport, UserDocument, UserFilter, UserOverview,
    UserSearchRequest, UsersPage, UsersRequest, paths,
};
use crate::services::store::{StoreError, UserStore};

/// Window covered by the daily signup chart
const SIGNUP_WINDOW_DAYS: i64 = 30;

/// Number of users in the top downloaders list
const TOP_USERS_LIMIT: usize = 10;

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// One page over all users, newest first
    pub async fn get_users(&self, request: &UsersRequest) -> Result<UsersPage, StoreError> {
        let window = PageWindow::new(request.skip, request.limit);
        let filter = UserFilter::default();

        let total = self.store.count_users(&filter).await?;
        let users = self
            .store
            .list_users(&filter, window.skip, window.limit)
            .await?;

        debug!(
            "Listed {} of {} users (skip={}, limit={})",
            users.len(),
            total,
            window.skip,
            window.limit
        );

        Ok(UsersPage::new(users, total, window))
    }

    /// One page over the users matching every given filter
    pub async fn search_users(&self, request: &UserSearchRequest) -> Result<UsersPage, StoreError> {
        let window = PageWindow::new(request.skip, request.limit);
        let filter = UserFilter::from_request(request);

        let total = self.store.count_users(&filter).await?;
        let users = self
            .store
            .list_users(&filter, window.skip, window.limit)
            .await?;

        debug!("Search {:?} matched {} users", filter, total);

        let mut page = UsersPage::new(users, total, window);
        page.search_params = Some(SearchParams::from(request));
        Ok(page)
    }

    pub async fn user_analytics(
        &self,
        date_range: &str,
        now: DateTime<Utc>,
    ) -> Result<UserAnalyticsReport, StoreError> {
        let users = self.store.scan_users().await?;
        info!("Computing user analytics over {} users", users.len());

        Ok(UserAnalyticsReport {
            overview: overview(&users),
            daily_activity: daily_signups(&users, now),
            membership_distribution: membership_distribution(&users),
            top_users: top_users(&users),
            platform_usage: platform_usage(&users),
            date_range: date_range.to_string(),
            generated_at: now,
        })
    }

    pub async fn quick_stats(&self, uptime: Duration) -> Result<QuickStats, StoreError> {
        let users = self.store.scan_users().await?;
        let total_size = saturating_total(users.iter().map(UserDocument::total_size));

        Ok(QuickStats {
            total_users: users.len() as i64,
            total_downloads: saturating_total(users.iter().map(UserDocument::total_downloads)),
            active_users: count(&users, |u| u.has_value(paths::LAST_DOWNLOAD_TIME)),
            premium_users: count(&users, |u| {
                u.tier().is_some_and(|tier| {
                    MembershipTier::PAID
                        .iter()
                        .any(|paid| paid.as_str() == tier)
                })
            }),
            users_with_session: count(&users, UserDocument::has_session),
            total_size,
            total_size_human: format_file_size(total_size),
            uptime_seconds: uptime.as_secs(),
            last_updated: Utc::now(),
        })
    }
}

fn count(users: &[UserDocument], predicate: impl Fn(&UserDocument) -> bool) -> i64 {
    users.iter().filter(|&u| predicate(u)).count() as i64
}

/// Sum that pins at the `i64` bounds instead of overflowing
fn saturating_total(values: impl Iterator<Item = i64>) -> i64 {
    values.fold(0, i64::saturating_add)
}

fn tier_count(users: &[UserDocument], tier: MembershipTier) -> i64 {
    count(users, |u| u.tier() == Some(tier.as_str()))
}

/// Headline counters; an empty collection yields all zeros
pub fn overview(users: &[UserDocument]) -> UserOverview {
    let total_users = users.len() as i64;
    let total_downloads = saturating_total(users.iter().map(UserDocument::total_downloads));
    let expired_memberships = count(users, UserDocument::subscription_expired);

    UserOverview {
        total_users,
        total_downloads,
        avg_downloads: if total_users > 0 {
            total_downloads as f64 / total_users as f64
        } else {
            0.0
        },
        freemium_users: tier_count(users, MembershipTier::Freemium),
        trial_users: tier_count(users, MembershipTier::Trial),
        premium_users: tier_count(users, MembershipTier::Premium),
        plus_users: tier_count(users, MembershipTier::Plus),
        vip_users: tier_count(users, MembershipTier::Vip),
        zenith_users: tier_count(users, MembershipTier::Zenith),
        users_with_session: count(users, UserDocument::has_session),
        expired_memberships,
        active_memberships: total_users - expired_memberships,
    }
}

/// New users per join day over the last 30 days, oldest first
///
/// Only the leading `YYYY-MM-DD` of `waktu_ditambahkan` is read; users whose
/// join date does not parse are skipped.
pub fn daily_signups(users: &[UserDocument], now: DateTime<Utc>) -> Vec<DailySignups> {
    let today = now.date_naive();
    let window_start = (now - ChronoDuration::days(SIGNUP_WINDOW_DAYS)).date_naive();

    let mut per_day: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for user in users {
        let Some(joined) = user.joined_at() else {
            continue;
        };
        let Some(date) = joined
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        else {
            continue;
        };
        if date > window_start && date <= today {
            *per_day.entry(date).or_default() += 1;
        }
    }

    per_day
        .into_iter()
        .take(SIGNUP_WINDOW_DAYS as usize)
        .map(|(date, new_users)| DailySignups {
            date: date.format("%Y-%m-%d").to_string(),
            new_users,
        })
        .collect()
}

/// Users and downloads per tier, largest tier first
pub fn membership_distribution(users: &[UserDocument]) -> Vec<TierBreakdown> {
    let mut tiers: HashMap<String, TierBreakdown> = HashMap::new();
    for user in users {
        let tier = user
            .tier()
            .unwrap_or(MembershipTier::Freemium.as_str())
            .to_string();
        let entry = tiers.entry(tier.clone()).or_insert(TierBreakdown {
            tier,
            count: 0,
            total_downloads: 0,
        });
        entry.count += 1;
        entry.total_downloads = entry.total_downloads.saturating_add(user.total_downloads());
    }

    let mut breakdown: Vec<TierBreakdown> = tiers.into_values().collect();
    breakdown.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tier.cmp(&b.tier)));
    breakdown
}

pub fn top_users(users: &[UserDocument]) -> Vec<TopUser> {
    let mut downloaders: Vec<&UserDocument> =
        users.iter().filter(|u| u.total_downloads() > 0).collect();
    downloaders.sort_by(|a, b| {
        b.total_downloads()
            .cmp(&a.total_downloads())
            .then_with(|| a.id.cmp(&b.id))
    });

    downloaders
        .into_iter()
        .take(TOP_USERS_LIMIT)
        .map(|u| TopUser {
            id: u.id.clone(),
            username: u.text(paths::USERNAME),
            nama_depan: u.text(paths::FIRST_NAME),
            total_downloads: u.total_downloads(),
            membership_tier: u.tier().map(String::from),
        })
        .collect()
}

pub fn platform_usage(users: &[UserDocument]) -> PlatformUsage {
    let used = |platform: Platform| count(users, |u| u.used_feature(platform));

    PlatformUsage {
        telegram_users: used(Platform::Telegram),
        tiktok_users: used(Platform::TikTok),
        instagram_users: used(Platform::Instagram),
        doodstream_users: used(Platform::Doodstream),
    }
}

/// Human-readable byte count, e.g. `1.50 MB`
pub fn format_file_size(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes <= 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    format!("{:.2} {}", size, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory_store::InMemoryStore;
    use chrono::TimeZone;
    use serde_json::json;

    fn user(id: &str, tier: Option<&str>, downloads: i64, joined: &str) -> UserDocument {
        let mut document = json!({
            "User Info": {"username": format!("user_{id}"), "waktu_ditambahkan": joined},
            "Bot Usage": {"total_downloads": downloads, "total_size": downloads * 1024},
        });
        if let Some(tier) = tier {
            document["Membership"] = json!({"tier": tier});
        }
        UserDocument::new(id, document)
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512.00 B");
        assert_eq!(format_file_size(1536), "1.50 KB");
        assert_eq!(format_file_size(1_048_576), "1.00 MB");
        assert_eq!(format_file_size(5 * 1024_i64.pow(4)), "5.00 TB");
        assert_eq!(format_file_size(2048 * 1024_i64.pow(4)), "2048.00 TB");
    }

    #[test]
    fn test_overview_empty() {
        assert_eq!(overview(&[]), UserOverview::default());
    }

    #[test]
    fn test_overview_counts() {
        let mut expired = user("c", Some("Premium"), 0, "2024-06-01");
        expired.document["Membership"]["subscription_expired"] = json!(true);

        let users = vec![
            user("a", Some("VIP"), 10, "2024-06-01"),
            user("b", None, 5, "2024-06-01"),
            expired,
        ];
        let result = overview(&users);

        assert_eq!(result.total_users, 3);
        assert_eq!(result.total_downloads, 15);
        assert_eq!(result.avg_downloads, 5.0);
        assert_eq!(result.vip_users, 1);
        assert_eq!(result.premium_users, 1);
        // A missing tier is not counted as any named tier here
        assert_eq!(result.freemium_users, 0);
        assert_eq!(result.expired_memberships, 1);
        assert_eq!(result.active_memberships, 2);
    }

    #[test]
    fn test_totals_saturate() {
        let mut users = vec![
            user("a", Some("Plus"), 1, "2024-06-01"),
            user("b", Some("Plus"), 1, "2024-06-01"),
        ];
        for u in &mut users {
            u.document["Bot Usage"]["total_downloads"] = json!(i64::MAX - 1);
            u.document["Bot Usage"]["total_size"] = json!(i64::MAX - 1);
        }

        assert_eq!(overview(&users).total_downloads, i64::MAX);
        assert_eq!(membership_distribution(&users)[0].total_downloads, i64::MAX);
        assert_eq!(
            saturating_total(users.iter().map(UserDocument::total_size)),
            i64::MAX
        );
    }

    #[test]
    fn test_daily_signups_window() {
        let users = vec![
            user("a", None, 0, "2024-06-30 09:00:00"),
            user("b", None, 0, "2024-06-30 10:00:00"),
            user("c", None, 0, "2024-06-15 10:00:00"),
            user("d", None, 0, "2024-05-01 10:00:00"),
            user("e", None, 0, "2024-07-01 10:00:00"),
            user("f", None, 0, "yesterday"),
        ];

        let days = daily_signups(&users, fixed_now());
        assert_eq!(
            days,
            vec![
                DailySignups {
                    date: "2024-06-15".into(),
                    new_users: 1
                },
                DailySignups {
                    date: "2024-06-30".into(),
                    new_users: 2
                },
            ]
        );
    }

    #[test]
    fn test_membership_distribution_defaults_to_freemium() {
        let users = vec![
            user("a", None, 3, "2024-06-01"),
            user("b", Some("Freemium"), 2, "2024-06-01"),
            user("c", Some("Zenith"), 100, "2024-06-01"),
        ];

        let breakdown = membership_distribution(&users);
        assert_eq!(breakdown[0].tier, "Freemium");
        assert_eq!(breakdown[0].count, 2);
        assert_eq!(breakdown[0].total_downloads, 5);
        assert_eq!(breakdown[1].tier, "Zenith");
    }

    #[test]
    fn test_top_users() {
        let mut users: Vec<UserDocument> = (0..15)
            .map(|i| user(&format!("u{i:02}"), Some("Trial"), i, "2024-06-01"))
            .collect();
        users.push(user("zero", None, 0, "2024-06-01"));

        let top = top_users(&users);
        assert_eq!(top.len(), 10);
        assert_eq!(top[0].id, "u14");
        assert_eq!(top[0].total_downloads, 14);
        assert_eq!(top[0].username.as_deref(), Some("user_u14"));
        assert!(top.iter().all(|u| u.total_downloads > 0));
    }

    #[test]
    fn test_platform_usage() {
        let mut a = user("a", None, 0, "");
        a.document["Bot Usage"]["last_feature_usage"] =
            json!({"TikTok": ["video"], "Telegram": []});
        let mut b = user("b", None, 0, "");
        b.document["Bot Usage"]["last_feature_usage"] = json!({"TikTok": ["photo"]});

        let usage = platform_usage(&[a, b]);
        assert_eq!(usage.tiktok_users, 2);
        assert_eq!(usage.telegram_users, 0);
    }

    #[tokio::test]
    async fn test_quick_stats() {
        let mut active = user("a", Some("Plus"), 4, "2024-06-01");
        active.document["Bot Usage"]["last_download_time"] = json!("2024-06-02 10:00");
        let store = InMemoryStore::with_users(vec![
            active,
            user("b", Some("Trial"), 1, "2024-06-01"),
        ])
        .await
        .unwrap();

        let service = UserService::new(Arc::new(store));
        let stats = service.quick_stats(Duration::from_secs(90)).await.unwrap();

        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.total_downloads, 5);
        assert_eq!(stats.active_users, 1);
        assert_eq!(stats.premium_users, 1);
        assert_eq!(stats.total_size, 5 * 1024);
        assert_eq!(stats.total_size_human, "5.00 KB");
        assert_eq!(stats.uptime_seconds, 90);
    }

    #[tokio::test]
    async fn test_search_users_echoes_params() {
        let store = InMemoryStore::with_users(vec![
            user("a", Some("Premium"), 1, "2024-06-01"),
            user("b", Some("Trial"), 1, "2024-06-02"),
        ])
        .await
        .unwrap();
        let service = UserService::new(Arc::new(store));

        let request = UserSearchRequest {
            get_data: "users".into(),
            membership_filter: Some("premium".into()),
            limit: 10,
            ..Default::default()
        };
        let page = service.search_users(&request).await.unwrap();

        assert_eq!(page.total_count, 1);
        assert_eq!(page.users[0]["_id"], "a");
        let params = page.search_params.unwrap();
        assert_eq!(params.membership_filter.as_deref(), Some("premium"));
    }

    #[tokio::test]
    async fn test_user_analytics_report() {
        let store = InMemoryStore::with_users(vec![user("a", None, 2, "2024-06-29 08:00")])
            .await
            .unwrap();
        let service = UserService::new(Arc::new(store));

        let report = service.user_analytics("7d", fixed_now()).await.unwrap();
        assert_eq!(report.date_range, "7d");
        assert_eq!(report.overview.total_users, 1);
        assert_eq!(report.daily_activity.len(), 1);
        assert_eq!(report.top_users.len(), 1);
        assert_eq!(report.generated_at, fixed_now());
    }
}
