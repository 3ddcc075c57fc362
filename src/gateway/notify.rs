use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::error::{GatewayError, UpstreamError};

const ENABLE_LOGS: bool = true;

pub const CRON_SECRET_HEADER: &str = "x-cron-secret";

const MOOD_GAP_HOURS: i64 = 24;
const FOCUS_GAP_DAYS: i64 = 3;

/// Compares the shared secret without short-circuiting on the first
/// mismatched byte. An unset expected secret rejects everything.
pub fn authorize_cron(provided: Option<&str>, expected: &str) -> Result<(), GatewayError> {
    let Some(provided) = provided else {
        return Err(GatewayError::Unauthorized);
    };
    if expected.is_empty() || !constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
        return Err(GatewayError::Unauthorized);
    }
    Ok(())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HabitStatus {
    pub name: String,
    pub streak: u32,
    pub last_completed: Option<NaiveDate>,
}

impl HabitStatus {
    /// A running streak that was extended yesterday but not yet today.
    pub fn at_risk(&self, today: NaiveDate) -> bool {
        self.streak > 0 && self.last_completed == today.pred_opt()
    }
}

/// Recent activity for one user, as read from the backend tables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivitySummary {
    pub user_id: String,
    pub last_mood_log: Option<DateTime<Utc>>,
    pub last_focus_session: Option<DateTime<Utc>>,
    #[serde(default)]
    pub habits: Vec<HabitStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recommendation {
    MoodCheckIn,
    HabitReminder { habit: String, streak: u32 },
    FocusNudge,
}

impl Recommendation {
    pub fn kind(&self) -> &'static str {
        match self {
            Recommendation::MoodCheckIn => "mood_check_in",
            Recommendation::HabitReminder { .. } => "habit_reminder",
            Recommendation::FocusNudge => "focus_nudge",
        }
    }

    fn title(&self) -> String {
        match self {
            Recommendation::MoodCheckIn => "How are you feeling?".into(),
            Recommendation::HabitReminder { habit, .. } => format!("Keep your {habit} streak going"),
            Recommendation::FocusNudge => "Time for a focus session?".into(),
        }
    }

    fn body(&self) -> String {
        match self {
            Recommendation::MoodCheckIn => {
                "You haven't logged your mood today. A quick check-in only takes a second.".into()
            }
            Recommendation::HabitReminder { habit, streak } => {
                format!("You're on a {streak}-day {habit} streak. Don't let it slip today!")
            }
            Recommendation::FocusNudge => {
                "It's been a few days since your last focus session. Want to start a short one?"
                    .into()
            }
        }
    }
}

/// Row ready for insertion into the notifications table.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NotificationRow {
    pub user_id: String,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub scheduled_for: DateTime<Utc>,
    pub read: bool,
}

pub fn recommend(summary: &ActivitySummary, now: DateTime<Utc>) -> Vec<Recommendation> {
    let mut out = Vec::new();

    let mood_stale = summary
        .last_mood_log
        .map_or(true, |at| now - at >= Duration::hours(MOOD_GAP_HOURS));
    if mood_stale {
        out.push(Recommendation::MoodCheckIn);
    }

    let today = now.date_naive();
    out.extend(
        summary
            .habits
            .iter()
            .filter(|habit| habit.at_risk(today))
            .map(|habit| Recommendation::HabitReminder {
                habit: habit.name.clone(),
                streak: habit.streak,
            }),
    );

    let focus_stale = summary
        .last_focus_session
        .map_or(true, |at| now - at >= Duration::days(FOCUS_GAP_DAYS));
    if focus_stale {
        out.push(Recommendation::FocusNudge);
    }

    out
}

pub fn schedule_all(summaries: &[ActivitySummary], now: DateTime<Utc>) -> Vec<NotificationRow> {
    summaries
        .iter()
        .flat_map(|summary| {
            recommend(summary, now)
                .into_iter()
                .map(move |rec| NotificationRow {
                    user_id: summary.user_id.clone(),
                    kind: rec.kind().to_string(),
                    title: rec.title(),
                    body: rec.body(),
                    scheduled_for: now,
                    read: false,
                })
        })
        .collect()
}

/// Backend tables the scheduler reads from and writes to.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    async fn summaries(&self) -> Result<Vec<ActivitySummary>, UpstreamError>;
    async fn insert_notifications(&self, rows: &[NotificationRow]) -> Result<(), UpstreamError>;
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerReport {
    pub users_processed: usize,
    pub notifications_created: usize,
}

/// Cron entry point: verifies the shared secret, then schedules for every user.
pub async fn run_scheduler(
    secret: Option<&str>,
    expected_secret: &str,
    source: &dyn ActivitySource,
    now: DateTime<Utc>,
) -> Result<SchedulerReport, GatewayError> {
    authorize_cron(secret, expected_secret)?;

    let summaries = source.summaries().await.map_err(|err| {
        crate::log_error!("Failed to load activity: {err}");
        GatewayError::Internal(err.to_string())
    })?;
    let rows = schedule_all(&summaries, now);

    if !rows.is_empty() {
        source.insert_notifications(&rows).await.map_err(|err| {
            crate::log_error!("Failed to insert {} notifications: {err}", rows.len());
            GatewayError::Internal(err.to_string())
        })?;
    }

    crate::log_info!(
        "Scheduled {} notifications for {} users",
        rows.len(),
        summaries.len()
    );
    Ok(SchedulerReport {
        users_processed: summaries.len(),
        notifications_created: rows.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 18, 0, 0).unwrap()
    }

    fn active_user() -> ActivitySummary {
        ActivitySummary {
            user_id: "u1".into(),
            last_mood_log: Some(now() - Duration::hours(2)),
            last_focus_session: Some(now() - Duration::days(1)),
            habits: vec![HabitStatus {
                name: "reading".into(),
                streak: 4,
                last_completed: Some(now().date_naive()),
            }],
        }
    }

    #[test]
    fn cron_secret_must_match() {
        assert!(authorize_cron(Some("s3cret"), "s3cret").is_ok());
        assert_eq!(authorize_cron(Some("s3creT"), "s3cret"), Err(GatewayError::Unauthorized));
        assert_eq!(authorize_cron(Some("s3cret!"), "s3cret"), Err(GatewayError::Unauthorized));
        assert_eq!(authorize_cron(None, "s3cret"), Err(GatewayError::Unauthorized));
        assert_eq!(authorize_cron(Some(""), ""), Err(GatewayError::Unauthorized));
    }

    #[test]
    fn engaged_user_gets_nothing() {
        assert!(recommend(&active_user(), now()).is_empty());
    }

    #[test]
    fn stale_activity_triggers_each_heuristic() {
        let mut user = active_user();
        user.last_mood_log = Some(now() - Duration::hours(25));
        user.last_focus_session = None;
        user.habits[0].last_completed = now().date_naive().pred_opt();

        assert_eq!(
            recommend(&user, now()),
            vec![
                Recommendation::MoodCheckIn,
                Recommendation::HabitReminder {
                    habit: "reading".into(),
                    streak: 4
                },
                Recommendation::FocusNudge,
            ]
        );
    }

    #[test]
    fn broken_streaks_are_not_at_risk() {
        let today = now().date_naive();
        let habit = HabitStatus {
            name: "walk".into(),
            streak: 3,
            last_completed: today.checked_sub_signed(Duration::days(2)),
        };
        assert!(!habit.at_risk(today));
    }

    struct FakeTables {
        users: Vec<ActivitySummary>,
        inserted: Mutex<Vec<NotificationRow>>,
    }

    #[async_trait]
    impl ActivitySource for FakeTables {
        async fn summaries(&self) -> Result<Vec<ActivitySummary>, UpstreamError> {
            Ok(self.users.clone())
        }

        async fn insert_notifications(&self, rows: &[NotificationRow]) -> Result<(), UpstreamError> {
            self.inserted.lock().unwrap().extend_from_slice(rows);
            Ok(())
        }
    }

    #[tokio::test]
    async fn scheduler_inserts_rows_for_every_user() {
        let mut idle = active_user();
        idle.user_id = "u2".into();
        idle.last_mood_log = None;
        let tables = FakeTables {
            users: vec![active_user(), idle],
            inserted: Mutex::new(Vec::new()),
        };

        let report = run_scheduler(Some("k"), "k", &tables, now()).await.unwrap();
        assert_eq!(
            report,
            SchedulerReport {
                users_processed: 2,
                notifications_created: 1
            }
        );
        let inserted = tables.inserted.lock().unwrap();
        assert_eq!(inserted[0].user_id, "u2");
        assert_eq!(inserted[0].kind, "mood_check_in");
        assert!(!inserted[0].read);
    }

    #[tokio::test]
    async fn scheduler_rejects_bad_secret() {
        let tables = FakeTables {
            users: vec![],
            inserted: Mutex::new(Vec::new()),
        };
        let err = run_scheduler(Some("nope"), "k", &tables, now()).await.unwrap_err();
        assert_eq!(err.status(), 401);
    }
}
