use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalFrequency {
    Daily,
    Weekly,
    Monthly,
}

impl GoalFrequency {
    /// How far back to look for a completion before a goal counts as overdue.
    pub fn lookback(self) -> time::Duration {
        match self {
            GoalFrequency::Daily => time::Duration::hours(24),
            GoalFrequency::Weekly => time::Duration::days(7),
            GoalFrequency::Monthly => time::Duration::days(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalSnapshot {
    pub id: String,
    pub frequency: GoalFrequency,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_completed_at: Option<OffsetDateTime>,
}

/// One user's reminder-relevant state, as returned by the datastore for the
/// daily job: settings plus a snapshot of every active goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderCandidate {
    pub user_id: String,
    pub push_enabled: bool,
    /// `HH:MM:SS` in UTC, from the user's settings.
    pub reminder_time: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_reminder_sent_at: Option<OffsetDateTime>,
    pub has_push_subscription: bool,
    pub goals: Vec<GoalSnapshot>,
}

/// One user's leaderboard-relevant state for the weekly job. Leaderboards are
/// scoped to the user's friend set, never global.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardCandidate {
    pub user_id: String,
    pub friend_ids: Vec<String>,
    pub has_push_subscription: bool,
}
