use std::collections::HashMap;

use time::OffsetDateTime;

use crate::types::habits::{LeaderboardCandidate, ReminderCandidate};
use crate::types::notifications::NewNotification;
use crate::types::push::{NewPushSubscription, PushSubscription};

#[derive(Debug)]
pub enum StoreError {
    Request(String),
    Status(u16, String),
    Decode(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Request(err) => write!(f, "datastore request failed: {err}"),
            StoreError::Status(status, body) => {
                write!(f, "datastore returned {status}: {body}")
            }
            StoreError::Decode(err) => write!(f, "datastore response malformed: {err}"),
        }
    }
}

pub trait SubscriptionStore: Clone + Send + Sync + 'static {
    fn subscriptions_for(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<PushSubscription>, StoreError>> + Send;

    fn remove_subscription(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn upsert_subscription(
        &self,
        subscription: &NewPushSubscription,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

pub trait NotificationStore: Clone + Send + Sync + 'static {
    /// Inserts the durable record and returns its id, so the push payload can
    /// deep-link back to it.
    fn create_notification(
        &self,
        notification: &NewNotification,
    ) -> impl Future<Output = Result<String, StoreError>> + Send;
}

pub trait ReminderStore: Clone + Send + Sync + 'static {
    fn reminder_candidates(
        &self,
    ) -> impl Future<Output = Result<Vec<ReminderCandidate>, StoreError>> + Send;

    fn mark_reminder_sent(
        &self,
        user_id: &str,
        at: OffsetDateTime,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

pub trait LeaderboardStore: Clone + Send + Sync + 'static {
    fn leaderboard_candidates(
        &self,
    ) -> impl Future<Output = Result<Vec<LeaderboardCandidate>, StoreError>> + Send;

    /// Completed check-ins per user within `[from, to)`.
    fn completion_counts(
        &self,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> impl Future<Output = Result<HashMap<String, u32>, StoreError>> + Send;

    fn active_goal_counts(
        &self,
    ) -> impl Future<Output = Result<HashMap<String, u32>, StoreError>> + Send;
}

pub trait Datastore:
    SubscriptionStore + NotificationStore + ReminderStore + LeaderboardStore
{
}

impl<T> Datastore for T where
    T: SubscriptionStore + NotificationStore + ReminderStore + LeaderboardStore
{
}
