use serde::Serialize;
use time::{Duration, OffsetDateTime, UtcOffset};

use crate::dispatch::Dispatcher;
use crate::ports::{NotificationStore, PushGateway, ReminderStore, StoreError, SubscriptionStore};
use crate::types::notifications::{NewNotification, NotificationKind};
use crate::types::push::DispatchRequest;

/// Minutes either side of the configured reminder time that still count as
/// "now". Sized for an hourly cron cadence.
const REMINDER_WINDOW_MINUTES: u16 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderSummary {
    pub checked: usize,
    pub sent: usize,
    pub skipped: usize,
}

/// One pass of the daily reminder job: for every user whose reminder time
/// falls inside the current window and who has an overdue goal, create the
/// in-app record and fan it out.
///
/// Users are independent; a failure for one is logged and never aborts the
/// rest of the pass.
pub async fn run_daily_reminder<S, G>(
    store: &S,
    gateway: &G,
    now: OffsetDateTime,
) -> Result<ReminderSummary, StoreError>
where
    S: SubscriptionStore + NotificationStore + ReminderStore,
    G: PushGateway,
{
    let candidates = store.reminder_candidates().await?;
    let dispatcher = Dispatcher::new(store.clone(), gateway.clone());
    let now = now.to_offset(UtcOffset::UTC);
    let now_minutes = now.hour() as u16 * 60 + now.minute() as u16;

    let checked = candidates.len();
    let mut sent = 0;
    let mut skipped = 0;

    for candidate in candidates {
        if !candidate.push_enabled {
            skipped += 1;
            continue;
        }
        let Some(target_minutes) = parse_reminder_time(&candidate.reminder_time) else {
            eprintln!(
                "reminder warning: unparseable reminder time {:?} (user {})",
                candidate.reminder_time, candidate.user_id
            );
            skipped += 1;
            continue;
        };
        if !within_reminder_window(now_minutes, target_minutes) {
            skipped += 1;
            continue;
        }
        // One reminder per user per UTC day. The date check alone misses a
        // rerun straddling midnight (sent 23:55, window still open 00:05), so
        // anything sent within the window span also counts as a duplicate.
        let window_span = Duration::minutes(2 * REMINDER_WINDOW_MINUTES as i64);
        let already_sent = candidate.last_reminder_sent_at.is_some_and(|at| {
            let at = at.to_offset(UtcOffset::UTC);
            at.date() == now.date() || now - at < window_span
        });
        if already_sent {
            skipped += 1;
            continue;
        }
        let overdue = candidate.goals.iter().any(|goal| {
            goal.last_completed_at
                .is_none_or(|at| at <= now - goal.frequency.lookback())
        });
        if candidate.goals.is_empty() || !overdue {
            skipped += 1;
            continue;
        }
        if !candidate.has_push_subscription {
            skipped += 1;
            continue;
        }

        let notification = NewNotification {
            user_id: candidate.user_id.clone(),
            kind: NotificationKind::GoalReminder,
            title: "Goal reminder".to_string(),
            body: "You have goals that still need a check-in today.".to_string(),
            reference_id: None,
            actor_id: None,
        };
        let notification_id = match store.create_notification(&notification).await {
            Ok(id) => id,
            Err(err) => {
                eprintln!(
                    "reminder warning: failed to record notification for user {}: {err}",
                    candidate.user_id
                );
                skipped += 1;
                continue;
            }
        };

        let request = DispatchRequest {
            user_id: candidate.user_id.clone(),
            title: notification.title.clone(),
            body: notification.body.clone(),
            url: "/goals".to_string(),
            notification_id: Some(notification_id),
        };
        if let Err(err) = dispatcher.dispatch(&request).await {
            eprintln!(
                "reminder warning: dispatch failed for user {}: {err}",
                candidate.user_id
            );
        }
        if let Err(err) = store.mark_reminder_sent(&candidate.user_id, now).await {
            eprintln!(
                "reminder warning: failed to mark reminder sent for user {}: {err}",
                candidate.user_id
            );
        }
        sent += 1;
    }

    Ok(ReminderSummary {
        checked,
        sent,
        skipped,
    })
}

/// Parses `HH:MM` or `HH:MM:SS` into minutes past midnight. Seconds are
/// ignored; reminder resolution is one minute.
fn parse_reminder_time(value: &str) -> Option<u16> {
    let mut parts = value.split(':');
    let hours: u16 = parts.next()?.parse().ok()?;
    let minutes: u16 = parts.next()?.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Circular distance on the 1440-minute clock face, so a reminder just past
/// midnight matches a check just before it.
fn within_reminder_window(now_minutes: u16, target_minutes: u16) -> bool {
    let diff = now_minutes.abs_diff(target_minutes);
    diff.min(1440 - diff) <= REMINDER_WINDOW_MINUTES
}
