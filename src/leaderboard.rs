use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::dispatch::Dispatcher;
use crate::ports::{
    LeaderboardStore, NotificationStore, PushGateway, StoreError, SubscriptionStore,
};
use crate::types::notifications::{NewNotification, NotificationKind};
use crate::types::push::DispatchRequest;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardSummary {
    pub checked: usize,
    pub notified: usize,
    pub skipped: usize,
}

/// The two scores users are ranked on within their friend group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Metric {
    Consistency,
    Improvement,
}

impl Metric {
    fn label(self) -> &'static str {
        match self {
            Metric::Consistency => "consistency",
            Metric::Improvement => "improvement",
        }
    }
}

/// One pass of the weekly leaderboard job: recomputes every candidate's rank
/// among their friends for both metrics, for this week and last, and notifies
/// on any change.
///
/// Three rolling seven-day completion windows feed the computation: the
/// current week, the previous one (this week's improvement baseline and last
/// week's consistency), and the week before that (last week's improvement
/// baseline).
pub async fn run_weekly_leaderboard<S, G>(
    store: &S,
    gateway: &G,
    now: OffsetDateTime,
) -> Result<LeaderboardSummary, StoreError>
where
    S: SubscriptionStore + NotificationStore + LeaderboardStore,
    G: PushGateway,
{
    let week = Duration::days(7);
    let candidates = store.leaderboard_candidates().await?;
    let goal_counts = store.active_goal_counts().await?;
    let current = store.completion_counts(now - week, now).await?;
    let previous = store.completion_counts(now - week * 2, now - week).await?;
    let baseline = store
        .completion_counts(now - week * 3, now - week * 2)
        .await?;
    let dispatcher = Dispatcher::new(store.clone(), gateway.clone());

    let checked = candidates.len();
    let mut notified = 0;
    let mut skipped = 0;

    for candidate in &candidates {
        if candidate.friend_ids.is_empty() || !candidate.has_push_subscription {
            skipped += 1;
            continue;
        }
        let mut group: Vec<&str> = vec![candidate.user_id.as_str()];
        group.extend(candidate.friend_ids.iter().map(String::as_str));

        let mut changes = Vec::new();
        for metric in [Metric::Consistency, Metric::Improvement] {
            let score_now = |id: &str| score(metric, id, &current, &previous, &goal_counts);
            let score_then = |id: &str| score(metric, id, &previous, &baseline, &goal_counts);
            let rank_now = rank_within(&group, &candidate.user_id, score_now);
            let rank_then = rank_within(&group, &candidate.user_id, score_then);
            if rank_now != rank_then {
                changes.push((metric, rank_then, rank_now));
            }
        }
        if changes.is_empty() {
            skipped += 1;
            continue;
        }

        let mut any_sent = false;
        for (metric, rank_then, rank_now) in changes {
            let (title, body) = rank_change_message(metric, rank_then, rank_now);
            let notification = NewNotification {
                user_id: candidate.user_id.clone(),
                kind: NotificationKind::LeaderboardChange,
                title,
                body,
                reference_id: None,
                actor_id: None,
            };
            let notification_id = match store.create_notification(&notification).await {
                Ok(id) => id,
                Err(err) => {
                    eprintln!(
                        "leaderboard warning: failed to record notification for user {}: {err}",
                        candidate.user_id
                    );
                    continue;
                }
            };
            let request = DispatchRequest {
                user_id: candidate.user_id.clone(),
                title: notification.title.clone(),
                body: notification.body.clone(),
                url: "/leaderboard".to_string(),
                notification_id: Some(notification_id),
            };
            if let Err(err) = dispatcher.dispatch(&request).await {
                eprintln!(
                    "leaderboard warning: dispatch failed for user {}: {err}",
                    candidate.user_id
                );
            }
            any_sent = true;
        }
        if any_sent {
            notified += 1;
        } else {
            skipped += 1;
        }
    }

    Ok(LeaderboardSummary {
        checked,
        notified,
        skipped,
    })
}

fn score(
    metric: Metric,
    user_id: &str,
    completions: &HashMap<String, u32>,
    prior: &HashMap<String, u32>,
    goal_counts: &HashMap<String, u32>,
) -> f64 {
    let completed = count(completions, user_id);
    match metric {
        Metric::Consistency => consistency(completed, count(goal_counts, user_id)),
        Metric::Improvement => improvement(completed, count(prior, user_id)),
    }
}

fn count(counts: &HashMap<String, u32>, user_id: &str) -> u32 {
    counts.get(user_id).copied().unwrap_or(0)
}

/// Share of possible daily check-ins made this week, in `[0, 1]` for a user
/// who checks in at most once per goal per day.
fn consistency(completions: u32, active_goals: u32) -> f64 {
    if active_goals == 0 {
        return 0.0;
    }
    completions as f64 / (active_goals as f64 * 7.0)
}

/// Percentage change in completions against the prior week. A flat-zero user
/// has no improvement; any activity after an empty week counts as 100%.
fn improvement(current: u32, previous: u32) -> f64 {
    if previous == 0 {
        return if current > 0 { 100.0 } else { 0.0 };
    }
    (current as f64 - previous as f64) / previous as f64 * 100.0
}

/// 1-indexed rank of `user_id` within the group, scores descending. Ties
/// break on ascending user id so reruns over the same data rank identically.
fn rank_within(group: &[&str], user_id: &str, score: impl Fn(&str) -> f64) -> usize {
    let mut ranked: Vec<(&str, f64)> = group.iter().map(|id| (*id, score(id))).collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });
    ranked
        .iter()
        .position(|(id, _)| *id == user_id)
        .map_or(0, |index| index + 1)
}

fn rank_change_message(metric: Metric, rank_then: usize, rank_now: usize) -> (String, String) {
    if rank_now < rank_then {
        (
            "You're climbing the leaderboard!".to_string(),
            format!(
                "You moved up to #{rank_now} in {} among your friends. Keep it going!",
                metric.label()
            ),
        )
    } else {
        (
            "Leaderboard update".to_string(),
            format!(
                "You slipped to #{rank_now} in {} among your friends. A check-in today gets you climbing again.",
                metric.label()
            ),
        )
    }
}
