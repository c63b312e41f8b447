use time::OffsetDateTime;

use crate::ports::{Delivery, PushGateway, StoreError, SubscriptionStore};
use crate::types::push::{DispatchRequest, PushMessage};

/// Aggregated result of one fan-out. Partial failure never fails the call:
/// `errors` collects per-subscription failures while `sent` counts the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSummary {
    pub sent: usize,
    pub total: usize,
    pub errors: Vec<String>,
}

/// Fans one logical notification out to every registered device of the
/// target user, pruning subscriptions the push service reports as gone.
#[derive(Debug, Clone)]
pub struct Dispatcher<S, G> {
    store: S,
    gateway: G,
}

impl<S, G> Dispatcher<S, G>
where
    S: SubscriptionStore,
    G: PushGateway,
{
    pub fn new(store: S, gateway: G) -> Self {
        Self { store, gateway }
    }

    pub async fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchSummary, StoreError> {
        let subscriptions = self.store.subscriptions_for(&request.user_id).await?;
        let total = subscriptions.len();
        let message = PushMessage {
            title: request.title.clone(),
            body: request.body.clone(),
            url: request.url.clone(),
            notification_id: request.notification_id.clone(),
            timestamp: (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64,
        };

        let mut sent = 0;
        let mut errors = Vec::new();
        // Each subscription is attempted at most once; one failure must never
        // abort the remaining attempts.
        for subscription in &subscriptions {
            match self.gateway.deliver(subscription, &message).await {
                Delivery::Delivered => sent += 1,
                Delivery::Gone => {
                    eprintln!(
                        "push delivery warning: pruning expired subscription {} (user {})",
                        subscription.id, request.user_id
                    );
                    if let Err(err) = self.store.remove_subscription(&subscription.id).await {
                        eprintln!(
                            "push delivery warning: failed to prune subscription {}: {err}",
                            subscription.id
                        );
                    }
                }
                Delivery::Skipped(reason) => {
                    eprintln!(
                        "push delivery skip: {reason} (subscription {}, user {})",
                        subscription.id, request.user_id
                    );
                }
                Delivery::Failed(reason) => {
                    eprintln!(
                        "push delivery error: {reason} (subscription {}, user {})",
                        subscription.id, request.user_id
                    );
                    errors.push(reason);
                }
            }
        }

        Ok(DispatchSummary {
            sent,
            total,
            errors,
        })
    }
}
