use crate::types::push::{PushMessage, PushSubscription};

/// Outcome of one delivery attempt. `Gone` means the push service reported
/// the subscription as permanently invalid and the row should be pruned;
/// `Skipped` is the expected no-op when the subscription's platform is not
/// configured or the row is missing its token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Gone,
    Skipped(&'static str),
    Failed(String),
}

pub trait PushGateway: Clone + Send + Sync + 'static {
    fn deliver(
        &self,
        subscription: &PushSubscription,
        message: &PushMessage,
    ) -> impl Future<Output = Delivery> + Send;
}
