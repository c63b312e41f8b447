pub mod authn;
pub mod gateway;
pub mod store;

pub use authn::{AuthnError, Authenticator};
pub use gateway::{Delivery, PushGateway};
pub use store::{
    Datastore, LeaderboardStore, NotificationStore, ReminderStore, StoreError, SubscriptionStore,
};
