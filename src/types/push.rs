use serde::{Deserialize, Serialize};

/// Which push gateway a subscription belongs to. The platform decides which
/// credential set and wire format apply; a subscription must never be sent
/// through the other platform's primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Web,
    Ios,
}

/// One registered device or browser instance. Web rows carry the endpoint
/// plus the client keypair; iOS rows carry the device token and a synthetic
/// unique endpoint of the form `apns:<token>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSubscription {
    pub id: String,
    pub user_id: String,
    pub platform: Platform,
    pub endpoint: String,
    pub device_token: Option<String>,
    pub p256dh: Option<String>,
    pub auth: Option<String>,
}

/// Insert shape for a subscription upsert, keyed on `(user_id, endpoint)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPushSubscription {
    pub user_id: String,
    pub platform: Platform,
    pub endpoint: String,
    pub device_token: Option<String>,
    pub p256dh: Option<String>,
    pub auth: Option<String>,
}

/// The unit of work handed to the dispatcher. Not persisted.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub user_id: String,
    pub title: String,
    pub body: String,
    pub url: String,
    pub notification_id: Option<String>,
}

/// The payload delivered per subscription: the request fields plus a
/// millisecond timestamp stamped when the fan-out starts.
#[derive(Debug, Clone)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub url: String,
    pub notification_id: Option<String>,
    pub timestamp: i64,
}
