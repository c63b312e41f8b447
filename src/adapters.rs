use std::collections::HashMap;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::config;
use crate::ports::{
    Authenticator, AuthnError, Delivery, LeaderboardStore, NotificationStore, PushGateway,
    ReminderStore, StoreError, SubscriptionStore,
};
use crate::push;
use crate::push::CredentialStatus;
use crate::types::habits::{LeaderboardCandidate, ReminderCandidate};
use crate::types::notifications::NewNotification;
use crate::types::push::{NewPushSubscription, Platform, PushMessage, PushSubscription};

/// Bounded per-request timeout so one unreachable gateway cannot stall a
/// whole fan-out.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers to both push platforms over plain HTTP, holding whichever
/// credential sets were configured. An unconfigured platform turns its
/// subscriptions into skips rather than errors.
#[derive(Clone)]
pub struct HttpPushGateway {
    client: reqwest::Client,
    web: Option<push::WebPushCredentials>,
    apns: Option<push::ApnsCredentials>,
}

impl HttpPushGateway {
    /// Returns `Ok(None)` when neither platform has usable credentials, in
    /// which case dispatching is impossible by construction.
    pub fn from_config(config: &config::AppConfig) -> Result<Option<Self>, reqwest::Error> {
        let web = match push::load_web_push_credentials(config) {
            CredentialStatus::Ready(web) => Some(web),
            CredentialStatus::Incomplete => {
                eprintln!("web push disabled: incomplete VAPID configuration");
                None
            }
            CredentialStatus::Missing => None,
        };
        let apns = match push::load_apns_credentials(config) {
            CredentialStatus::Ready(apns) => Some(apns),
            CredentialStatus::Incomplete => {
                eprintln!("APNs push disabled: incomplete APNs configuration");
                None
            }
            CredentialStatus::Missing => None,
        };
        if web.is_none() && apns.is_none() {
            return Ok(None);
        }
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Some(Self { client, web, apns }))
    }

    async fn deliver_web(&self, subscription: &PushSubscription, message: &PushMessage) -> Delivery {
        let Some(web) = &self.web else {
            return Delivery::Skipped("web push not configured");
        };
        let audience = match reqwest::Url::parse(&subscription.endpoint) {
            Ok(url) => url.origin().ascii_serialization(),
            Err(err) => return Delivery::Failed(format!("invalid push endpoint: {err}")),
        };
        let token = push::generate_vapid_jwt(
            &web.private_key,
            &audience,
            &web.subject,
            OffsetDateTime::now_utc(),
        );
        let payload = json!({
            "title": message.title,
            "body": message.body,
            "url": message.url,
            "notificationId": message.notification_id,
            "timestamp": message.timestamp,
        });
        let mut request = self
            .client
            .post(&subscription.endpoint)
            .header("TTL", "86400")
            .json(&payload);
        // An empty token means the key material was unusable; send without an
        // Authorization header rather than aborting.
        if !token.is_empty() {
            request = request.header(
                AUTHORIZATION,
                format!("vapid t={token}, k={}", web.public_key),
            );
        }
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => return Delivery::Failed(format!("web push send failed: {err}")),
        };
        let status = response.status();
        if status.is_success() {
            return Delivery::Delivered;
        }
        if status.as_u16() == 404 || status.as_u16() == 410 {
            return Delivery::Gone;
        }
        let body = response.text().await.unwrap_or_default();
        Delivery::Failed(format!("web push returned {}: {body}", status.as_u16()))
    }

    async fn deliver_apns(
        &self,
        subscription: &PushSubscription,
        message: &PushMessage,
    ) -> Delivery {
        let Some(apns) = &self.apns else {
            return Delivery::Skipped("APNs not configured");
        };
        let Some(device_token) = subscription.device_token.as_deref() else {
            return Delivery::Skipped("iOS subscription missing device token");
        };
        let token = match push::generate_apns_jwt(apns, OffsetDateTime::now_utc()) {
            Ok(token) => token,
            Err(err) => return Delivery::Failed(err.to_string()),
        };
        let payload = json!({
            "aps": {
                "alert": {"title": message.title, "body": message.body},
                "sound": "default",
                "badge": 1,
                "mutable-content": 1,
            },
            "url": message.url,
        });
        let response = match self
            .client
            .post(format!("{}/3/device/{device_token}", apns.endpoint))
            .header(AUTHORIZATION, format!("bearer {token}"))
            .header("apns-topic", &apns.topic)
            .header("apns-push-type", "alert")
            .header("apns-priority", "10")
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return Delivery::Failed(format!("APNs send failed: {err}")),
        };
        let status = response.status();
        if status.is_success() {
            return Delivery::Delivered;
        }
        if status.as_u16() == 410 {
            return Delivery::Gone;
        }
        let body = response.text().await.unwrap_or_default();
        Delivery::Failed(format!("APNs returned {}: {body}", status.as_u16()))
    }
}

impl PushGateway for HttpPushGateway {
    async fn deliver(&self, subscription: &PushSubscription, message: &PushMessage) -> Delivery {
        match subscription.platform {
            Platform::Web => self.deliver_web(subscription, message).await,
            Platform::Ios => self.deliver_apns(subscription, message).await,
        }
    }
}

/// REST client for the managed datastore: filtered reads and row mutations on
/// the tables the push core touches, plus RPC calls for the aggregate job
/// queries.
#[derive(Clone)]
pub struct RestDatastore {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl RestDatastore {
    pub fn new(config: &config::AppConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: config.datastore_url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.base_url))
            .header("apikey", &self.service_key)
            .header(AUTHORIZATION, format!("Bearer {}", self.service_key))
    }

    async fn rpc<T: serde::de::DeserializeOwned>(
        &self,
        function: &str,
        args: serde_json::Value,
    ) -> Result<T, StoreError> {
        let response = send_checked(
            self.request(Method::POST, &format!("/rest/v1/rpc/{function}"))
                .json(&args),
        )
        .await?;
        decode(response).await
    }
}

async fn send_checked(builder: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
    let response = builder
        .send()
        .await
        .map_err(|err| StoreError::Request(err.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(StoreError::Status(status.as_u16(), body));
    }
    Ok(response)
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, StoreError> {
    response
        .json::<T>()
        .await
        .map_err(|err| StoreError::Decode(err.to_string()))
}

impl SubscriptionStore for RestDatastore {
    async fn subscriptions_for(&self, user_id: &str) -> Result<Vec<PushSubscription>, StoreError> {
        let response = send_checked(
            self.request(Method::GET, "/rest/v1/push_subscriptions").query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{user_id}")),
            ]),
        )
        .await?;
        decode(response).await
    }

    async fn remove_subscription(&self, id: &str) -> Result<(), StoreError> {
        send_checked(
            self.request(Method::DELETE, "/rest/v1/push_subscriptions")
                .query(&[("id", format!("eq.{id}"))]),
        )
        .await?;
        Ok(())
    }

    async fn upsert_subscription(&self, subscription: &NewPushSubscription) -> Result<(), StoreError> {
        send_checked(
            self.request(Method::POST, "/rest/v1/push_subscriptions")
                .header("Prefer", "resolution=merge-duplicates")
                .json(subscription),
        )
        .await?;
        Ok(())
    }
}

impl NotificationStore for RestDatastore {
    async fn create_notification(&self, notification: &NewNotification) -> Result<String, StoreError> {
        #[derive(Deserialize)]
        struct CreatedRow {
            id: String,
        }

        let response = send_checked(
            self.request(Method::POST, "/rest/v1/notifications")
                .header("Prefer", "return=representation")
                .json(notification),
        )
        .await?;
        let rows: Vec<CreatedRow> = decode(response).await?;
        rows.into_iter()
            .next()
            .map(|row| row.id)
            .ok_or_else(|| StoreError::Decode("insert returned no rows".to_string()))
    }
}

impl ReminderStore for RestDatastore {
    async fn reminder_candidates(&self) -> Result<Vec<ReminderCandidate>, StoreError> {
        self.rpc("reminder_candidates", json!({})).await
    }

    async fn mark_reminder_sent(&self, user_id: &str, at: OffsetDateTime) -> Result<(), StoreError> {
        let at = at
            .format(&Rfc3339)
            .map_err(|err| StoreError::Request(err.to_string()))?;
        send_checked(
            self.request(Method::PATCH, "/rest/v1/user_settings")
                .query(&[("user_id", format!("eq.{user_id}"))])
                .json(&json!({"last_reminder_sent_at": at})),
        )
        .await?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct CountRow {
    user_id: String,
    count: u32,
}

impl LeaderboardStore for RestDatastore {
    async fn leaderboard_candidates(&self) -> Result<Vec<LeaderboardCandidate>, StoreError> {
        self.rpc("leaderboard_candidates", json!({})).await
    }

    async fn completion_counts(
        &self,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<HashMap<String, u32>, StoreError> {
        let from = from
            .format(&Rfc3339)
            .map_err(|err| StoreError::Request(err.to_string()))?;
        let to = to
            .format(&Rfc3339)
            .map_err(|err| StoreError::Request(err.to_string()))?;
        let rows: Vec<CountRow> = self
            .rpc("completion_counts", json!({"from_ts": from, "to_ts": to}))
            .await?;
        Ok(rows.into_iter().map(|row| (row.user_id, row.count)).collect())
    }

    async fn active_goal_counts(&self) -> Result<HashMap<String, u32>, StoreError> {
        let rows: Vec<CountRow> = self.rpc("active_goal_counts", json!({})).await?;
        Ok(rows.into_iter().map(|row| (row.user_id, row.count)).collect())
    }
}

/// Resolves a client's bearer token against the managed auth endpoint.
#[derive(Clone)]
pub struct RestAuthenticator {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl RestAuthenticator {
    pub fn new(config: &config::AppConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: config.datastore_url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
        })
    }
}

impl Authenticator for RestAuthenticator {
    async fn resolve(&self, bearer: &str) -> Result<Option<String>, AuthnError> {
        #[derive(Deserialize)]
        struct AuthUser {
            id: String,
        }

        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.service_key)
            .header(AUTHORIZATION, format!("Bearer {bearer}"))
            .send()
            .await
            .map_err(|err| AuthnError::Request(err.to_string()))?;
        match response.status().as_u16() {
            200 => response
                .json::<AuthUser>()
                .await
                .map(|user| Some(user.id))
                .map_err(|err| AuthnError::Request(err.to_string())),
            401 | 403 => Ok(None),
            status => Err(AuthnError::Status(status)),
        }
    }
}
