use axum::Router;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::routing::get;
use axum::routing::post;
use serde::Serialize;

use crate::ports::{Authenticator, Datastore, PushGateway};
use crate::state::AppState;

mod devices;
mod dispatch;
mod jobs;

pub fn app<S, G, A>(state: AppState<S, G, A>) -> Router
where
    S: Datastore,
    G: PushGateway,
    A: Authenticator,
{
    Router::new()
        .route("/api/push/dispatch", post(dispatch::dispatch))
        .route("/api/push/register-device", post(devices::register_device))
        .route("/api/push/public-key", get(devices::push_public_key))
        .route("/jobs/daily-reminder", post(jobs::daily_reminder))
        .route("/jobs/weekly-leaderboard", post(jobs::weekly_leaderboard))
        .route("/health", get(health))
        .with_state(state)
}

pub(crate) async fn health() -> &'static str {
    "ok"
}

#[derive(Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

#[cfg(test)]
#[allow(non_snake_case)]
pub(crate) mod tests {
    use super::*;
    use crate::config;
    use crate::dispatch::tests::{TestGateway, TestSubscriptions, ios_subscription, web_subscription};
    use crate::ports::{
        AuthnError, LeaderboardStore, NotificationStore, ReminderStore, StoreError,
        SubscriptionStore,
    };
    use crate::types::habits::{LeaderboardCandidate, ReminderCandidate};
    use crate::types::notifications::NewNotification;
    use crate::types::push::{NewPushSubscription, Platform, PushSubscription};
    use axum::body::Body;
    use axum::body::to_bytes;
    use axum::http::Request;
    use axum::http::StatusCode;
    use serde_json::Value as JsonValue;
    use serde_json::from_slice as json_from_slice;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use time::OffsetDateTime;
    use tower::ServiceExt;

    /// Full datastore double for route tests. Jobs see no candidates unless a
    /// test scripts them.
    #[derive(Clone, Default)]
    pub(crate) struct TestDatastore {
        pub(crate) subscriptions: TestSubscriptions,
        pub(crate) notifications: Arc<Mutex<Vec<NewNotification>>>,
        pub(crate) reminder_candidates: Arc<Mutex<Vec<ReminderCandidate>>>,
        pub(crate) leaderboard_candidates: Arc<Mutex<Vec<LeaderboardCandidate>>>,
    }

    impl SubscriptionStore for TestDatastore {
        async fn subscriptions_for(
            &self,
            user_id: &str,
        ) -> Result<Vec<PushSubscription>, StoreError> {
            self.subscriptions.subscriptions_for(user_id).await
        }

        async fn remove_subscription(&self, id: &str) -> Result<(), StoreError> {
            self.subscriptions.remove_subscription(id).await
        }

        async fn upsert_subscription(
            &self,
            subscription: &NewPushSubscription,
        ) -> Result<(), StoreError> {
            self.subscriptions.upsert_subscription(subscription).await
        }
    }

    impl NotificationStore for TestDatastore {
        async fn create_notification(
            &self,
            notification: &NewNotification,
        ) -> Result<String, StoreError> {
            let mut notifications = self.notifications.lock().expect("notifications lock");
            notifications.push(notification.clone());
            Ok(format!("n-{}", notifications.len()))
        }
    }

    impl ReminderStore for TestDatastore {
        async fn reminder_candidates(&self) -> Result<Vec<ReminderCandidate>, StoreError> {
            Ok(self
                .reminder_candidates
                .lock()
                .expect("candidates lock")
                .clone())
        }

        async fn mark_reminder_sent(
            &self,
            _user_id: &str,
            _at: OffsetDateTime,
        ) -> Result<(), StoreError> {
            Ok(())
        }
    }

    impl LeaderboardStore for TestDatastore {
        async fn leaderboard_candidates(&self) -> Result<Vec<LeaderboardCandidate>, StoreError> {
            Ok(self
                .leaderboard_candidates
                .lock()
                .expect("candidates lock")
                .clone())
        }

        async fn completion_counts(
            &self,
            _from: OffsetDateTime,
            _to: OffsetDateTime,
        ) -> Result<HashMap<String, u32>, StoreError> {
            Ok(HashMap::new())
        }

        async fn active_goal_counts(&self) -> Result<HashMap<String, u32>, StoreError> {
            Ok(HashMap::new())
        }
    }

    /// Authenticator double backed by a token -> user id table.
    #[derive(Clone, Default)]
    pub(crate) struct TestAuthenticator {
        pub(crate) users: Arc<Mutex<HashMap<String, String>>>,
    }

    impl TestAuthenticator {
        fn with_user(token: &str, user_id: &str) -> Self {
            let authenticator = Self::default();
            authenticator
                .users
                .lock()
                .expect("users lock")
                .insert(token.to_string(), user_id.to_string());
            authenticator
        }
    }

    impl Authenticator for TestAuthenticator {
        async fn resolve(&self, bearer: &str) -> Result<Option<String>, AuthnError> {
            Ok(self.users.lock().expect("users lock").get(bearer).cloned())
        }
    }

    fn test_state(
        store: TestDatastore,
        gateway: Option<TestGateway>,
    ) -> AppState<TestDatastore, TestGateway, TestAuthenticator> {
        AppState {
            config: config::AppConfig::default(),
            store,
            gateway,
            authenticator: TestAuthenticator::default(),
        }
    }

    fn json_request(uri: &str, bearer: Option<&str>, body: JsonValue) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(bearer) = bearer {
            builder = builder.header("authorization", format!("Bearer {bearer}"));
        }
        builder.body(Body::from(body.to_string())).expect("request")
    }

    async fn json_body(response: axum::response::Response) -> JsonValue {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        json_from_slice(&body).expect("parse json")
    }

    #[tokio::test]
    async fn app__should_return_ok_on_health_endpoint() {
        // Given
        let app = app(test_state(TestDatastore::default(), Some(TestGateway::default())));

        // When
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("request failed");

        // Then
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        assert_eq!(body.as_ref(), b"ok");
    }

    #[tokio::test]
    async fn dispatch__should_reject_callers_without_the_service_key() {
        // Given
        let app = app(test_state(TestDatastore::default(), Some(TestGateway::default())));
        let body = json!({"userId": "u1", "title": "Test", "body": "Hello"});

        // When
        let response = app
            .oneshot(json_request("/api/push/dispatch", Some("wrong-key"), body))
            .await
            .expect("request failed");

        // Then
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn dispatch__should_reject_blank_fields() {
        // Given
        let app = app(test_state(TestDatastore::default(), Some(TestGateway::default())));
        let body = json!({"userId": "u1", "title": "  ", "body": "Hello"});

        // When
        let response = app
            .oneshot(json_request(
                "/api/push/dispatch",
                Some("test-service-key"),
                body,
            ))
            .await
            .expect("request failed");

        // Then
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let payload = json_body(response).await;
        assert!(payload["error"].as_str().expect("error string").contains("title"));
    }

    #[tokio::test]
    async fn dispatch__should_fail_when_no_platform_is_configured() {
        // Given
        let app = app(test_state(TestDatastore::default(), None));
        let body = json!({"userId": "u1", "title": "Test", "body": "Hello"});

        // When
        let response = app
            .oneshot(json_request(
                "/api/push/dispatch",
                Some("test-service-key"),
                body,
            ))
            .await
            .expect("request failed");

        // Then
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn dispatch__should_fan_out_to_every_subscription_of_the_user() {
        // Given: one web and one iOS subscription, both platforms delivering
        let store = TestDatastore::default();
        store
            .subscriptions
            .rows
            .lock()
            .expect("rows lock")
            .extend([
                web_subscription("s1", "u1", "https://push.example/123"),
                ios_subscription("s2", "u1", "tok"),
            ]);
        let gateway = TestGateway::default();
        let app = app(test_state(store, Some(gateway.clone())));
        let body = json!({"userId": "u1", "title": "Test", "body": "Hello", "url": "/goals"});

        // When
        let response = app
            .oneshot(json_request(
                "/api/push/dispatch",
                Some("test-service-key"),
                body,
            ))
            .await
            .expect("request failed");

        // Then
        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        assert_eq!(payload["success"], true);
        assert_eq!(payload["sent"], 2);
        assert_eq!(payload["total"], 2);
        assert!(payload.get("errors").is_none());
        assert_eq!(gateway.attempts(), 2);
    }

    #[tokio::test]
    async fn dispatch__should_report_partial_failures_without_failing() {
        // Given
        let store = TestDatastore::default();
        store
            .subscriptions
            .rows
            .lock()
            .expect("rows lock")
            .extend([
                web_subscription("s1", "u1", "https://push.example/ok"),
                web_subscription("s2", "u1", "https://push.example/slow"),
            ]);
        let gateway = TestGateway::default();
        gateway.script(
            "https://push.example/slow",
            crate::ports::Delivery::Failed("web push request timed out".to_string()),
        );
        let app = app(test_state(store, Some(gateway)));
        let body = json!({"userId": "u1", "title": "Test", "body": "Hello"});

        // When
        let response = app
            .oneshot(json_request(
                "/api/push/dispatch",
                Some("test-service-key"),
                body,
            ))
            .await
            .expect("request failed");

        // Then
        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        assert_eq!(payload["success"], true);
        assert_eq!(payload["sent"], 1);
        assert_eq!(payload["total"], 2);
        assert_eq!(payload["errors"][0], "web push request timed out");
    }

    #[tokio::test]
    async fn register_device__should_require_a_bearer_token() {
        // Given
        let app = app(test_state(TestDatastore::default(), Some(TestGateway::default())));

        // When
        let response = app
            .oneshot(json_request(
                "/api/push/register-device",
                None,
                json!({"token": "tok"}),
            ))
            .await
            .expect("request failed");

        // Then
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_device__should_reject_an_unknown_bearer_token() {
        // Given
        let mut state = test_state(TestDatastore::default(), Some(TestGateway::default()));
        state.authenticator = TestAuthenticator::with_user("good-token", "u1");
        let app = app(state);

        // When
        let response = app
            .oneshot(json_request(
                "/api/push/register-device",
                Some("bad-token"),
                json!({"token": "tok"}),
            ))
            .await
            .expect("request failed");

        // Then
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_device__should_upsert_an_ios_subscription() {
        // Given
        let store = TestDatastore::default();
        let mut state = test_state(store.clone(), Some(TestGateway::default()));
        state.authenticator = TestAuthenticator::with_user("good-token", "u1");
        let app = app(state);

        // When
        let response = app
            .oneshot(json_request(
                "/api/push/register-device",
                Some("good-token"),
                json!({"token": "device-tok"}),
            ))
            .await
            .expect("request failed");

        // Then
        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        assert_eq!(payload["success"], true);
        let rows = store.subscriptions.rows.lock().expect("rows lock");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, "u1");
        assert_eq!(rows[0].platform, Platform::Ios);
        assert_eq!(rows[0].endpoint, "apns:device-tok");
        assert_eq!(rows[0].device_token.as_deref(), Some("device-tok"));
    }

    #[tokio::test]
    async fn register_device__should_reject_a_blank_device_token() {
        // Given
        let mut state = test_state(TestDatastore::default(), Some(TestGateway::default()));
        state.authenticator = TestAuthenticator::with_user("good-token", "u1");
        let app = app(state);

        // When
        let response = app
            .oneshot(json_request(
                "/api/push/register-device",
                Some("good-token"),
                json!({"token": "  "}),
            ))
            .await
            .expect("request failed");

        // Then
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn push_public_key__should_return_unavailable_when_unconfigured() {
        // Given
        let app = app(test_state(TestDatastore::default(), Some(TestGateway::default())));

        // When
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/push/public-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("request failed");

        // Then
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn push_public_key__should_return_the_configured_key() {
        // Given
        let mut state = test_state(TestDatastore::default(), Some(TestGateway::default()));
        state.config.vapid_private_key = Some("priv".to_string());
        state.config.vapid_public_key = Some("BPub".to_string());
        state.config.vapid_subject = Some("mailto:ops@getproof.app".to_string());
        let app = app(state);

        // When
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/push/public-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("request failed");

        // Then
        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        assert_eq!(payload["publicKey"], "BPub");
    }

    #[tokio::test]
    async fn jobs__should_reject_callers_without_the_service_key() {
        // Given
        for uri in ["/jobs/daily-reminder", "/jobs/weekly-leaderboard"] {
            let app = app(test_state(TestDatastore::default(), Some(TestGateway::default())));

            // When
            let response = app
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri(uri)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .expect("request failed");

            // Then
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn daily_reminder__should_return_a_summary() {
        // Given: no candidates
        let app = app(test_state(TestDatastore::default(), Some(TestGateway::default())));

        // When
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/jobs/daily-reminder")
                    .header("authorization", "Bearer test-service-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("request failed");

        // Then
        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        assert_eq!(payload["checked"], 0);
        assert_eq!(payload["sent"], 0);
        assert_eq!(payload["skipped"], 0);
    }

    #[tokio::test]
    async fn weekly_leaderboard__should_return_a_summary() {
        // Given: no candidates
        let app = app(test_state(TestDatastore::default(), Some(TestGateway::default())));

        // When
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/jobs/weekly-leaderboard")
                    .header("authorization", "Bearer test-service-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("request failed");

        // Then
        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        assert_eq!(payload["checked"], 0);
        assert_eq!(payload["notified"], 0);
    }
}
