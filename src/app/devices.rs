use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use serde::Deserialize;
use serde::Serialize;

use crate::app::{ErrorResponse, bearer_token};
use crate::ports::{Authenticator, Datastore, PushGateway};
use crate::push;
use crate::push::CredentialStatus;
use crate::state::AppState;
use crate::types::push::{NewPushSubscription, Platform};

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterDeviceBody {
    pub(crate) token: String,
}

#[derive(Serialize)]
pub(crate) struct RegisterDeviceResponse {
    pub(crate) success: bool,
}

/// Called by the mobile client once it holds an APNs device token. The caller
/// is identified by its own bearer token, never by a user id in the body.
pub(crate) async fn register_device<S, G, A>(
    State(state): State<AppState<S, G, A>>,
    headers: HeaderMap,
    Json(body): Json<RegisterDeviceBody>,
) -> Result<Json<RegisterDeviceResponse>, (StatusCode, Json<ErrorResponse>)>
where
    S: Datastore,
    G: PushGateway,
    A: Authenticator,
{
    let Some(bearer) = bearer_token(&headers) else {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "missing bearer token".to_string(),
            }),
        ));
    };
    let user_id = match state.authenticator.resolve(bearer).await {
        Ok(Some(user_id)) => user_id,
        Ok(None) => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "invalid bearer token".to_string(),
                }),
            ));
        }
        Err(err) => {
            eprintln!("register device error: {err}");
            return Err((
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: "auth service unavailable".to_string(),
                }),
            ));
        }
    };

    let token = body.token.trim();
    if token.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "token must not be empty".to_string(),
            }),
        ));
    }

    let subscription = NewPushSubscription {
        user_id,
        platform: Platform::Ios,
        endpoint: format!("apns:{token}"),
        device_token: Some(token.to_string()),
        p256dh: None,
        auth: None,
    };
    state
        .store
        .upsert_subscription(&subscription)
        .await
        .map_err(|err| {
            eprintln!("register device error: {err}");
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: err.to_string(),
                }),
            )
        })?;

    Ok(Json(RegisterDeviceResponse { success: true }))
}

#[derive(Serialize)]
pub(crate) struct PublicKeyResponse {
    #[serde(rename = "publicKey")]
    pub(crate) public_key: String,
}

/// Hands the browser the VAPID public key it needs to subscribe.
pub(crate) async fn push_public_key<S, G, A>(
    State(state): State<AppState<S, G, A>>,
) -> Result<Json<PublicKeyResponse>, (StatusCode, Json<ErrorResponse>)>
where
    S: Datastore,
    G: PushGateway,
    A: Authenticator,
{
    let web = match push::load_web_push_credentials(&state.config) {
        CredentialStatus::Ready(web) => web,
        CredentialStatus::Incomplete | CredentialStatus::Missing => {
            return Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: "Push notifications are not configured.".to_string(),
                }),
            ));
        }
    };

    Ok(Json(PublicKeyResponse {
        public_key: web.public_key,
    }))
}
