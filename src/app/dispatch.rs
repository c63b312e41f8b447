use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use serde::Deserialize;
use serde::Serialize;

use crate::app::{ErrorResponse, bearer_token};
use crate::dispatch::Dispatcher;
use crate::ports::{Authenticator, Datastore, PushGateway};
use crate::state::AppState;
use crate::types::push::DispatchRequest;

#[derive(Debug, Deserialize)]
pub(crate) struct DispatchBody {
    #[serde(rename = "userId")]
    pub(crate) user_id: String,
    pub(crate) title: String,
    pub(crate) body: String,
    #[serde(default)]
    pub(crate) url: Option<String>,
    #[serde(default, rename = "notificationId")]
    pub(crate) notification_id: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct DispatchResponse {
    pub(crate) success: bool,
    pub(crate) sent: usize,
    pub(crate) total: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) errors: Vec<String>,
}

/// Fan-out entry point for collaborators (application hooks, the scheduled
/// jobs' counterparts elsewhere in the backend). Partial delivery failure is
/// still a 200; only a missing platform, a rejected caller, or a malformed
/// body is a hard error.
pub(crate) async fn dispatch<S, G, A>(
    State(state): State<AppState<S, G, A>>,
    headers: HeaderMap,
    Json(body): Json<DispatchBody>,
) -> Result<Json<DispatchResponse>, (StatusCode, Json<ErrorResponse>)>
where
    S: Datastore,
    G: PushGateway,
    A: Authenticator,
{
    if bearer_token(&headers) != Some(state.config.service_key.as_str()) {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "unauthorized".to_string(),
            }),
        ));
    }
    for (field, value) in [
        ("userId", &body.user_id),
        ("title", &body.title),
        ("body", &body.body),
    ] {
        if value.trim().is_empty() {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("{field} must not be empty"),
                }),
            ));
        }
    }
    let Some(gateway) = state.gateway else {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "no push platform is configured".to_string(),
            }),
        ));
    };

    let request = DispatchRequest {
        user_id: body.user_id,
        title: body.title,
        body: body.body,
        url: body.url.unwrap_or_else(|| "/".to_string()),
        notification_id: body.notification_id,
    };
    let dispatcher = Dispatcher::new(state.store, gateway);
    let summary = dispatcher.dispatch(&request).await.map_err(|err| {
        eprintln!("dispatch error: {err}");
        (
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse {
                error: err.to_string(),
            }),
        )
    })?;

    Ok(Json(DispatchResponse {
        success: true,
        sent: summary.sent,
        total: summary.total,
        errors: summary.errors,
    }))
}
