use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use time::OffsetDateTime;

use crate::app::{ErrorResponse, bearer_token};
use crate::config;
use crate::leaderboard;
use crate::ports::{Authenticator, Datastore, PushGateway};
use crate::reminders;
use crate::state::AppState;

/// The scheduled jobs are invoked by cron over HTTP and authenticate with the
/// shared service key, the same way internal collaborators do.
fn authorize(
    config: &config::AppConfig,
    headers: &HeaderMap,
) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    if bearer_token(headers) == Some(config.service_key.as_str()) {
        return Ok(());
    }
    Err((
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: "unauthorized".to_string(),
        }),
    ))
}

fn gateway_or_error<G>(
    gateway: Option<G>,
) -> Result<G, (StatusCode, Json<ErrorResponse>)> {
    gateway.ok_or((
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "no push platform is configured".to_string(),
        }),
    ))
}

pub(crate) async fn daily_reminder<S, G, A>(
    State(state): State<AppState<S, G, A>>,
    headers: HeaderMap,
) -> Result<Json<reminders::ReminderSummary>, (StatusCode, Json<ErrorResponse>)>
where
    S: Datastore,
    G: PushGateway,
    A: Authenticator,
{
    authorize(&state.config, &headers)?;
    let gateway = gateway_or_error(state.gateway)?;
    let summary = reminders::run_daily_reminder(&state.store, &gateway, OffsetDateTime::now_utc())
        .await
        .map_err(|err| {
            eprintln!("daily reminder error: {err}");
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: err.to_string(),
                }),
            )
        })?;
    Ok(Json(summary))
}

pub(crate) async fn weekly_leaderboard<S, G, A>(
    State(state): State<AppState<S, G, A>>,
    headers: HeaderMap,
) -> Result<Json<leaderboard::LeaderboardSummary>, (StatusCode, Json<ErrorResponse>)>
where
    S: Datastore,
    G: PushGateway,
    A: Authenticator,
{
    authorize(&state.config, &headers)?;
    let gateway = gateway_or_error(state.gateway)?;
    let summary =
        leaderboard::run_weekly_leaderboard(&state.store, &gateway, OffsetDateTime::now_utc())
            .await
            .map_err(|err| {
                eprintln!("weekly leaderboard error: {err}");
                (
                    StatusCode::BAD_GATEWAY,
                    Json(ErrorResponse {
                        error: err.to_string(),
                    }),
                )
            })?;
    Ok(Json(summary))
}
