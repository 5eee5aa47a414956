//! Login start/poll endpoints.
//!
//! The web layer never blocks on a credential check: POST starts the
//! task, GET polls it with a short timeout. A poll that times out
//! reports `pending` and the browser simply polls again on its next
//! request.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use domain::UserId;
use event_store::EventStore;
use ledger::LedgerStore;
use saga::{CartSignal, LoginPoll};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::sessions::{AppState, attach, parse_session_id};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PollParams {
    /// How long to wait for the task, in milliseconds (default 500).
    pub timeout_ms: Option<u64>,
}

#[derive(Serialize)]
pub struct LoginStartedResponse {
    /// False when a check was already in flight for this session.
    pub started: bool,
}

#[derive(Serialize)]
pub struct LoginPollResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// POST /sessions/{session_id}/login — start a credential check.
#[tracing::instrument(skip(state, req))]
pub async fn start<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Path(session_id): Path<String>,
    Json(req): Json<LoginRequest>,
) -> Result<(StatusCode, Json<LoginStartedResponse>), ApiError>
where
    S: EventStore + Clone + 'static,
    L: LedgerStore + 'static,
{
    let session_id = parse_session_id(&session_id)?;
    if req.username.is_empty() {
        return Err(ApiError::BadRequest("username is required".to_string()));
    }

    let started = state
        .login
        .start(session_id, req.username, req.password)
        .await;

    Ok((StatusCode::ACCEPTED, Json(LoginStartedResponse { started })))
}

/// GET /sessions/{session_id}/login — poll the pending check.
///
/// On a successful outcome, the user is attached to the session's cart
/// before the response goes out.
#[tracing::instrument(skip(state))]
pub async fn poll<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Path(session_id): Path<String>,
    Query(params): Query<PollParams>,
) -> Result<Json<LoginPollResponse>, ApiError>
where
    S: EventStore + Clone + 'static,
    L: LedgerStore + 'static,
{
    let session_id = parse_session_id(&session_id)?;
    let timeout = Duration::from_millis(params.timeout_ms.unwrap_or(500));

    match state.login.poll(&session_id, timeout).await {
        LoginPoll::Pending => Ok(Json(LoginPollResponse {
            status: "pending",
            success: None,
            user_id: None,
            username: None,
            realname: None,
            email: None,
        })),
        LoginPoll::Ready(outcome) => {
            if outcome.success
                && let Some(user_id) = &outcome.user_id
            {
                let handle = attach(&state, &session_id).await?;
                handle
                    .signal(CartSignal::AssignUser(UserId::new(user_id.as_str())))
                    .await?;
            }

            Ok(Json(LoginPollResponse {
                status: "ready",
                success: Some(outcome.success),
                user_id: outcome.user_id.map(|id| id.to_string()),
                username: outcome.username,
                realname: outcome.realname,
                email: outcome.email,
            }))
        }
    }
}
