//! Authentication handlers

use axum::{
    extract::{Extension, Json, Query},
    http::{header::SET_COOKIE, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use chrono::Duration;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::extractors::{AuthedAccount, SESSION_COOKIE};
use super::flow::LoginRejection;
use super::models::{Account, CallbackParams, LoginParams};
use crate::common::helpers::parse_flag;
use crate::common::{ApiError, AppState};

/// Marker appended to the frontend URL when the identity is not allow-listed
pub const UNAUTHORIZED_MARKER: &str = "unauthorized";

/// GET /auth/github/login
/// Starts the OAuth flow and redirects to the provider's authorize page
///
/// `remember` (`1`, `true`, ...) selects a 30 day session instead of 2 hours.
pub async fn github_login(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<LoginParams>,
) -> Response {
    let remember = parse_flag(params.remember.as_deref());
    let url = state.flow.start(remember).await;

    found(&url)
}

/// GET /auth/github/callback
/// Completes the OAuth flow, sets the session cookie and returns to the frontend
pub async fn github_callback(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ApiError> {
    let frontend = state.config.frontend_origin.as_str();

    if let Some(provider_error) = params.error.as_deref() {
        warn!(oauth_error = %provider_error, "Provider returned error to callback");
        if let Some(s) = params.state.as_deref() {
            state.flow.abandon(s).await;
        }
        return Ok(found(&frontend_with_error(frontend, provider_error)));
    }

    let (code, oauth_state) = match (params.code.as_deref(), params.state.as_deref()) {
        (Some(c), Some(s)) if !c.is_empty() && !s.is_empty() => (c, s),
        _ => {
            warn!("Callback missing code or state");
            return Err(ApiError::BadRequest("missing code or state".to_string()));
        }
    };

    match state.flow.complete(code, oauth_state).await {
        Ok(grant) => {
            let cookie = session_cookie(&grant.credential, grant.ttl, state.config.cookie_secure);
            info!(account_id = grant.account.id, "Session cookie issued");
            Ok((AppendHeaders([(SET_COOKIE, cookie)]), found(frontend)).into_response())
        }
        Err(LoginRejection::Unauthorized) => {
            Ok(found(&frontend_with_error(frontend, UNAUTHORIZED_MARKER)))
        }
        Err(LoginRejection::InvalidState) => Err(ApiError::BadRequest("invalid state".to_string())),
        Err(LoginRejection::ProviderFailure(_)) => Err(ApiError::BadGateway(
            "identity provider request failed".to_string(),
        )),
        Err(LoginRejection::Internal(e)) => {
            error!(error = %e, "Login failed with internal error");
            Err(ApiError::InternalServer("login failed".to_string()))
        }
    }
}

/// GET /auth/me
/// Returns the account behind the current session
pub async fn me_handler(AuthedAccount(account): AuthedAccount) -> Json<Account> {
    Json(account)
}

/// POST /auth/logout
/// Clears the session cookie
pub async fn logout_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let cookie = session_cookie("", Duration::zero(), state.config.cookie_secure);
    info!("Session cookie cleared");

    (AppendHeaders([(SET_COOKIE, cookie)]), StatusCode::NO_CONTENT)
}

// ---- Helper Functions ----

/// 302 Found; axum's `Redirect::to` answers 303
fn found(location: &str) -> Response {
    let mut response = Redirect::to(location).into_response();
    *response.status_mut() = StatusCode::FOUND;
    response
}

fn frontend_with_error(frontend: &str, marker: &str) -> String {
    format!("{}?error={}", frontend, urlencoding::encode(marker))
}

pub(crate) fn session_cookie(value: &str, max_age: Duration, secure: bool) -> String {
    let secure_flag = if secure { " Secure;" } else { "" };
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax;{} Max-Age={}",
        SESSION_COOKIE,
        value,
        secure_flag,
        max_age.num_seconds()
    )
}
