//! Authentication extractors for Axum

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::{header::COOKIE, request::Parts},
};
use std::sync::Arc;
use tracing::{debug, warn};

use super::models::Account;
use crate::common::helpers::cookie_value;
use crate::common::{ApiError, AppState};

pub const SESSION_COOKIE: &str = "session";

/// Account resolved from the `session` cookie
///
/// A missing cookie, a credential that fails verification, a subject that is
/// not an account id and an account that no longer exists all reject with the
/// same 401 so callers cannot tell them apart.
#[derive(Debug)]
pub struct AuthedAccount(pub Account);

#[async_trait]
impl<S> FromRequestParts<S> for AuthedAccount
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(app_state): Extension<Arc<AppState>> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;

        let token = parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|h| h.to_str().ok())
            .find_map(|h| cookie_value(h, SESSION_COOKIE))
            .filter(|t| !t.is_empty());

        let token = match token {
            Some(t) => t,
            None => {
                debug!("Authentication failed: no session cookie");
                return Err(ApiError::Unauthorized("not authenticated".into()));
            }
        };

        let claims = match app_state.tokens.verify(token) {
            Some(c) => c,
            None => {
                warn!("Authentication failed: session credential rejected");
                return Err(ApiError::Unauthorized("not authenticated".into()));
            }
        };

        let account_id = match claims.sub.parse::<i64>() {
            Ok(id) => id,
            Err(_) => {
                warn!(sub = %claims.sub, "Authentication failed: subject is not an account id");
                return Err(ApiError::Unauthorized("not authenticated".into()));
            }
        };

        match app_state.accounts.find_by_id(account_id).await? {
            Some(account) => {
                debug!(account_id = account.id, "Session authenticated");
                Ok(AuthedAccount(account))
            }
            None => {
                warn!(account_id = account_id, "Authentication failed: account not found");
                Err(ApiError::Unauthorized("not authenticated".into()))
            }
        }
    }
}
