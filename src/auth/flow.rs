//! OAuth authorization-code flow
//!
//! A login attempt moves through two HTTP round trips:
//!
//! 1. `start` records a pending state and returns the provider's authorize
//!    URL. Nothing about the session is decided yet except its lifetime.
//! 2. `complete` redeems the state, exchanges the code, fetches the profile,
//!    reconciles it against the allow-list and signs a session credential.
//!
//! The controller keeps nothing between attempts; the state store is the only
//! shared mutable piece. The state is consumed before any provider call, so no
//! lock is held across network I/O and a failed attempt cannot be replayed.

use chrono::Duration;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use super::accounts::{AccountReconciler, ReconcileError};
use super::models::Account;
use super::provider::{IdentityProvider, ProviderError};
use super::state_store::StateStore;
use super::token::TokenCodec;
use crate::common::config::ProviderConfig;
use crate::common::helpers::safe_token_log;

pub const AUTHORIZE_SCOPE: &str = "read:user";
pub const SHORT_SESSION_HOURS: i64 = 2;
pub const LONG_SESSION_DAYS: i64 = 30;

/// Why a callback did not produce a session
#[derive(Debug, Error)]
pub enum LoginRejection {
    #[error("state token missing, already used or expired")]
    InvalidState,

    #[error("identity provider request failed: {0}")]
    ProviderFailure(#[from] ProviderError),

    #[error("provider identity has no local account")]
    Unauthorized,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ReconcileError> for LoginRejection {
    fn from(e: ReconcileError) -> Self {
        match e {
            ReconcileError::UnauthorizedAccount => LoginRejection::Unauthorized,
            ReconcileError::Database(e) => LoginRejection::Internal(e.to_string()),
        }
    }
}

/// Outcome of a successful callback
#[derive(Debug, Clone)]
pub struct SessionGrant {
    pub account: Account,
    pub credential: String,
    pub ttl: Duration,
}

/// Session lifetime chosen at login time
pub fn session_ttl(remember: bool) -> Duration {
    if remember {
        Duration::days(LONG_SESSION_DAYS)
    } else {
        Duration::hours(SHORT_SESSION_HOURS)
    }
}

pub struct OAuthFlow {
    client_id: String,
    redirect_uri: String,
    authorize_url: String,
    states: Arc<dyn StateStore>,
    provider: Arc<dyn IdentityProvider>,
    accounts: AccountReconciler,
    tokens: TokenCodec,
}

impl OAuthFlow {
    pub fn new(
        config: &ProviderConfig,
        states: Arc<dyn StateStore>,
        provider: Arc<dyn IdentityProvider>,
        accounts: AccountReconciler,
        tokens: TokenCodec,
    ) -> Self {
        Self {
            client_id: config.client_id.clone(),
            redirect_uri: config.redirect_uri.clone(),
            authorize_url: config.authorize_url.clone(),
            states,
            provider,
            accounts,
            tokens,
        }
    }

    /// Begins a login attempt and returns the provider URL to redirect to
    pub async fn start(&self, remember: bool) -> String {
        let state = self.states.issue(remember).await;
        info!(
            remember = remember,
            state = %safe_token_log(&state),
            "Starting OAuth login"
        );

        format!(
            "{}?client_id={}&redirect_uri={}&scope={}&state={}",
            self.authorize_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(AUTHORIZE_SCOPE),
            urlencoding::encode(&state)
        )
    }

    /// Finishes a login attempt from the provider's callback parameters
    pub async fn complete(&self, code: &str, state: &str) -> Result<SessionGrant, LoginRejection> {
        let pending = match self.states.consume(state).await {
            Some(p) => p,
            None => {
                warn!(state = %safe_token_log(state), "Callback rejected: unknown or expired state");
                return Err(LoginRejection::InvalidState);
            }
        };

        let access_token = self.provider.exchange_code(code).await.map_err(|e| {
            warn!(error = %e, "Callback rejected: code exchange failed");
            LoginRejection::from(e)
        })?;
        let profile = self.provider.fetch_profile(&access_token).await.map_err(|e| {
            warn!(error = %e, "Callback rejected: profile fetch failed");
            LoginRejection::from(e)
        })?;

        let account = self.accounts.reconcile(&profile).await?;

        let ttl = session_ttl(pending.remember);
        let credential = self
            .tokens
            .issue(&account.id.to_string(), &account.display_name, ttl)
            .map_err(|e| {
                error!(error = %e, account_id = account.id, "Failed to sign session credential");
                LoginRejection::Internal("credential signing failed".to_string())
            })?;

        info!(
            account_id = account.id,
            remember = pending.remember,
            ttl_secs = ttl.num_seconds(),
            "Login completed"
        );

        Ok(SessionGrant {
            account,
            credential,
            ttl,
        })
    }

    /// Discards the attempt behind `state` after the provider reported an error
    pub async fn abandon(&self, state: &str) {
        if self.states.consume(state).await.is_some() {
            info!(state = %safe_token_log(state), "Login attempt abandoned at provider");
        }
    }
}
