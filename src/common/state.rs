// Application state shared across all handlers

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::auth::accounts::AccountReconciler;
use crate::auth::flow::OAuthFlow;
use crate::auth::provider::IdentityProvider;
use crate::auth::state_store::StateStore;
use crate::auth::token::TokenCodec;
use crate::common::clock::Clock;
use crate::common::config::Config;

/// Application state containing services and configuration
///
/// Everything here is read-only after startup; the state store behind the
/// flow is the only component with interior mutability.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub flow: Arc<OAuthFlow>,
    pub accounts: AccountReconciler,
    pub tokens: TokenCodec,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        db: SqlitePool,
        states: Arc<dyn StateStore>,
        provider: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let accounts = AccountReconciler::new(db, clock.clone());
        let tokens = TokenCodec::new(&config.jwt_secret, clock);
        let flow = Arc::new(OAuthFlow::new(
            &config.provider,
            states,
            provider,
            accounts.clone(),
            tokens.clone(),
        ));

        Self {
            config,
            flow,
            accounts,
            tokens,
        }
    }
}
