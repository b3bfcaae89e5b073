//! Maps provider identities onto allow-listed local accounts

use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::models::{Account, ProviderProfile};
use crate::common::clock::Clock;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The provider identity is valid but not on the allow-list
    #[error("no local account for provider id")]
    UnauthorizedAccount,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct AccountReconciler {
    db: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl AccountReconciler {
    pub fn new(db: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Refreshes the account matching `profile` and returns it
    ///
    /// Lookup and update are one statement, so a concurrent login for the same
    /// account sees either the old or the new row, never a mix. Accounts are
    /// never created here.
    pub async fn reconcile(&self, profile: &ProviderProfile) -> Result<Account, ReconcileError> {
        let now = self.clock.now().to_rfc3339();

        let updated: Option<Account> = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET display_name = ?, avatar_url = ?, last_login_at = ?
            WHERE provider_id = ?
            RETURNING id, provider_id, display_name, avatar_url, created_at, last_login_at
            "#,
        )
        .bind(&profile.login)
        .bind(profile.avatar_url.as_deref())
        .bind(&now)
        .bind(&profile.id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| {
            error!(
                error = %e,
                provider_id = %profile.id,
                "Database error reconciling account"
            );
            ReconcileError::Database(e)
        })?;

        match updated {
            Some(account) => {
                info!(
                    account_id = account.id,
                    login = %account.display_name,
                    "Account reconciled with provider profile"
                );
                Ok(account)
            }
            None => {
                warn!(
                    provider_id = %profile.id,
                    login = %profile.login,
                    "Login rejected: provider identity is not allow-listed"
                );
                Err(ReconcileError::UnauthorizedAccount)
            }
        }
    }

    /// Loads an account by local id
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Account>, sqlx::Error> {
        debug!(account_id = id, "Looking up account");
        sqlx::query_as::<_, Account>(
            "SELECT id, provider_id, display_name, avatar_url, created_at, last_login_at FROM accounts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
    }
}
