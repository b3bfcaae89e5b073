//! Authentication data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Session credential claims
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    /// Local account id
    pub sub: String,
    /// Provider login name, informational only
    pub login: String,
    pub exp: i64,
}

/// Allow-listed account
#[derive(FromRow, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub provider_id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub created_at: String,
    pub last_login_at: Option<String>,
}

/// One outstanding login attempt, keyed by its state token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuthState {
    pub remember: bool,
    pub created_at: DateTime<Utc>,
}

/// Identity returned by the provider's profile endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub id: String,
    pub login: String,
    pub avatar_url: Option<String>,
}

/// Query parameters for `GET /auth/github/login`
#[derive(Deserialize, Debug, Default)]
pub struct LoginParams {
    pub remember: Option<String>,
}

/// Query parameters for `GET /auth/github/callback`
#[derive(Deserialize, Debug, Default)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}
