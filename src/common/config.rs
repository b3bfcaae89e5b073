// Process configuration read once at startup

use secrecy::SecretString;
use std::env;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
pub const DEFAULT_USER_URL: &str = "https://api.github.com/user";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable '{0}' is required but missing")]
    Missing(&'static str),

    #[error("environment variable '{key}' has an invalid value: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// OAuth application registration at the identity provider
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: String,
    pub authorize_url: String,
    pub token_url: String,
    pub user_url: String,
    pub timeout: Duration,
}

/// Immutable application configuration
///
/// Built once in `main` and shared behind an `Arc`. Components receive the
/// pieces they need at construction time and never read the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: ProviderConfig,
    pub jwt_secret: SecretString,
    pub frontend_origin: String,
    pub database_url: String,
    pub port: u16,
    pub cookie_secure: bool,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Missing required values are reported here so the process refuses to
    /// start instead of failing on the first login.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| -> Result<String, ConfigError> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        let optional = |key: &'static str, default: &str| -> String {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let timeout_secs = optional("PROVIDER_TIMEOUT_SECS", "10")
            .parse::<u64>()
            .map_err(|e| ConfigError::Invalid {
                key: "PROVIDER_TIMEOUT_SECS",
                reason: e.to_string(),
            })?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "PROVIDER_TIMEOUT_SECS",
                reason: "timeout must be at least one second".to_string(),
            });
        }

        let port = optional("PORT", "8080")
            .parse::<u16>()
            .map_err(|e| ConfigError::Invalid {
                key: "PORT",
                reason: e.to_string(),
            })?;

        let cookie_secure = match optional("COOKIE_SECURE", "false").to_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            other => {
                return Err(ConfigError::Invalid {
                    key: "COOKIE_SECURE",
                    reason: format!("expected a boolean, got '{}'", other),
                })
            }
        };

        let provider = ProviderConfig {
            client_id: required("GITHUB_CLIENT_ID")?,
            client_secret: SecretString::new(required("GITHUB_CLIENT_SECRET")?),
            redirect_uri: required("GITHUB_REDIRECT_URI")?,
            authorize_url: optional("GITHUB_AUTHORIZE_URL", DEFAULT_AUTHORIZE_URL),
            token_url: optional("GITHUB_TOKEN_URL", DEFAULT_TOKEN_URL),
            user_url: optional("GITHUB_USER_URL", DEFAULT_USER_URL),
            timeout: Duration::from_secs(timeout_secs),
        };

        let frontend_origin = optional("FRONTEND_ORIGIN", "http://localhost:3000")
            .trim_end_matches('/')
            .to_string();
        if !(frontend_origin.starts_with("http://") || frontend_origin.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: "FRONTEND_ORIGIN",
                reason: "expected an http(s) origin".to_string(),
            });
        }

        Ok(Self {
            provider,
            jwt_secret: SecretString::new(required("JWT_SECRET")?),
            frontend_origin,
            database_url: optional("DATABASE_URL", "sqlite://dashboard.db"),
            port,
            cookie_secure,
        })
    }
}
