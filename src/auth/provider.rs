//! Identity provider client (GitHub OAuth apps)

use async_trait::async_trait;
use reqwest::{header::ACCEPT, Client};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, warn};

use super::models::ProviderProfile;
use crate::common::config::ProviderConfig;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("token exchange failed: {0}")]
    Exchange(String),

    #[error("profile fetch failed: {0}")]
    Profile(String),
}

/// The two server-to-server calls of the authorization-code flow
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Trades an authorization code for a provider access token
    async fn exchange_code(&self, code: &str) -> Result<SecretString, ProviderError>;

    /// Loads the profile of the user the access token belongs to
    async fn fetch_profile(&self, access_token: &SecretString)
        -> Result<ProviderProfile, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    id: serde_json::Value,
    login: String,
    avatar_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    client_id: String,
    client_secret: SecretString,
    redirect_uri: String,
    token_url: String,
    user_url: String,
}

impl GitHubClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, reqwest::Error> {
        // GitHub's API rejects requests without a User-Agent.
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            token_url: config.token_url.clone(),
            user_url: config.user_url.clone(),
        })
    }
}

#[async_trait]
impl IdentityProvider for GitHubClient {
    async fn exchange_code(&self, code: &str) -> Result<SecretString, ProviderError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret().as_str()),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        debug!("Exchanging authorization code for access token");

        let response = self
            .client
            .post(&self.token_url)
            .header(ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                // reqwest errors carry the URL only, never the form body.
                error!(error = %e, "HTTP error contacting token endpoint");
                ProviderError::Exchange("token endpoint unreachable".to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(http_status = %status, "Token endpoint returned error status");
            return Err(ProviderError::Exchange(format!("HTTP {}", status)));
        }

        let body = response.json::<TokenResponse>().await.map_err(|e| {
            error!(error = %e, "Failed to parse token endpoint response");
            ProviderError::Exchange("malformed token response".to_string())
        })?;

        match body.access_token.filter(|t| !t.is_empty()) {
            Some(token) => Ok(SecretString::new(token)),
            None => {
                warn!(
                    provider_error = body.error.as_deref().unwrap_or("none"),
                    "Token endpoint response carried no access token"
                );
                Err(ProviderError::Exchange("no access token in response".to_string()))
            }
        }
    }

    async fn fetch_profile(
        &self,
        access_token: &SecretString,
    ) -> Result<ProviderProfile, ProviderError> {
        let response = self
            .client
            .get(&self.user_url)
            .header(ACCEPT, "application/json")
            .bearer_auth(access_token.expose_secret())
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP error contacting profile endpoint");
                ProviderError::Profile("profile endpoint unreachable".to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(http_status = %status, "Profile endpoint returned error status");
            return Err(ProviderError::Profile(format!("HTTP {}", status)));
        }

        let body = response.json::<ProfileResponse>().await.map_err(|e| {
            error!(error = %e, "Failed to parse profile response");
            ProviderError::Profile("malformed profile response".to_string())
        })?;

        let id = match body.id {
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) if !s.is_empty() => s,
            other => {
                warn!(id = %other, "Profile response carried an unusable id");
                return Err(ProviderError::Profile("profile id missing".to_string()));
            }
        };

        Ok(ProviderProfile {
            id,
            login: body.login,
            avatar_url: body.avatar_url,
        })
    }
}
