//! Signed session credentials

use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::debug;

use super::models::SessionClaims;
use crate::common::clock::Clock;

/// Issues and verifies HS256 session tokens with a process-wide secret
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    pub fn new(secret: &SecretString, clock: Arc<dyn Clock>) -> Self {
        let secret = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            clock,
        }
    }

    /// Signs a credential for `subject` that expires `ttl` from now
    pub fn issue(
        &self,
        subject: &str,
        login: &str,
        ttl: Duration,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = SessionClaims {
            sub: subject.to_string(),
            login: login.to_string(),
            exp: (self.clock.now() + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
    }

    /// Returns the claims of a well-formed, correctly signed, unexpired token
    ///
    /// Malformed input, a bad signature and expiry all yield `None`.
    pub fn verify(&self, token: &str) -> Option<SessionClaims> {
        // Expiry is checked against the injected clock below, with no leeway.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = match decode::<SessionClaims>(token, &self.decoding_key, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!(error = %e, "Session token rejected");
                return None;
            }
        };

        if self.clock.now().timestamp() >= claims.exp {
            debug!(sub = %claims.sub, "Session token expired");
            return None;
        }

        Some(claims)
    }
}
