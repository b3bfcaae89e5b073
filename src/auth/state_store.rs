//! Single-use anti-forgery state tokens for the OAuth redirect round trip

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Duration;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::models::PendingAuthState;
use crate::common::clock::Clock;

/// How long a login attempt may wait for its callback
pub const STATE_TTL_MINUTES: i64 = 10;

/// Storage for pending login attempts
///
/// `consume` must be atomic: of any number of concurrent calls with the same
/// token, exactly one receives the entry.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Records a new attempt and returns its token
    async fn issue(&self, remember: bool) -> String;

    /// Removes and returns the attempt for `token`, if it is still live
    async fn consume(&self, token: &str) -> Option<PendingAuthState>;
}

/// Process-local state store
///
/// Expired entries are swept lazily on every `issue` and `consume`; there is
/// no background task. Entries do not survive a restart.
#[derive(Clone)]
pub struct InMemoryStateStore {
    states: Arc<Mutex<HashMap<String, PendingAuthState>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl InMemoryStateStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(clock, Duration::minutes(STATE_TTL_MINUTES))
    }

    pub fn with_ttl(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            states: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            clock,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingAuthState>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.states.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn sweep(&self, states: &mut HashMap<String, PendingAuthState>) {
        let now = self.clock.now();
        let ttl = self.ttl;
        let before = states.len();
        states.retain(|_, pending| now - pending.created_at <= ttl);

        let removed = before - states.len();
        if removed > 0 {
            debug!(removed = removed, "Swept expired login states");
        }
    }

    /// 32 random bytes, URL-safe base64 without padding
    fn generate_token() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn issue(&self, remember: bool) -> String {
        let token = Self::generate_token();
        let pending = PendingAuthState {
            remember,
            created_at: self.clock.now(),
        };

        let mut states = self.lock();
        self.sweep(&mut states);
        states.insert(token.clone(), pending);

        token
    }

    async fn consume(&self, token: &str) -> Option<PendingAuthState> {
        let mut states = self.lock();
        self.sweep(&mut states);
        states.remove(token)
    }
}
