//! Tests for auth module
//!
//! These drive the full router with a fake identity provider that counts its
//! calls, an in-memory database and a manually advanced clock:
//! - Login redirect and state issuance
//! - Callback outcomes (success, invalid state, provider failure, unauthorized)
//! - Session cookie policy and the session extractor

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
        Router,
    };
    use chrono::Duration;
    use secrecy::SecretString;
    use serde_json::Value;
    use sqlx::SqlitePool;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    use crate::auth::accounts::tests::setup_test_db;
    use crate::auth::models::ProviderProfile;
    use crate::auth::provider::{IdentityProvider, ProviderError};
    use crate::auth::state_store::InMemoryStateStore;
    use crate::build_app;
    use crate::common::clock::testing::ManualClock;
    use crate::common::clock::Clock;
    use crate::common::migrations::provision_account;
    use crate::common::{AppState, Config};

    const FRONTEND: &str = "http://localhost:3000";

    // ============================================================================
    // Test Fixtures
    // ============================================================================

    struct FakeProvider {
        exchange_calls: AtomicUsize,
        profile_calls: AtomicUsize,
        last_code: Mutex<Option<String>>,
        fail_exchange: bool,
        profile: Option<ProviderProfile>,
    }

    impl FakeProvider {
        fn returning(id: &str, login: &str) -> Self {
            Self {
                exchange_calls: AtomicUsize::new(0),
                profile_calls: AtomicUsize::new(0),
                last_code: Mutex::new(None),
                fail_exchange: false,
                profile: Some(ProviderProfile {
                    id: id.to_string(),
                    login: login.to_string(),
                    avatar_url: Some(format!("https://avatars.example.com/u/{}", id)),
                }),
            }
        }

        fn failing_exchange() -> Self {
            Self {
                fail_exchange: true,
                ..Self::returning("42", "alice")
            }
        }

        fn failing_profile() -> Self {
            Self {
                profile: None,
                ..Self::returning("42", "alice")
            }
        }

        fn calls(&self) -> (usize, usize) {
            (
                self.exchange_calls.load(Ordering::SeqCst),
                self.profile_calls.load(Ordering::SeqCst),
            )
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        async fn exchange_code(&self, code: &str) -> Result<SecretString, ProviderError> {
            self.exchange_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_code.lock().unwrap() = Some(code.to_string());
            if self.fail_exchange {
                return Err(ProviderError::Exchange("HTTP 500 Internal Server Error".into()));
            }
            Ok(SecretString::new("gho_test".into()))
        }

        async fn fetch_profile(
            &self,
            _access_token: &SecretString,
        ) -> Result<ProviderProfile, ProviderError> {
            self.profile_calls.fetch_add(1, Ordering::SeqCst);
            self.profile
                .clone()
                .ok_or_else(|| ProviderError::Profile("HTTP 401 Unauthorized".into()))
        }
    }

    struct Harness {
        app: Router,
        state: Arc<AppState>,
        provider: Arc<FakeProvider>,
        clock: Arc<ManualClock>,
        pool: SqlitePool,
        account_id: i64,
    }

    fn test_config() -> Config {
        let vars = [
            ("GITHUB_CLIENT_ID", "test_client_id"),
            ("GITHUB_CLIENT_SECRET", "test_client_secret"),
            ("GITHUB_REDIRECT_URI", "http://localhost:8080/auth/github/callback"),
            ("JWT_SECRET", "test_secret_key"),
            ("FRONTEND_ORIGIN", FRONTEND),
        ];
        Config::from_lookup(|key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        })
        .unwrap()
    }

    async fn harness(provider: FakeProvider) -> Harness {
        let pool = setup_test_db().await;
        let account_id = provision_account(&pool, "42", "alice")
            .await
            .unwrap()
            .unwrap();

        let clock = Arc::new(ManualClock::default());
        let provider = Arc::new(provider);
        let state = Arc::new(AppState::new(
            Arc::new(test_config()),
            pool.clone(),
            Arc::new(InMemoryStateStore::new(clock.clone())),
            provider.clone(),
            clock.clone(),
        ));

        Harness {
            app: build_app(state.clone()),
            state,
            provider,
            clock,
            pool,
            account_id,
        }
    }

    async fn get(app: &Router, uri: &str) -> Response {
        app.clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn get_with_cookie(app: &Router, uri: &str, cookie: &str) -> Response {
        app.clone()
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .header(header::COOKIE, cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    fn location(response: &Response) -> String {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|h| h.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    fn set_cookie(response: &Response) -> Option<String> {
        response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
    }

    fn query_param(url: &str, name: &str) -> Option<String> {
        let query = url.split_once('?')?.1;
        query.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            (k == name).then(|| urlencoding::decode(v).unwrap().into_owned())
        })
    }

    /// Runs the login step and returns the issued state token
    async fn login(h: &Harness, remember: Option<&str>) -> String {
        let uri = match remember {
            Some(r) => format!("/auth/github/login?remember={}", r),
            None => "/auth/github/login".to_string(),
        };
        let response = get(&h.app, &uri).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        query_param(&location(&response), "state").expect("redirect carries state")
    }

    async fn callback(h: &Harness, code: &str, state: &str) -> Response {
        get(
            &h.app,
            &format!(
                "/auth/github/callback?code={}&state={}",
                urlencoding::encode(code),
                urlencoding::encode(state)
            ),
        )
        .await
    }

    fn session_token(cookie: &str) -> String {
        cookie
            .split(';')
            .next()
            .and_then(|kv| kv.strip_prefix("session="))
            .unwrap()
            .to_string()
    }

    async fn json_body(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    // ============================================================================
    // Login
    // ============================================================================

    #[tokio::test]
    async fn test_login_redirects_to_provider_with_state() {
        let h = harness(FakeProvider::returning("42", "alice")).await;
        let response = get(&h.app, "/auth/github/login").await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert!(set_cookie(&response).is_none(), "no session before callback");

        let url = location(&response);
        assert!(url.starts_with("https://github.com/login/oauth/authorize?"));
        assert_eq!(query_param(&url, "client_id").as_deref(), Some("test_client_id"));
        assert_eq!(
            query_param(&url, "redirect_uri").as_deref(),
            Some("http://localhost:8080/auth/github/callback")
        );
        assert_eq!(query_param(&url, "scope").as_deref(), Some("read:user"));
        assert_eq!(query_param(&url, "state").map(|s| s.len()), Some(43));
        assert!(!url.contains("test_client_secret"));
    }

    // ============================================================================
    // Callback
    // ============================================================================

    #[tokio::test]
    async fn test_callback_success_sets_short_session() {
        let h = harness(FakeProvider::returning("42", "alice")).await;
        let state = login(&h, None).await;

        let response = callback(&h, "c1", &state).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), FRONTEND);
        let cookie = set_cookie(&response).expect("session cookie set");
        assert!(cookie.starts_with("session="));
        assert!(cookie.contains("Max-Age=7200"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
        assert!(!cookie.contains("Secure"));

        let claims = h.state.tokens.verify(&session_token(&cookie)).unwrap();
        assert_eq!(claims.sub, h.account_id.to_string());
        assert_eq!(claims.login, "alice");

        let account = h.state.accounts.find_by_id(h.account_id).await.unwrap().unwrap();
        assert_eq!(account.last_login_at, Some(h.clock.now().to_rfc3339()));
        assert_eq!(
            h.provider.last_code.lock().unwrap().as_deref(),
            Some("c1")
        );
        assert_eq!(h.provider.calls(), (1, 1));
    }

    #[tokio::test]
    async fn test_callback_remember_sets_long_session() {
        let h = harness(FakeProvider::returning("42", "alice")).await;
        let state = login(&h, Some("1")).await;

        let response = callback(&h, "c1", &state).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        let cookie = set_cookie(&response).expect("session cookie set");
        assert!(cookie.contains("Max-Age=2592000"));

        // Still valid after the short window has passed
        h.clock.advance(Duration::hours(3));
        assert!(h.state.tokens.verify(&session_token(&cookie)).is_some());
    }

    #[tokio::test]
    async fn test_callback_unknown_state_makes_no_provider_calls() {
        let h = harness(FakeProvider::returning("42", "alice")).await;

        let response = callback(&h, "c1", "unknown").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(set_cookie(&response).is_none());
        assert_eq!(h.provider.calls(), (0, 0));
    }

    #[tokio::test]
    async fn test_callback_state_is_single_use() {
        let h = harness(FakeProvider::returning("42", "alice")).await;
        let state = login(&h, None).await;

        assert_eq!(callback(&h, "c1", &state).await.status(), StatusCode::FOUND);
        let replay = callback(&h, "c1", &state).await;

        assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
        assert_eq!(h.provider.calls(), (1, 1));
    }

    #[tokio::test]
    async fn test_callback_expired_state_rejected() {
        let h = harness(FakeProvider::returning("42", "alice")).await;
        let state = login(&h, None).await;

        h.clock.advance(Duration::minutes(11));
        let response = callback(&h, "c1", &state).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(h.provider.calls(), (0, 0));
    }

    #[tokio::test]
    async fn test_callback_unauthorized_account_redirects_with_marker() {
        let h = harness(FakeProvider::returning("99", "bob")).await;
        let state = login(&h, None).await;

        let response = callback(&h, "c1", &state).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), format!("{}?error=unauthorized", FRONTEND));
        assert!(set_cookie(&response).is_none());

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM accounts")
            .fetch_one(&h.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_callback_provider_failure_consumes_state() {
        let h = harness(FakeProvider::failing_exchange()).await;
        let state = login(&h, None).await;

        let response = callback(&h, "c1", &state).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(set_cookie(&response).is_none());

        let body = json_body(response).await;
        assert_eq!(body["code"], "BAD_GATEWAY");
        assert!(!body.to_string().contains("500"));

        // Retrying with the same state does not reach the provider again
        let retry = callback(&h, "c1", &state).await;
        assert_eq!(retry.status(), StatusCode::BAD_REQUEST);
        assert_eq!(h.provider.calls(), (1, 0));
    }

    #[tokio::test]
    async fn test_callback_profile_failure_is_gateway_error() {
        let h = harness(FakeProvider::failing_profile()).await;
        let state = login(&h, None).await;

        let response = callback(&h, "c1", &state).await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(h.provider.calls(), (1, 1));
    }

    #[tokio::test]
    async fn test_callback_provider_error_param_abandons_attempt() {
        let h = harness(FakeProvider::returning("42", "alice")).await;
        let state = login(&h, None).await;

        let response = get(
            &h.app,
            &format!("/auth/github/callback?error=access_denied&state={}", state),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), format!("{}?error=access_denied", FRONTEND));
        assert_eq!(h.provider.calls(), (0, 0));

        let late = callback(&h, "c1", &state).await;
        assert_eq!(late.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_callback_missing_code_is_bad_request() {
        let h = harness(FakeProvider::returning("42", "alice")).await;
        let state = login(&h, None).await;

        let response = get(&h.app, &format!("/auth/github/callback?state={}", state)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(h.provider.calls(), (0, 0));
    }

    #[tokio::test]
    async fn test_remember_is_fixed_at_login() {
        let h = harness(FakeProvider::returning("42", "alice")).await;
        let state = login(&h, None).await;

        // A remember flag smuggled into the callback is ignored
        let response = get(
            &h.app,
            &format!("/auth/github/callback?code=c1&state={}&remember=1", state),
        )
        .await;

        let cookie = set_cookie(&response).expect("session cookie set");
        assert!(cookie.contains("Max-Age=7200"));
    }

    #[tokio::test]
    async fn test_concurrent_callbacks_single_session() {
        let h = harness(FakeProvider::returning("42", "alice")).await;
        let state = login(&h, None).await;

        let (a, b) = tokio::join!(callback(&h, "c1", &state), callback(&h, "c1", &state));
        let statuses = [a.status(), b.status()];

        assert!(statuses.contains(&StatusCode::FOUND));
        assert!(statuses.contains(&StatusCode::BAD_REQUEST));
        assert_eq!(h.provider.calls(), (1, 1));
    }

    // ============================================================================
    // Session
    // ============================================================================

    #[tokio::test]
    async fn test_me_with_valid_session() {
        let h = harness(FakeProvider::returning("42", "alice")).await;
        let state = login(&h, None).await;
        let cookie = set_cookie(&callback(&h, "c1", &state).await).unwrap();
        let token = session_token(&cookie);

        let response =
            get_with_cookie(&h.app, "/auth/me", &format!("theme=dark; session={}", token)).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["id"], h.account_id);
        assert_eq!(body["provider_id"], "42");
        assert_eq!(body["display_name"], "alice");
    }

    #[tokio::test]
    async fn test_me_rejects_missing_tampered_and_expired_sessions() {
        let h = harness(FakeProvider::returning("42", "alice")).await;
        let state = login(&h, None).await;
        let cookie = set_cookie(&callback(&h, "c1", &state).await).unwrap();
        let token = session_token(&cookie);

        let missing = get(&h.app, "/auth/me").await;
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let mut tampered = token.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == 'A' { 'B' } else { 'A' });
        let response =
            get_with_cookie(&h.app, "/auth/me", &format!("session={}", tampered)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        h.clock.advance(Duration::hours(2));
        let expired = get_with_cookie(&h.app, "/auth/me", &format!("session={}", token)).await;
        assert_eq!(expired.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_me_rejects_valid_credential_for_missing_account() {
        let h = harness(FakeProvider::returning("42", "alice")).await;
        let token = h
            .state
            .tokens
            .issue(&(h.account_id + 1000).to_string(), "ghost", Duration::hours(2))
            .unwrap();

        let response = get_with_cookie(&h.app, "/auth/me", &format!("session={}", token)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let non_numeric = h
            .state
            .tokens
            .issue("not-an-id", "ghost", Duration::hours(2))
            .unwrap();
        let response =
            get_with_cookie(&h.app, "/auth/me", &format!("session={}", non_numeric)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_clears_cookie() {
        let h = harness(FakeProvider::returning("42", "alice")).await;

        let response = h
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/logout")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let cookie = set_cookie(&response).unwrap();
        assert!(cookie.starts_with("session=;"));
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.contains("HttpOnly"));
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness(FakeProvider::returning("42", "alice")).await;

        let response = get(&h.app, "/health").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["ok"], true);
    }

    // ============================================================================
    // Session lifetime policy
    // ============================================================================

    #[test]
    fn test_session_ttl_policy() {
        use crate::auth::flow::session_ttl;

        assert_eq!(session_ttl(false).num_seconds(), 7_200);
        assert_eq!(session_ttl(true).num_seconds(), 2_592_000);
    }
}
