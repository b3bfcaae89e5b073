//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `GET /auth/github/login` - Start GitHub OAuth (redirect)
/// - `GET /auth/github/callback` - OAuth callback, sets the session cookie
/// - `GET /auth/me` - Current account
/// - `POST /auth/logout` - Clear the session cookie
pub fn auth_routes() -> Router {
    Router::new()
        .route("/auth/github/login", get(handlers::github_login))
        .route("/auth/github/callback", get(handlers::github_callback))
        .route("/auth/me", get(handlers::me_handler))
        .route("/auth/logout", post(handlers::logout_handler))
}
