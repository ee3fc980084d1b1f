//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `GET /` - Health check
/// - `GET /auth/:provider` - Start an OAuth login (`kakao` or `naver`)
/// - `GET /auth/:provider/callback` - OAuth callback, sets the session cookie
/// - `POST /auth/login` - Email/password login
/// - `POST /auth/signup` - Email/password registration
/// - `POST /auth/logout` - Clear the session cookie
/// - `GET /session`, `GET /me`, `GET /api/me` - Current user
pub fn auth_routes() -> Router {
    Router::new()
        .route("/", get(handlers::health))
        .route("/auth/login", post(handlers::login))
        .route("/auth/signup", post(handlers::signup))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/:provider", get(handlers::oauth_start))
        .route("/auth/:provider/callback", get(handlers::oauth_callback))
        .route("/session", get(handlers::session))
        .route("/me", get(handlers::session))
        .route("/api/me", get(handlers::session))
}
