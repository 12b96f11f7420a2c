use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /api/auth/register
        .route("/api/auth/register", post(handlers::register_user))
        // POST /api/auth/login
        .route("/api/auth/login", post(handlers::login_user))
}
