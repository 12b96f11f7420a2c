use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Authenticated Router Module
///
/// Every route here sits behind the auth middleware layer applied in
/// `create_router`, so handlers always receive a resolved `AuthUser`. Address
/// handlers scope every store call to the caller (or, for admins, to `userId`).
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/auth/me
        .route("/api/auth/me", get(handlers::get_me))
        // GET/POST /api/addresses
        .route(
            "/api/addresses",
            get(handlers::get_addresses).post(handlers::create_address),
        )
        // PUT/DELETE /api/addresses/{id}
        // Partial update or removal; 404 when the id is missing or not in scope.
        .route(
            "/api/addresses/{id}",
            put(handlers::update_address).delete(handlers::delete_address),
        )
}
