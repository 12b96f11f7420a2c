use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// Oversight endpoints. The router is layered with the same authentication
/// middleware as the authenticated routes; the `admin` role itself is checked
/// inside each handler and yields 403 for everyone else.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /api/addresses/all
        // Every address with owner name and email attached. The static `all`
        // segment takes priority over `/api/addresses/{id}`.
        .route("/api/addresses/all", get(handlers::get_all_addresses))
        // GET /api/admin/users/{user_id}/addresses
        .route(
            "/api/admin/users/{user_id}/addresses",
            get(handlers::get_user_addresses),
        )
}
