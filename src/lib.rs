use axum::{
    Router,
    extract::{FromRef, Request},
    http::{HeaderName, HeaderValue},
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Server side.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod repository;
pub mod validation;

// Routing segregated by access level (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// Typed HTTP client with the state mirrors and the route guard.
pub mod client;

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::AppError;
pub use memory::InMemoryRepository;
pub use repository::{PostgresRepository, Repository, RepositoryState};

/// ApiDoc
///
/// The OpenAPI document for every handler and wire model, served at
/// `/api-docs/openapi.json` and browsable under `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_user, handlers::login_user, handlers::get_me,
        handlers::create_address, handlers::get_addresses, handlers::update_address,
        handlers::delete_address, handlers::get_all_addresses, handlers::get_user_addresses
    ),
    components(
        schemas(
            models::Role, models::User, models::Address, models::AddressOwner,
            models::AddressWithOwner, models::CreateAddressRequest, models::UpdateAddressRequest,
            models::RegisterRequest, models::LoginRequest, models::AuthResponse,
            models::MessageResponse, models::ErrorResponse,
        )
    ),
    tags(
        (name = "address-book", description = "Multi-tenant address book API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single, cloneable container shared by every request: the store and the
/// loaded configuration.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: Postgres or in-memory, behind the `Repository` trait.
    pub repo: RepositoryState,
    /// Configuration: The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Let the `AuthUser` extractor pull just the pieces it needs from the state.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// The capability gate for protected routes. Extracting `AuthUser` performs the
/// full token check; if it fails the extractor's rejection (401) is returned
/// and the handler never runs.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies scoped and global middleware, and
/// registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(state.config.cors_origin.clone());

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    let protected = authenticated::authenticated_routes()
        .merge(admin::admin_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(protected)
        .fallback(handlers::route_not_found)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                // Every request gets an x-request-id, used to correlate its log lines.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// A single configured origin, or any origin when none is set. The origin was
/// validated by `AppConfig::load`.
fn cors_layer(origin: Option<HeaderValue>) -> CorsLayer {
    let allow_origin = match origin {
        Some(origin) => AllowOrigin::exact(origin),
        None => AllowOrigin::from(Any),
    };

    CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_origin(allow_origin)
}

/// trace_span_logger
///
/// Builds the per-request span with method, URI, and the request id.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
