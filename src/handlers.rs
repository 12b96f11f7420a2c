use crate::{
    AppState,
    auth::{self, AuthUser},
    error::{AppError, Result},
    models::{
        Address, AddressWithOwner, AuthResponse, CreateAddressRequest, ErrorResponse, LoginRequest,
        MessageResponse, RegisterRequest, UpdateAddressRequest, User,
    },
    validation::{ValidatedJson, ValidatedPath, ValidatedQuery},
};
use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Deserializer};
use uuid::Uuid;

// --- Filter Structs ---

/// AddressScope
///
/// The optional impersonation parameter accepted by the address endpoints.
/// Honored only for admins; a regular user's `userId` is ignored. An empty or
/// unparseable `userId` counts as absent, so the caller acts as themselves.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AddressScope {
    /// Target user whose addresses an admin wants to act on.
    #[serde(default, deserialize_with = "lenient_uuid")]
    pub user_id: Option<Uuid>,
}

fn lenient_uuid<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<Uuid>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| Uuid::parse_str(value.trim()).ok()))
}

const ADDRESS_NOT_FOUND: &str = "Address not found";

// --- Auth Handlers ---

/// register_user
///
/// [Public Route] Creates an account and returns it with a session token.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = AuthResponse),
        (status = 400, description = "Invalid or duplicate email, weak password", body = ErrorResponse),
        (status = 403, description = "Admin self-registration disabled", body = ErrorResponse)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let (user, token) = auth::register(state.repo.as_ref(), &state.config, payload).await?;
    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

/// login_user
///
/// [Public Route] Exchanges credentials for a session token. Unknown email and
/// wrong password are indistinguishable to the caller.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
pub async fn login_user(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let (user, token) = auth::login(state.repo.as_ref(), &state.config, payload).await?;
    Ok(Json(AuthResponse { user, token }))
}

/// get_me
///
/// [Authenticated Route] The user the bearer token resolves to.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    )
)]
pub async fn get_me(user: AuthUser) -> Json<User> {
    Json(user.into())
}

// --- Address Handlers ---

/// create_address
///
/// [Authenticated Route] Stores a new address owned by the caller. The owner is
/// always taken from the token, never from the body.
#[utoipa::path(
    post,
    path = "/api/addresses",
    request_body = CreateAddressRequest,
    responses(
        (status = 201, description = "Created", body = Address),
        (status = 400, description = "Missing or empty field", body = ErrorResponse)
    )
)]
pub async fn create_address(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateAddressRequest>,
) -> Result<(StatusCode, Json<Address>)> {
    let address = state.repo.create_address(id, payload).await?;
    tracing::info!(address_id = %address.id, user_id = %id, "Address created");
    Ok((StatusCode::CREATED, Json(address)))
}

/// get_addresses
///
/// [Authenticated Route] Lists the caller's addresses, or, for an admin passing
/// `userId`, that user's addresses.
#[utoipa::path(
    get,
    path = "/api/addresses",
    params(AddressScope),
    responses((status = 200, description = "Addresses in scope", body = [Address]))
)]
pub async fn get_addresses(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedQuery(scope): ValidatedQuery<AddressScope>,
) -> Result<Json<Vec<Address>>> {
    let owner = user.scope(scope.user_id);
    Ok(Json(state.repo.list_addresses(owner).await?))
}

/// update_address
///
/// [Authenticated Route] Applies a partial update. Matches on both `id` and the
/// caller's scope, so a foreign address is reported exactly like a missing one.
#[utoipa::path(
    put,
    path = "/api/addresses/{id}",
    params(("id" = Uuid, Path, description = "Address ID"), AddressScope),
    request_body = UpdateAddressRequest,
    responses(
        (status = 200, description = "Updated", body = Address),
        (status = 400, description = "Empty field", body = ErrorResponse),
        (status = 404, description = "Not found or not yours", body = ErrorResponse)
    )
)]
pub async fn update_address(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedQuery(scope): ValidatedQuery<AddressScope>,
    ValidatedJson(payload): ValidatedJson<UpdateAddressRequest>,
) -> Result<Json<Address>> {
    let owner = user.scope(scope.user_id);
    state
        .repo
        .update_address(id, owner, payload)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(ADDRESS_NOT_FOUND.to_string()))
}

/// delete_address
///
/// [Authenticated Route] Same scoping rule as `update_address`.
#[utoipa::path(
    delete,
    path = "/api/addresses/{id}",
    params(("id" = Uuid, Path, description = "Address ID"), AddressScope),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Not found or not yours", body = ErrorResponse)
    )
)]
pub async fn delete_address(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedQuery(scope): ValidatedQuery<AddressScope>,
) -> Result<Json<MessageResponse>> {
    let owner = user.scope(scope.user_id);
    if !state.repo.delete_address(id, owner).await? {
        return Err(AppError::NotFound(ADDRESS_NOT_FOUND.to_string()));
    }

    tracing::info!(address_id = %id, user_id = %user.id, "Address deleted");
    Ok(Json(MessageResponse {
        message: "Address deleted successfully".to_string(),
    }))
}

// --- Admin Handlers ---

/// get_all_addresses
///
/// [Admin Route] Every address in the system with its owner's name and email.
#[utoipa::path(
    get,
    path = "/api/addresses/all",
    responses(
        (status = 200, description = "All addresses", body = [AddressWithOwner]),
        (status = 403, description = "Not an admin", body = ErrorResponse)
    )
)]
pub async fn get_all_addresses(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<AddressWithOwner>>> {
    user.require_admin()?;
    Ok(Json(state.repo.list_all_addresses().await?))
}

/// get_user_addresses
///
/// [Admin Route] The explicit form of impersonated listing: one user's addresses.
#[utoipa::path(
    get,
    path = "/api/admin/users/{user_id}/addresses",
    params(("user_id" = Uuid, Path, description = "Target user ID")),
    responses(
        (status = 200, description = "The user's addresses", body = [Address]),
        (status = 403, description = "Not an admin", body = ErrorResponse)
    )
)]
pub async fn get_user_addresses(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedPath(user_id): ValidatedPath<Uuid>,
) -> Result<Json<Vec<Address>>> {
    user.require_admin()?;
    Ok(Json(state.repo.list_addresses(user_id).await?))
}

/// route_not_found
///
/// Fallback for unmatched paths, so they too answer with the JSON error body.
pub async fn route_not_found() -> AppError {
    AppError::NotFound("No such route".to_string())
}
