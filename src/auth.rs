use std::{
    collections::HashMap,
    sync::{Mutex, OnceLock},
};

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::AppError,
    models::{LoginRequest, NewUser, RegisterRequest, Role, User},
    repository::{Repository, RepositoryError, RepositoryState},
};

/// The one message every credential failure carries, so responses never reveal
/// whether the email exists.
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

const INVALID_TOKEN: &str = "Invalid or expired token";

/// Claims
///
/// The payload signed into every session token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's UUID.
    pub sub: Uuid,
    /// Expiration Time (exp): seconds since the epoch after which the token is rejected.
    pub exp: usize,
    /// Issued At (iat)
    pub iat: usize,
}

// --- Token Service ---

/// issue_token
///
/// Signs an HS256 token for `user_id` valid for `ttl_secs` seconds.
pub fn issue_token(user_id: Uuid, secret: &str, ttl_secs: u64) -> Result<String, AppError> {
    let now = Utc::now().timestamp().max(0) as usize;
    let claims = Claims {
        sub: user_id,
        iat: now,
        exp: now.saturating_add(ttl_secs as usize),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("failed to sign token: {e}")))
}

/// verify_token
///
/// Checks the signature and expiry and returns the user id the token was issued
/// for. Every failure collapses to the same `AppError::Auth`.
pub fn verify_token(token: &str, secret: &str) -> Result<Uuid, AppError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.leeway = 0;

    match decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation) {
        Ok(data) => Ok(data.claims.sub),
        Err(e) => {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("rejected expired token"),
                other => tracing::debug!(reason = ?other, "rejected invalid token"),
            }
            Err(AppError::Auth(INVALID_TOKEN.to_string()))
        }
    }
}

// --- Password Hashing ---

pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    bcrypt::hash(password, cost).map_err(|e| AppError::Internal(format!("failed to hash password: {e}")))
}

/// verify_password
///
/// bcrypt's comparison is constant-time. A malformed stored hash counts as a
/// mismatch rather than an internal error.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// dummy_hash
///
/// A throwaway hash verified against when the email is unknown, so both login
/// failure paths cost one bcrypt verification at the configured cost. Cached
/// per cost; `None` (logged) only if bcrypt rejects the cost.
pub fn dummy_hash(cost: u32) -> Option<String> {
    static DUMMIES: OnceLock<Mutex<HashMap<u32, String>>> = OnceLock::new();

    let mut cache = DUMMIES
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    if let Some(hash) = cache.get(&cost) {
        return Some(hash.clone());
    }

    match bcrypt::hash("address-book-timing-equalizer", cost) {
        Ok(hash) => {
            cache.insert(cost, hash.clone());
            Some(hash)
        }
        Err(e) => {
            tracing::error!(error = %e, cost, "failed to build the login timing hash");
            None
        }
    }
}

// --- Credential Service ---

/// register
///
/// Creates an account from an already validated request and signs its first
/// token. A duplicate email is a validation failure; requesting the admin role
/// when the configuration forbids it is `Forbidden`.
pub async fn register(
    repo: &dyn Repository,
    config: &AppConfig,
    req: RegisterRequest,
) -> Result<(User, String), AppError> {
    let role = req.role.unwrap_or_default();
    if role.is_admin() && !config.allow_admin_signup {
        return Err(AppError::Forbidden(
            "Admin accounts cannot be self-registered".to_string(),
        ));
    }

    let password_hash = hash_password(&req.password, config.bcrypt_cost)?;

    let record = repo
        .create_user(NewUser {
            email: req.email,
            name: req.name,
            role,
            password_hash,
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => AppError::Validation("Email is already registered".to_string()),
            other => AppError::Repository(other),
        })?;

    tracing::info!(user_id = %record.id, role = %record.role, "User registered");

    let token = issue_token(record.id, &config.jwt_secret, config.token_ttl_secs)?;
    Ok((record.into(), token))
}

/// login
///
/// Unknown email and wrong password produce the identical `AppError::Auth`.
pub async fn login(
    repo: &dyn Repository,
    config: &AppConfig,
    req: LoginRequest,
) -> Result<(User, String), AppError> {
    let record = repo.find_user_by_email(&req.email).await?;

    let Some(record) = record else {
        if let Some(hash) = dummy_hash(config.bcrypt_cost) {
            let _ = verify_password(&req.password, &hash);
        }
        tracing::warn!("Login failed: unknown email");
        return Err(AppError::Auth(INVALID_CREDENTIALS.to_string()));
    };

    if !verify_password(&req.password, &record.password_hash) {
        tracing::warn!(user_id = %record.id, "Login failed: password mismatch");
        return Err(AppError::Auth(INVALID_CREDENTIALS.to_string()));
    }

    let token = issue_token(record.id, &config.jwt_secret, config.token_ttl_secs)?;
    tracing::info!(user_id = %record.id, "User logged in");
    Ok((record.into(), token))
}

// --- Request Identity ---

/// AuthUser
///
/// The resolved identity of an authenticated request. Handlers take it as an
/// argument; its presence means the token was valid and the user still exists.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// The owner id this caller acts as. An admin may substitute any user via
    /// the impersonation parameter; everyone else is pinned to their own id.
    pub fn scope(&self, requested: Option<Uuid>) -> Uuid {
        match requested {
            Some(target) if self.is_admin() => target,
            _ => self.id,
        }
    }

    /// Rejects non-admin callers with `Forbidden`.
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin access required".to_string()))
        }
    }
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        AuthUser {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

impl From<AuthUser> for User {
    fn from(user: AuthUser) -> Self {
        User {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// AuthUser Extractor Implementation
///
/// 1. Dependency Resolution: Repository and AppConfig from the application state.
/// 2. Token Extraction: `Authorization: Bearer <token>`.
/// 3. Token Verification: signature and expiry.
/// 4. DB Lookup: the user must still exist; their current role is loaded.
///
/// Rejection: `AppError::Auth` (401) on any failure. A store failure during the
/// lookup is a 500.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::Auth("Missing bearer token".to_string()))?;

        let user_id = verify_token(token, &config.jwt_secret)?;

        let user = repo.get_user(user_id).await?.ok_or_else(|| {
            tracing::debug!(%user_id, "token subject no longer exists");
            AppError::Auth(INVALID_TOKEN.to_string())
        })?;

        Ok(user.into())
    }
}
