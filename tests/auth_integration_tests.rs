use address_book::{
    AppConfig, AppError, AppState, InMemoryRepository, Repository, RepositoryState,
    auth::{self, AuthUser, Claims, INVALID_CREDENTIALS},
    models::{LoginRequest, RegisterRequest, Role},
};
use axum::{
    extract::FromRequestParts,
    http::{Request, StatusCode, header, request::Parts},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use chrono::Utc;
use std::{sync::Arc, time::SystemTime};
use uuid::Uuid;

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";

fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    }
}

fn test_state() -> AppState {
    AppState {
        repo: Arc::new(InMemoryRepository::new()) as RepositoryState,
        config: test_config(),
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Signs claims directly, bypassing `issue_token`, so tests can forge expiry.
fn create_token(user_id: Uuid, iat: u64, exp: u64, secret: &str) -> String {
    let claims = Claims {
        sub: user_id,
        iat: iat as usize,
        exp: exp as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn parts_with_auth(value: Option<&str>) -> Parts {
    let mut builder = Request::builder().uri("/api/auth/me");
    if let Some(value) = value {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(()).unwrap().into_parts().0
}

fn register_request(email: &str, role: Option<Role>) -> RegisterRequest {
    RegisterRequest {
        name: "Jane Doe".to_string(),
        email: email.to_string(),
        password: "correct-horse".to_string(),
        role,
    }
}

async fn registered_user(state: &AppState, email: &str, role: Option<Role>) -> (Uuid, String) {
    let (user, token) = auth::register(state.repo.as_ref(), &state.config, register_request(email, role))
        .await
        .expect("registration should succeed");
    (user.id, token)
}

async fn extract(state: &AppState, header_value: Option<String>) -> Result<AuthUser, AppError> {
    let mut parts = parts_with_auth(header_value.as_deref());
    AuthUser::from_request_parts(&mut parts, state).await
}

// --- Token Service ---

#[test]
fn test_issue_and_verify_token() {
    let user_id = Uuid::new_v4();
    let token = auth::issue_token(user_id, TEST_JWT_SECRET, 3600).unwrap();

    assert_eq!(auth::verify_token(&token, TEST_JWT_SECRET).unwrap(), user_id);
}

#[test]
fn test_verify_token_rejects_wrong_secret() {
    let token = auth::issue_token(Uuid::new_v4(), TEST_JWT_SECRET, 3600).unwrap();

    let err = auth::verify_token(&token, "some-other-secret").unwrap_err();
    assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
}

#[test]
fn test_verify_token_rejects_expired() {
    let now = now_secs();
    let token = create_token(Uuid::new_v4(), now - 7200, now - 60, TEST_JWT_SECRET);

    let err = auth::verify_token(&token, TEST_JWT_SECRET).unwrap_err();
    assert!(matches!(err, AppError::Auth(_)));
}

#[test]
fn test_verify_token_rejects_garbage() {
    for token in ["", "not-a-jwt", "a.b.c"] {
        assert!(
            matches!(auth::verify_token(token, TEST_JWT_SECRET), Err(AppError::Auth(_))),
            "token {token:?} should be rejected"
        );
    }
}

// --- Password Hashing ---

#[test]
fn test_password_hash_roundtrip() {
    let hash = auth::hash_password("correct-horse", 4).unwrap();

    assert_ne!(hash, "correct-horse", "the hash must never equal the plaintext");
    assert!(auth::verify_password("correct-horse", &hash));
    assert!(!auth::verify_password("wrong-horse", &hash));
}

#[test]
fn test_password_hashes_are_salted() {
    let first = auth::hash_password("correct-horse", 4).unwrap();
    let second = auth::hash_password("correct-horse", 4).unwrap();

    assert_ne!(first, second);
}

#[test]
fn test_verify_password_malformed_hash_is_mismatch() {
    assert!(!auth::verify_password("anything", "not-a-bcrypt-hash"));
}

#[test]
fn test_dummy_hash_follows_the_requested_cost() {
    let low = auth::dummy_hash(4).expect("cost 4 is valid");
    let higher = auth::dummy_hash(5).expect("cost 5 is valid");

    assert!(low.starts_with("$2b$04$"), "got {low}");
    assert!(higher.starts_with("$2b$05$"), "got {higher}");

    // Cached per cost, so repeat calls reuse the same hash.
    assert_eq!(auth::dummy_hash(4).as_deref(), Some(low.as_str()));
    assert_eq!(auth::dummy_hash(5).as_deref(), Some(higher.as_str()));
}

#[test]
fn test_dummy_hash_invalid_cost_is_none() {
    assert_eq!(auth::dummy_hash(99), None);
    assert_eq!(auth::dummy_hash(3), None);
}

// --- Credential Service ---

#[tokio::test]
async fn test_register_defaults_to_user_role_and_issues_valid_token() {
    let state = test_state();
    let (user, token) = auth::register(
        state.repo.as_ref(),
        &state.config,
        register_request("jane@example.com", None),
    )
    .await
    .unwrap();

    assert_eq!(user.role, Role::User);
    assert_eq!(user.email, "jane@example.com");
    assert_eq!(auth::verify_token(&token, TEST_JWT_SECRET).unwrap(), user.id);
}

#[tokio::test]
async fn test_register_stores_hash_not_plaintext() {
    let state = test_state();
    registered_user(&state, "jane@example.com", None).await;

    let record = state
        .repo
        .find_user_by_email("jane@example.com")
        .await
        .unwrap()
        .expect("user should be stored");
    assert_ne!(record.password_hash, "correct-horse");
    assert!(auth::verify_password("correct-horse", &record.password_hash));
}

#[tokio::test]
async fn test_register_duplicate_email_is_validation_error() {
    let state = test_state();
    registered_user(&state, "jane@example.com", None).await;

    let err = auth::register(
        state.repo.as_ref(),
        &state.config,
        register_request("jane@example.com", None),
    )
    .await
    .unwrap_err();

    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_admin_honors_config() {
    let state = test_state();
    let (user, _) = auth::register(
        state.repo.as_ref(),
        &state.config,
        register_request("root@example.com", Some(Role::Admin)),
    )
    .await
    .unwrap();
    assert_eq!(user.role, Role::Admin);

    let locked = AppConfig {
        allow_admin_signup: false,
        ..test_config()
    };
    let err = auth::register(
        state.repo.as_ref(),
        &locked,
        register_request("other@example.com", Some(Role::Admin)),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

    // A plain user signup is unaffected by the admin switch.
    assert!(
        auth::register(state.repo.as_ref(), &locked, register_request("plain@example.com", None))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_login_success_returns_same_user() {
    let state = test_state();
    let (user_id, _) = registered_user(&state, "jane@example.com", None).await;

    let (user, token) = auth::login(
        state.repo.as_ref(),
        &state.config,
        LoginRequest {
            email: "jane@example.com".to_string(),
            password: "correct-horse".to_string(),
        },
    )
    .await
    .unwrap();

    assert_eq!(user.id, user_id);
    assert_eq!(auth::verify_token(&token, TEST_JWT_SECRET).unwrap(), user_id);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let state = test_state();
    registered_user(&state, "jane@example.com", None).await;

    let wrong_password = auth::login(
        state.repo.as_ref(),
        &state.config,
        LoginRequest {
            email: "jane@example.com".to_string(),
            password: "wrong-password".to_string(),
        },
    )
    .await
    .unwrap_err();

    let unknown_email = auth::login(
        state.repo.as_ref(),
        &state.config,
        LoginRequest {
            email: "nobody@example.com".to_string(),
            password: "correct-horse".to_string(),
        },
    )
    .await
    .unwrap_err();

    assert_eq!(wrong_password.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status_code(), StatusCode::UNAUTHORIZED);

    let (a, b) = (wrong_password.to_body(), unknown_email.to_body());
    assert_eq!(a.error, b.error);
    assert_eq!(a.details, b.details);
    assert_eq!(a.details, INVALID_CREDENTIALS);
}

// --- AuthUser Extractor ---

#[tokio::test]
async fn test_auth_user_valid_token() {
    let state = test_state();
    let (user_id, token) = registered_user(&state, "jane@example.com", None).await;

    let user = extract(&state, Some(format!("Bearer {token}"))).await.unwrap();

    assert_eq!(user.id, user_id);
    assert_eq!(user.email, "jane@example.com");
    assert_eq!(user.role, Role::User);
}

#[tokio::test]
async fn test_auth_user_missing_header() {
    let state = test_state();

    let err = extract(&state, None).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_user_wrong_scheme() {
    let state = test_state();
    let (_, token) = registered_user(&state, "jane@example.com", None).await;

    let err = extract(&state, Some(format!("Basic {token}"))).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_user_expired_token() {
    let state = test_state();
    let (user_id, _) = registered_user(&state, "jane@example.com", None).await;
    let now = now_secs();
    let token = create_token(user_id, now - 3600, now - 1, TEST_JWT_SECRET);

    let err = extract(&state, Some(format!("Bearer {token}"))).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_user_forged_signature() {
    let state = test_state();
    let (user_id, _) = registered_user(&state, "jane@example.com", None).await;
    let now = now_secs();
    let token = create_token(user_id, now, now + 3600, "attacker-secret");

    let err = extract(&state, Some(format!("Bearer {token}"))).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_user_unknown_subject() {
    let state = test_state();
    let token = auth::issue_token(Uuid::new_v4(), TEST_JWT_SECRET, 3600).unwrap();

    let err = extract(&state, Some(format!("Bearer {token}"))).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
}

// --- Scoping ---

#[test]
fn test_scope_ignores_user_id_for_regular_users() {
    let caller = AuthUser {
        id: Uuid::new_v4(),
        email: "jane@example.com".to_string(),
        name: "Jane".to_string(),
        role: Role::User,
        created_at: Utc::now(),
    };
    let other = Uuid::new_v4();

    assert_eq!(caller.scope(None), caller.id);
    assert_eq!(caller.scope(Some(other)), caller.id);
    assert!(caller.require_admin().is_err());
}

#[test]
fn test_scope_honors_user_id_for_admins() {
    let admin = AuthUser {
        id: Uuid::new_v4(),
        email: "root@example.com".to_string(),
        name: "Root".to_string(),
        role: Role::Admin,
        created_at: Utc::now(),
    };
    let other = Uuid::new_v4();

    assert_eq!(admin.scope(None), admin.id);
    assert_eq!(admin.scope(Some(other)), other);
    assert!(admin.require_admin().is_ok());
}
