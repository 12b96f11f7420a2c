use address_book::{
    InMemoryRepository,
    models::{CreateAddressRequest, NewUser, Role, UpdateAddressRequest, UserRecord},
    repository::{PostgresRepository, Repository, RepositoryError},
};
use sqlx::PgPool;
use tokio::test;
use uuid::Uuid;

// --- Test Context and Setup ---

/// Holds the database pool for the Postgres-backed tests.
struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        let ctx = DbTestContext { pool };
        ctx.repository()
            .migrate()
            .await
            .expect("Failed to run database migrations.");
        ctx
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

/// A unique email per call, so Postgres runs never collide with earlier data.
fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@test.com", Uuid::new_v4().simple())
}

async fn create_test_user(repo: &dyn Repository, prefix: &str, role: Role) -> UserRecord {
    repo.create_user(NewUser {
        email: unique_email(prefix),
        name: prefix.to_string(),
        role,
        password_hash: "$2b$04$not-a-real-hash".to_string(),
    })
    .await
    .expect("Failed to create test user")
}

fn address(street: &str) -> CreateAddressRequest {
    CreateAddressRequest {
        street: street.to_string(),
        city: "Springfield".to_string(),
        state: "IL".to_string(),
        postal_code: "62701".to_string(),
        country: "USA".to_string(),
    }
}

// --- Shared Contract ---
//
// Both stores must behave identically; each check below runs against the
// in-memory store always and against Postgres when a database is available.

async fn check_user_lifecycle(repo: &dyn Repository) {
    let created = create_test_user(repo, "alice", Role::Admin).await;
    assert_eq!(created.role, Role::Admin);

    let by_email = repo
        .find_user_by_email(&created.email)
        .await
        .unwrap()
        .expect("user should be found by email");
    assert_eq!(by_email.id, created.id);
    assert_eq!(by_email.password_hash, created.password_hash);

    let by_id = repo.get_user(created.id).await.unwrap().expect("user should be found by id");
    assert_eq!(by_id, created.to_user());

    assert!(repo.get_user(Uuid::new_v4()).await.unwrap().is_none());
    assert!(repo.find_user_by_email("missing@test.com").await.unwrap().is_none());
}

async fn check_duplicate_email(repo: &dyn Repository) {
    let first = create_test_user(repo, "dup", Role::User).await;

    let err = repo
        .create_user(NewUser {
            email: first.email.clone(),
            name: "Someone Else".to_string(),
            role: Role::User,
            password_hash: "hash".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, RepositoryError::Conflict(_)), "got {err:?}");
}

async fn check_address_ownership(repo: &dyn Repository) {
    let alice = create_test_user(repo, "alice", Role::User).await;
    let bob = create_test_user(repo, "bob", Role::User).await;

    let first = repo.create_address(alice.id, address("1 Main St")).await.unwrap();
    let second = repo.create_address(alice.id, address("2 Main St")).await.unwrap();
    let bobs = repo.create_address(bob.id, address("9 Oak Ave")).await.unwrap();
    assert_eq!(first.user_id, alice.id);

    // Listing is scoped and ordered by creation.
    let listed = repo.list_addresses(alice.id).await.unwrap();
    assert_eq!(
        listed.iter().map(|a| a.id).collect::<Vec<_>>(),
        vec![first.id, second.id]
    );

    // Bob cannot update or delete Alice's address.
    let update = UpdateAddressRequest {
        city: Some("Shelbyville".to_string()),
        ..UpdateAddressRequest::default()
    };
    assert!(repo.update_address(first.id, bob.id, update.clone()).await.unwrap().is_none());
    assert!(!repo.delete_address(first.id, bob.id).await.unwrap());

    // Alice can.
    let updated = repo
        .update_address(first.id, alice.id, update)
        .await
        .unwrap()
        .expect("owner update should match");
    assert_eq!(updated.city, "Shelbyville");
    assert_eq!(updated.street, "1 Main St");
    assert_eq!(updated.user_id, alice.id);
    assert!(updated.updated_at >= first.updated_at);

    assert!(repo.delete_address(first.id, alice.id).await.unwrap());
    assert!(!repo.delete_address(first.id, alice.id).await.unwrap());

    let remaining = repo.list_addresses(alice.id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(repo.list_addresses(bob.id).await.unwrap(), vec![bobs]);
}

async fn check_unknown_owner(repo: &dyn Repository) {
    let ghost = Uuid::new_v4();

    let err = repo.create_address(ghost, address("Nowhere")).await.unwrap_err();

    assert!(matches!(err, RepositoryError::UnknownOwner(id) if id == ghost), "got {err:?}");
}

async fn check_list_all_joins_owner(repo: &dyn Repository) {
    let alice = create_test_user(repo, "alice", Role::User).await;
    let bob = create_test_user(repo, "bob", Role::User).await;
    let a = repo.create_address(alice.id, address("1 Main St")).await.unwrap();
    let b = repo.create_address(bob.id, address("9 Oak Ave")).await.unwrap();

    let all = repo.list_all_addresses().await.unwrap();

    for (created, owner) in [(&a, &alice), (&b, &bob)] {
        let entry = all
            .iter()
            .find(|e| e.address.id == created.id)
            .expect("address should appear in the full listing");
        assert_eq!(&entry.address, created);
        assert_eq!(entry.owner.id, owner.id);
        assert_eq!(entry.owner.email, owner.email);
        assert_eq!(entry.owner.name, owner.name);
    }
}

// --- In-memory store ---

#[test]
async fn test_memory_user_lifecycle() {
    check_user_lifecycle(&InMemoryRepository::new()).await;
}

#[test]
async fn test_memory_duplicate_email() {
    check_duplicate_email(&InMemoryRepository::new()).await;
}

#[test]
async fn test_memory_address_ownership() {
    check_address_ownership(&InMemoryRepository::new()).await;
}

#[test]
async fn test_memory_unknown_owner() {
    let repo = InMemoryRepository::new();
    check_unknown_owner(&repo).await;
    assert_eq!(repo.address_count().await, 0);
}

#[test]
async fn test_memory_list_all_joins_owner() {
    let repo = InMemoryRepository::new();
    check_list_all_joins_owner(&repo).await;
    assert_eq!(repo.list_all_addresses().await.unwrap().len(), 2);
}

// --- Postgres (needs DATABASE_URL; run with `cargo test -- --ignored`) ---

#[test]
#[ignore]
async fn test_postgres_user_lifecycle() {
    let ctx = DbTestContext::setup().await;
    check_user_lifecycle(&ctx.repository()).await;
}

#[test]
#[ignore]
async fn test_postgres_duplicate_email() {
    let ctx = DbTestContext::setup().await;
    check_duplicate_email(&ctx.repository()).await;
}

#[test]
#[ignore]
async fn test_postgres_address_ownership() {
    let ctx = DbTestContext::setup().await;
    check_address_ownership(&ctx.repository()).await;
}

#[test]
#[ignore]
async fn test_postgres_unknown_owner() {
    let ctx = DbTestContext::setup().await;
    check_unknown_owner(&ctx.repository()).await;
}

#[test]
#[ignore]
async fn test_postgres_list_all_joins_owner() {
    let ctx = DbTestContext::setup().await;
    check_list_all_joins_owner(&ctx.repository()).await;
}

#[test]
#[ignore]
async fn test_postgres_cascade_removes_addresses() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let user = create_test_user(&repo, "cascade", Role::User).await;
    repo.create_address(user.id, address("1 Main St")).await.unwrap();

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user.id)
        .execute(&ctx.pool)
        .await
        .unwrap();

    assert!(repo.list_addresses(user.id).await.unwrap().is_empty());
}
