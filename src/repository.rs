use crate::models::{
    Address, AddressOwner, AddressWithOwner, CreateAddressRequest, NewUser, Role, UpdateAddressRequest,
    User, UserRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// RepositoryError
///
/// Failures surfaced by the persistence layer. Handlers convert these into
/// `AppError` with `?`.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A uniqueness constraint rejected the write (duplicate email).
    #[error("conflict: {0}")]
    Conflict(String),

    /// An address referenced a user that does not exist.
    #[error("owner {0} does not exist")]
    UnknownOwner(Uuid),

    /// A stored row could not be mapped back into a model.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// The database driver failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository Trait
///
/// The abstract contract for every persistence operation. Handlers and the auth
/// extractor only ever see `Arc<dyn Repository>`, so Postgres and the in-memory
/// store are interchangeable.
///
/// Address operations that take an `owner` only ever touch rows whose `user_id`
/// equals it. Deciding which owner a caller may act as is the handler's job.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Credentials ---
    /// Inserts a new account. Returns `Conflict` when the email is taken.
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, RepositoryError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepositoryError>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;

    // --- Addresses (owner-scoped) ---
    async fn create_address(&self, owner: Uuid, req: CreateAddressRequest) -> Result<Address, RepositoryError>;
    async fn list_addresses(&self, owner: Uuid) -> Result<Vec<Address>, RepositoryError>;
    /// Returns `None` when no address matches both `id` and `owner`.
    async fn update_address(
        &self,
        id: Uuid,
        owner: Uuid,
        req: UpdateAddressRequest,
    ) -> Result<Option<Address>, RepositoryError>;
    /// Returns `false` when no address matches both `id` and `owner`.
    async fn delete_address(&self, id: Uuid, owner: Uuid) -> Result<bool, RepositoryError>;

    // --- Admin ---
    /// Every address in the store, joined with its owner.
    async fn list_all_addresses(&self) -> Result<Vec<AddressWithOwner>, RepositoryError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL. Schema lives in
/// `migrations/` and is applied by `PostgresRepository::migrate`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

// Roles are stored as TEXT, so rows are decoded into these private shapes first.

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    name: String,
    role: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row.role.parse::<Role>().map_err(RepositoryError::Corrupt)?;
        Ok(UserRecord {
            id: row.id,
            email: row.email,
            name: row.name,
            role,
            password_hash: row.password_hash,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct AddressOwnerRow {
    #[sqlx(flatten)]
    address: Address,
    owner_name: String,
    owner_email: String,
}

impl From<AddressOwnerRow> for AddressWithOwner {
    fn from(row: AddressOwnerRow) -> Self {
        AddressWithOwner {
            owner: AddressOwner {
                id: row.address.user_id,
                name: row.owner_name,
                email: row.owner_email,
            },
            address: row.address,
        }
    }
}

const USER_COLUMNS: &str = "id, email, name, role, password_hash, created_at";
const ADDRESS_COLUMNS: &str =
    "id, street, city, state, postal_code, country, user_id, created_at, updated_at";

#[async_trait]
impl Repository for PostgresRepository {
    /// create_user
    ///
    /// Relies on the `UNIQUE` constraint on `users.email`; a violation becomes
    /// `RepositoryError::Conflict` rather than a generic database error.
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, RepositoryError> {
        let sql = format!(
            "INSERT INTO users (id, email, name, role, password_hash, created_at) \
             VALUES ($1, $2, $3, $4, $5, NOW()) RETURNING {USER_COLUMNS}"
        );

        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.email)
            .bind(&user.name)
            .bind(user.role.as_str())
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    RepositoryError::Conflict(format!("email '{}' is already registered", user.email))
                }
                other => RepositoryError::Database(other),
            })?;

        row.try_into()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(UserRecord::try_from)
            .transpose()
    }

    /// get_user
    ///
    /// Used by the auth extractor on every protected request.
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let record = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(UserRecord::try_from)
            .transpose()?;
        Ok(record.map(User::from))
    }

    async fn create_address(&self, owner: Uuid, req: CreateAddressRequest) -> Result<Address, RepositoryError> {
        let sql = format!(
            "INSERT INTO addresses (id, user_id, street, city, state, postal_code, country, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW()) RETURNING {ADDRESS_COLUMNS}"
        );

        let address = sqlx::query_as::<_, Address>(&sql)
            .bind(Uuid::new_v4())
            .bind(owner)
            .bind(req.street)
            .bind(req.city)
            .bind(req.state)
            .bind(req.postal_code)
            .bind(req.country)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => RepositoryError::UnknownOwner(owner),
                other => RepositoryError::Database(other),
            })?;
        Ok(address)
    }

    async fn list_addresses(&self, owner: Uuid) -> Result<Vec<Address>, RepositoryError> {
        let sql = format!("SELECT {ADDRESS_COLUMNS} FROM addresses WHERE user_id = $1 ORDER BY created_at ASC");
        let addresses = sqlx::query_as::<_, Address>(&sql)
            .bind(owner)
            .fetch_all(&self.pool)
            .await?;
        Ok(addresses)
    }

    /// update_address
    ///
    /// Uses `COALESCE` so that only the `Some` fields of `req` overwrite columns.
    /// The `user_id = $2` predicate is the ownership check.
    async fn update_address(
        &self,
        id: Uuid,
        owner: Uuid,
        req: UpdateAddressRequest,
    ) -> Result<Option<Address>, RepositoryError> {
        let sql = format!(
            r#"
            UPDATE addresses
            SET street = COALESCE($3, street),
                city = COALESCE($4, city),
                state = COALESCE($5, state),
                postal_code = COALESCE($6, postal_code),
                country = COALESCE($7, country),
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {ADDRESS_COLUMNS}
            "#
        );

        let address = sqlx::query_as::<_, Address>(&sql)
            .bind(id)
            .bind(owner)
            .bind(req.street)
            .bind(req.city)
            .bind(req.state)
            .bind(req.postal_code)
            .bind(req.country)
            .fetch_optional(&self.pool)
            .await?;
        Ok(address)
    }

    async fn delete_address(&self, id: Uuid, owner: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM addresses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_all_addresses(&self) -> Result<Vec<AddressWithOwner>, RepositoryError> {
        let rows = sqlx::query_as::<_, AddressOwnerRow>(
            r#"
            SELECT a.id, a.street, a.city, a.state, a.postal_code, a.country,
                   a.user_id, a.created_at, a.updated_at,
                   u.name AS owner_name, u.email AS owner_email
            FROM addresses a
            JOIN users u ON a.user_id = u.id
            ORDER BY a.created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AddressWithOwner::from).collect())
    }
}
