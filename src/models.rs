use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Identity ---

/// Role
///
/// The closed set of capabilities a user can hold. Assigned once at registration
/// and never promoted afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// User
///
/// The public view of an account. This is what every endpoint returns; the
/// password hash lives only on `UserRecord` and never crosses the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// UserRecord
///
/// The stored credential row, including the bcrypt hash.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            created_at: self.created_at,
        }
    }
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        User {
            id: record.id,
            email: record.email,
            name: record.name,
            role: record.role,
            created_at: record.created_at,
        }
    }
}

/// NewUser
///
/// Everything the credential store needs to insert an account. The email is
/// already normalized and the password already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub password_hash: String,
}

// --- Addresses ---

/// Address
///
/// A postal address owned by exactly one user. `user_id` is set on creation and
/// never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Address {
    pub id: Uuid,
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub user_id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// AddressOwner
///
/// The owner summary attached to addresses in the admin-wide listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AddressOwner {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// AddressWithOwner
///
/// Output of `GET /api/addresses/all`: the address fields plus an `owner` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AddressWithOwner {
    #[serde(flatten)]
    pub address: Address,
    pub owner: AddressOwner,
}

// --- Request Payloads (Input Schemas) ---

/// CreateAddressRequest
///
/// Input payload for `POST /api/addresses`. Any `userId` sent by the client is
/// dropped during deserialization; the owner always comes from the token.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateAddressRequest {
    #[schema(example = "1 Main St")]
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

/// UpdateAddressRequest
///
/// Partial update payload for `PUT /api/addresses/{id}`. Only the fields that are
/// `Some` are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateAddressRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl UpdateAddressRequest {
    /// Writes the supplied fields onto `address`, leaving the rest untouched.
    pub fn apply_to(self, address: &mut Address) {
        if let Some(street) = self.street {
            address.street = street;
        }
        if let Some(city) = self.city {
            address.city = city;
        }
        if let Some(state) = self.state {
            address.state = state;
        }
        if let Some(postal_code) = self.postal_code {
            address.postal_code = postal_code;
        }
        if let Some(country) = self.country {
            address.country = country;
        }
    }
}

/// RegisterRequest
///
/// Input payload for `POST /api/auth/register`. `role` is optional and defaults
/// to `user`; whether `admin` is accepted depends on configuration.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    pub name: String,
    #[schema(example = "jane@example.com")]
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// LoginRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// --- Responses (Output Schemas) ---

/// AuthResponse
///
/// Returned by register and login: the account and a freshly minted session token.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

/// MessageResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

/// ErrorResponse
///
/// The JSON body of every failed request.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorResponse {
    pub error: String,
    pub details: String,
}
