use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    Address, AddressOwner, AddressWithOwner, CreateAddressRequest, NewUser, UpdateAddressRequest, User,
    UserRecord,
};
use crate::repository::{Repository, RepositoryError};

/// InMemoryRepository
///
/// A `Repository` held entirely in process memory. Used for local runs without
/// a database and as the backing store in tests. Addresses keep insertion
/// order, matching the `ORDER BY created_at` of the Postgres implementation.
#[derive(Default)]
pub struct InMemoryRepository {
    users: RwLock<HashMap<Uuid, UserRecord>>,
    addresses: RwLock<Vec<Address>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored addresses across all owners.
    pub async fn address_count(&self) -> usize {
        self.addresses.read().await.len()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, RepositoryError> {
        let mut users = self.users.write().await;
        if users.values().any(|existing| existing.email == user.email) {
            return Err(RepositoryError::Conflict(format!(
                "email '{}' is already registered",
                user.email
            )));
        }

        let record = UserRecord {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            role: user.role,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.values().find(|user| user.email == email).cloned())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.get(&id).map(UserRecord::to_user))
    }

    async fn create_address(&self, owner: Uuid, req: CreateAddressRequest) -> Result<Address, RepositoryError> {
        if !self.users.read().await.contains_key(&owner) {
            return Err(RepositoryError::UnknownOwner(owner));
        }

        let now = Utc::now();
        let address = Address {
            id: Uuid::new_v4(),
            street: req.street,
            city: req.city,
            state: req.state,
            postal_code: req.postal_code,
            country: req.country,
            user_id: owner,
            created_at: now,
            updated_at: now,
        };
        self.addresses.write().await.push(address.clone());
        Ok(address)
    }

    async fn list_addresses(&self, owner: Uuid) -> Result<Vec<Address>, RepositoryError> {
        let addresses = self.addresses.read().await;
        Ok(addresses.iter().filter(|a| a.user_id == owner).cloned().collect())
    }

    async fn update_address(
        &self,
        id: Uuid,
        owner: Uuid,
        req: UpdateAddressRequest,
    ) -> Result<Option<Address>, RepositoryError> {
        let mut addresses = self.addresses.write().await;
        let Some(address) = addresses.iter_mut().find(|a| a.id == id && a.user_id == owner) else {
            return Ok(None);
        };

        req.apply_to(address);
        address.updated_at = Utc::now();
        Ok(Some(address.clone()))
    }

    async fn delete_address(&self, id: Uuid, owner: Uuid) -> Result<bool, RepositoryError> {
        let mut addresses = self.addresses.write().await;
        let before = addresses.len();
        addresses.retain(|a| !(a.id == id && a.user_id == owner));
        Ok(addresses.len() < before)
    }

    async fn list_all_addresses(&self) -> Result<Vec<AddressWithOwner>, RepositoryError> {
        let users = self.users.read().await;
        let addresses = self.addresses.read().await;

        addresses
            .iter()
            .map(|address| {
                let owner = users.get(&address.user_id).ok_or_else(|| {
                    RepositoryError::Corrupt(format!("address {} has no owner", address.id))
                })?;
                Ok(AddressWithOwner {
                    address: address.clone(),
                    owner: AddressOwner {
                        id: owner.id,
                        name: owner.name.clone(),
                        email: owner.email.clone(),
                    },
                })
            })
            .collect()
    }
}
