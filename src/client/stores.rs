use uuid::Uuid;

use super::{ApiClient, ClientError, Session, TokenStorage};
use crate::models::{Address, CreateAddressRequest, LoginRequest, RegisterRequest, UpdateAddressRequest, User};

/// RegisterCredentials
///
/// What the registration form collects. The confirmation is checked locally
/// and never sent.
#[derive(Debug, Clone)]
pub struct RegisterCredentials {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// AuthStore
///
/// Mirrors the signed-in user and their session. Every method that talks to the
/// server leaves the cached state untouched when the call fails.
pub struct AuthStore<S: TokenStorage> {
    api: ApiClient,
    storage: S,
    user: Option<User>,
    session: Option<Session>,
}

impl<S: TokenStorage> AuthStore<S> {
    pub fn new(api: ApiClient, storage: S) -> Self {
        Self {
            api,
            storage,
            user: None,
            session: None,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// The current session, or `NotAuthenticated`.
    pub fn require_session(&self) -> Result<&Session, ClientError> {
        self.session.as_ref().ok_or(ClientError::NotAuthenticated)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.role.is_admin())
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<&User, ClientError> {
        let response = self
            .api
            .login(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .await?;

        Ok(self.sign_in(response.user, response.token))
    }

    pub async fn register(&mut self, credentials: RegisterCredentials) -> Result<&User, ClientError> {
        if credentials.password != credentials.confirm_password {
            return Err(ClientError::PasswordMismatch);
        }

        let response = self
            .api
            .register(&RegisterRequest {
                name: credentials.name,
                email: credentials.email,
                password: credentials.password,
                role: None,
            })
            .await?;

        Ok(self.sign_in(response.user, response.token))
    }

    /// Drops the cached user and session and forgets the persisted token.
    pub fn logout(&mut self) {
        self.user = None;
        self.session = None;
        if let Err(e) = self.storage.clear() {
            tracing::warn!(error = %e, "failed to clear persisted token");
        }
    }

    /// check_auth
    ///
    /// Restores the session from persisted storage and re-fetches the user. A
    /// token the server no longer accepts logs the store out. With nothing
    /// persisted, the cached state is left as it is.
    pub async fn check_auth(&mut self) -> Option<&User> {
        let token = self.storage.load()?;
        let session = Session::new(token);

        match self.api.me(&session).await {
            Ok(user) => {
                self.session = Some(session);
                self.user = Some(user);
            }
            Err(e) => {
                tracing::debug!(error = %e, "persisted session rejected");
                self.logout();
            }
        }
        self.user.as_ref()
    }

    fn sign_in(&mut self, user: User, token: String) -> &User {
        if let Err(e) = self.storage.store(&token) {
            tracing::warn!(error = %e, "failed to persist token");
        }
        self.session = Some(Session::new(token));
        self.user.insert(user)
    }
}

/// AddressStore
///
/// Mirrors the address collection visible to a session.
#[derive(Debug)]
pub struct AddressStore {
    api: ApiClient,
    addresses: Vec<Address>,
}

impl AddressStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            addresses: Vec::new(),
        }
    }

    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    /// Replaces the cache with the server's list.
    pub async fn fetch_addresses(&mut self, session: &Session) -> Result<&[Address], ClientError> {
        self.addresses = self.api.list_addresses(session, None).await?;
        Ok(&self.addresses)
    }

    pub async fn create_address(&mut self, session: &Session, req: &CreateAddressRequest) -> Result<Address, ClientError> {
        let address = self.api.create_address(session, req).await?;
        self.addresses.push(address.clone());
        Ok(address)
    }

    /// Replaces the cached copy in place; an address not in the cache is not added.
    pub async fn update_address(
        &mut self,
        session: &Session,
        id: Uuid,
        req: &UpdateAddressRequest,
    ) -> Result<Address, ClientError> {
        let address = self.api.update_address(session, id, req, None).await?;
        if let Some(cached) = self.addresses.iter_mut().find(|a| a.id == id) {
            *cached = address.clone();
        }
        Ok(address)
    }

    pub async fn delete_address(&mut self, session: &Session, id: Uuid) -> Result<(), ClientError> {
        self.api.delete_address(session, id, None).await?;
        self.addresses.retain(|a| a.id != id);
        Ok(())
    }
}
