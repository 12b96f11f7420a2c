use reqwest::{Method, RequestBuilder, Response};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use super::ClientError;
use crate::models::{
    Address, AddressWithOwner, AuthResponse, CreateAddressRequest, ErrorResponse, LoginRequest,
    MessageResponse, RegisterRequest, UpdateAddressRequest, User,
};

/// Session
///
/// The bearer token a request runs as. Passed explicitly to every protected call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

/// ApiClient
///
/// Thin typed wrapper over the REST surface. Cheap to clone; the underlying
/// `reqwest::Client` pools connections.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// `base_url` is the server root, e.g. `http://localhost:3000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, session: Option<&Session>) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match session {
            Some(session) => builder.bearer_auth(session.token()),
            None => builder,
        }
    }

    // --- Auth ---

    pub async fn register(&self, req: &RegisterRequest) -> Result<AuthResponse, ClientError> {
        send_json(self.request(Method::POST, "/api/auth/register", None), req).await
    }

    pub async fn login(&self, req: &LoginRequest) -> Result<AuthResponse, ClientError> {
        send_json(self.request(Method::POST, "/api/auth/login", None), req).await
    }

    pub async fn me(&self, session: &Session) -> Result<User, ClientError> {
        decode(self.request(Method::GET, "/api/auth/me", Some(session)).send().await?).await
    }

    // --- Addresses ---

    /// `user_id` is the admin impersonation parameter; the server ignores it for
    /// regular users.
    pub async fn list_addresses(&self, session: &Session, user_id: Option<Uuid>) -> Result<Vec<Address>, ClientError> {
        let builder = self.request(Method::GET, "/api/addresses", Some(session));
        decode(as_user(builder, user_id).send().await?).await
    }

    pub async fn create_address(&self, session: &Session, req: &CreateAddressRequest) -> Result<Address, ClientError> {
        send_json(self.request(Method::POST, "/api/addresses", Some(session)), req).await
    }

    /// `user_id` scopes the update to another owner's address, for admins.
    pub async fn update_address(
        &self,
        session: &Session,
        id: Uuid,
        req: &UpdateAddressRequest,
        user_id: Option<Uuid>,
    ) -> Result<Address, ClientError> {
        let path = format!("/api/addresses/{id}");
        send_json(as_user(self.request(Method::PUT, &path, Some(session)), user_id), req).await
    }

    pub async fn delete_address(
        &self,
        session: &Session,
        id: Uuid,
        user_id: Option<Uuid>,
    ) -> Result<MessageResponse, ClientError> {
        let path = format!("/api/addresses/{id}");
        let builder = as_user(self.request(Method::DELETE, &path, Some(session)), user_id);
        decode(builder.send().await?).await
    }

    // --- Admin ---

    pub async fn list_all_addresses(&self, session: &Session) -> Result<Vec<AddressWithOwner>, ClientError> {
        decode(self.request(Method::GET, "/api/addresses/all", Some(session)).send().await?).await
    }

    pub async fn list_user_addresses(&self, session: &Session, user_id: Uuid) -> Result<Vec<Address>, ClientError> {
        let path = format!("/api/admin/users/{user_id}/addresses");
        decode(self.request(Method::GET, &path, Some(session)).send().await?).await
    }
}

fn as_user(builder: RequestBuilder, user_id: Option<Uuid>) -> RequestBuilder {
    match user_id {
        Some(user_id) => builder.query(&[("userId", user_id)]),
        None => builder,
    }
}

async fn send_json<B, T>(builder: RequestBuilder, body: &B) -> Result<T, ClientError>
where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
{
    decode(builder.json(body).send().await?).await
}

/// Decodes a success body as `T`, or turns an error status into `ClientError::Api`.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let text = response.text().await.unwrap_or_default();
    let (error, details) = match serde_json::from_str::<ErrorResponse>(&text) {
        Ok(body) => (body.error, body.details),
        Err(_) => (
            status.canonical_reason().unwrap_or("Request failed").to_string(),
            text,
        ),
    };

    tracing::debug!(status = status.as_u16(), %error, "API request failed");
    Err(ClientError::Api {
        status: status.as_u16(),
        error,
        details,
    })
}
