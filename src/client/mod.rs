//! Client side of the address book.
//!
//! `ApiClient` speaks the REST surface; `AuthStore` and `AddressStore` mirror
//! server state and change only after a successful round trip; `guard` decides
//! whether a navigation may proceed. There is no global session: every address
//! call takes the `Session` it should run as.

pub mod api;
pub mod guard;
pub mod storage;
pub mod stores;

pub use api::{ApiClient, Session};
pub use guard::{Navigation, Route, RouteMeta, before_each, guard};
pub use storage::{FileTokenStorage, MemoryTokenStorage, TokenStorage};
pub use stores::{AddressStore, AuthStore, RegisterCredentials};

use thiserror::Error;

/// ClientError
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a response, or the body did not decode.
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status and an error body.
    #[error("request failed with {status}: {error} ({details})")]
    Api {
        status: u16,
        error: String,
        details: String,
    },

    /// An operation needed a session and the store has none.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Registration was attempted with a confirmation that does not match.
    #[error("passwords do not match")]
    PasswordMismatch,
}

impl ClientError {
    /// The HTTP status for server-reported failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
