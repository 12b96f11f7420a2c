use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts, Path, Query, Request,
        rejection::PathRejection,
    },
    http::request::Parts,
};
use serde::de::DeserializeOwned;

use crate::{
    error::AppError,
    models::{CreateAddressRequest, LoginRequest, RegisterRequest, UpdateAddressRequest},
};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Validate
///
/// Input rules applied by the router before a handler runs. `validate` consumes
/// the payload and returns it normalized (trimmed, lower-cased email), so the
/// handler only ever sees clean values.
pub trait Validate: Sized {
    fn validate(self) -> Result<Self, AppError>;
}

/// ValidatedJson
///
/// A `Json` extractor that also runs `Validate`. Body parse failures (bad JSON,
/// missing fields, wrong types) are reported as `AppError::Validation` too, so
/// every input problem is a 400 with the standard error body.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(payload) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;

        payload.validate().map(ValidatedJson)
    }
}

/// ValidatedPath
///
/// A `Path` extractor whose rejection is an `AppError`. Path segments here are
/// record ids, so a segment that does not parse names a record that cannot
/// exist and is reported as `NotFound` rather than a 400.
#[derive(Debug, Clone)]
pub struct ValidatedPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidatedPath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(ValidatedPath(value)),
            Err(PathRejection::FailedToDeserializePathParams(e)) => {
                tracing::debug!(reason = %e.body_text(), "unparseable path id");
                Err(AppError::NotFound("No record matches that id".to_string()))
            }
            Err(other) => Err(AppError::Internal(other.body_text())),
        }
    }
}

/// ValidatedQuery
///
/// A `Query` extractor whose rejection is `AppError::Validation`, so a bad query
/// string gets the standard JSON error body.
#[derive(Debug, Clone, Default)]
pub struct ValidatedQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidatedQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        Ok(ValidatedQuery(value))
    }
}

/// Trims `value` and rejects it if nothing is left.
fn required(field: &str, value: String) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn optional(field: &str, value: Option<String>) -> Result<Option<String>, AppError> {
    value.map(|v| required(field, v)).transpose()
}

/// normalize_email
///
/// Lower-cases and trims, then checks for a plausible `local@domain.tld` shape.
pub fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    let invalid = || AppError::Validation("A valid email address is required".to_string());

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    let domain_ok = domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains('@');

    if local.is_empty() || !domain_ok || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    Ok(email)
}

impl Validate for CreateAddressRequest {
    fn validate(self) -> Result<Self, AppError> {
        Ok(Self {
            street: required("street", self.street)?,
            city: required("city", self.city)?,
            state: required("state", self.state)?,
            postal_code: required("postalCode", self.postal_code)?,
            country: required("country", self.country)?,
        })
    }
}

impl Validate for UpdateAddressRequest {
    fn validate(self) -> Result<Self, AppError> {
        Ok(Self {
            street: optional("street", self.street)?,
            city: optional("city", self.city)?,
            state: optional("state", self.state)?,
            postal_code: optional("postalCode", self.postal_code)?,
            country: optional("country", self.country)?,
        })
    }
}

impl Validate for RegisterRequest {
    fn validate(self) -> Result<Self, AppError> {
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AppError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        Ok(Self {
            name: required("name", self.name)?,
            email: normalize_email(&self.email)?,
            password: self.password,
            role: self.role,
        })
    }
}

impl Validate for LoginRequest {
    /// Only the shape is checked here. A syntactically odd email is still looked
    /// up so that it fails with the same 401 as an unknown one.
    fn validate(self) -> Result<Self, AppError> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(AppError::Validation("Email and password are required".to_string()));
        }

        Ok(Self {
            email: self.email.trim().to_lowercase(),
            password: self.password,
        })
    }
}
