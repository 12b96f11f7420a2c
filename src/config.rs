use axum::http::HeaderValue;
use std::env;
use thiserror::Error;

/// Fallback signing secret for local runs. Never accepted in production.
pub const LOCAL_JWT_SECRET: &str = "address-book-local-development-secret";

/// Default session lifetime: seven days.
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 7 * 24 * 60 * 60;

pub const DEFAULT_PORT: u16 = 3000;

/// ConfigError
///
/// Raised by `AppConfig::load` when a required variable is missing or a value
/// does not parse.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded and
/// pulled into handlers and the auth extractor via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and secure defaults.
    pub env: Env,
    // Postgres connection string. `None` selects the in-memory store (local only).
    pub db_url: Option<String>,
    // HMAC secret used to sign and verify session tokens.
    pub jwt_secret: String,
    pub port: u16,
    // Lifetime of a freshly issued session token.
    pub token_ttl_secs: u64,
    // bcrypt work factor for new password hashes.
    pub bcrypt_cost: u32,
    // Whether `role: "admin"` is honored on self-registration.
    pub allow_admin_signup: bool,
    // Allowed browser origin. `None` allows any origin.
    pub cors_origin: Option<HeaderValue>,
}

/// Env
///
/// Defines the runtime context: developer-friendly defaults locally, hardened
/// requirements in production.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// default
    ///
    /// A non-panicking configuration for tests: in-memory store, a fixed secret,
    /// and the cheapest bcrypt cost so hashing does not dominate test time.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            port: DEFAULT_PORT,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            bcrypt_cost: 4,
            allow_admin_signup: true,
            cors_origin: None,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from the environment. Production refuses to start
    /// without `DATABASE_URL` and `JWT_SECRET`; local mode falls back to the
    /// in-memory store and a development secret.
    ///
    /// # Errors
    /// `ConfigError::Missing` for an absent production secret,
    /// `ConfigError::Invalid` for a value that does not parse.
    pub fn load() -> Result<Self, ConfigError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let db_url = env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.is_empty() && url != "memory");

        let jwt_secret = env::var("JWT_SECRET").ok().filter(|s| !s.is_empty());

        let (db_url, jwt_secret) = match env {
            Env::Production => (
                Some(db_url.ok_or(ConfigError::Missing("DATABASE_URL"))?),
                jwt_secret.ok_or(ConfigError::Missing("JWT_SECRET"))?,
            ),
            Env::Local => (
                db_url,
                jwt_secret.unwrap_or_else(|| LOCAL_JWT_SECRET.to_string()),
            ),
        };

        Ok(Self {
            env,
            db_url,
            jwt_secret,
            port: parse_var("PORT", DEFAULT_PORT)?,
            token_ttl_secs: parse_var("TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL_SECS)?,
            bcrypt_cost: parse_bcrypt_cost()?,
            allow_admin_signup: parse_var("ALLOW_ADMIN_SIGNUP", env == Env::Local)?,
            cors_origin: env::var("CORS_ORIGIN")
                .ok()
                .filter(|o| !o.trim().is_empty())
                .map(parse_origin)
                .transpose()?,
        })
    }
}

/// bcrypt accepts work factors 4 through 31; anything else would only fail at
/// the first registration.
fn parse_bcrypt_cost() -> Result<u32, ConfigError> {
    let cost = parse_var("BCRYPT_COST", bcrypt::DEFAULT_COST)?;
    if (4..=31).contains(&cost) {
        Ok(cost)
    } else {
        Err(ConfigError::Invalid {
            name: "BCRYPT_COST",
            value: cost.to_string(),
        })
    }
}

/// An origin is `scheme://host[:port]` with no path, not even a trailing slash,
/// since that is exactly what browsers send and `AllowOrigin::exact` compares.
fn parse_origin(value: String) -> Result<HeaderValue, ConfigError> {
    let origin = value.trim();
    let well_formed = (origin.starts_with("http://") || origin.starts_with("https://"))
        && !origin.ends_with('/')
        && origin.matches('/').count() == 2
        && !origin.contains(char::is_whitespace);

    match HeaderValue::from_str(origin) {
        Ok(header) if well_formed => Ok(header),
        _ => Err(ConfigError::Invalid {
            name: "CORS_ORIGIN",
            value,
        }),
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}
