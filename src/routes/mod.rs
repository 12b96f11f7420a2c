//! Router Module Index
//!
//! Routing split by access level. Access control is attached per module in
//! `create_router`, so a route's file states who may reach it.

/// Routes open to anonymous clients: health and the credential endpoints.
pub mod public;

/// Routes that require a valid bearer token.
pub mod authenticated;

/// Routes that additionally require the `admin` role (checked in the handlers).
pub mod admin;
