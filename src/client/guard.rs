use super::{AuthStore, TokenStorage};
use crate::models::User;

pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";

/// RouteMeta
///
/// Access requirements attached to a view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteMeta {
    /// Only signed-in users may enter.
    pub requires_auth: bool,
    /// Only admins may enter.
    pub requires_admin: bool,
    /// Only signed-out users may enter (login, register).
    pub guest: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub path: &'static str,
    pub meta: RouteMeta,
}

const AUTH: RouteMeta = RouteMeta {
    requires_auth: true,
    requires_admin: false,
    guest: false,
};

const GUEST: RouteMeta = RouteMeta {
    requires_auth: false,
    requires_admin: false,
    guest: true,
};

const ADMIN: RouteMeta = RouteMeta {
    requires_auth: true,
    requires_admin: true,
    guest: false,
};

/// The application's views.
pub const ROUTES: &[Route] = &[
    Route { path: "/", meta: AUTH },
    Route { path: LOGIN_PATH, meta: GUEST },
    Route { path: "/register", meta: GUEST },
    Route { path: DASHBOARD_PATH, meta: AUTH },
    Route { path: "/admin", meta: ADMIN },
];

pub fn find_route(path: &str) -> Option<&'static Route> {
    ROUTES.iter().find(|route| route.path == path)
}

/// Navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Allow,
    Redirect(&'static str),
}

/// guard
///
/// Decides a navigation from the destination's requirements and the cached
/// user. Checks run in order: authentication, admin role, guest-only.
pub fn guard(meta: &RouteMeta, user: Option<&User>) -> Navigation {
    if meta.requires_auth && user.is_none() {
        Navigation::Redirect(LOGIN_PATH)
    } else if meta.requires_admin && !user.is_some_and(|u| u.role.is_admin()) {
        Navigation::Redirect(DASHBOARD_PATH)
    } else if meta.guest && user.is_some() {
        Navigation::Redirect(DASHBOARD_PATH)
    } else {
        Navigation::Allow
    }
}

/// before_each
///
/// Runs once per navigation: refreshes the cached user from persisted storage,
/// then applies `guard` to the destination. Unknown paths carry no requirements.
pub async fn before_each<S: TokenStorage>(auth: &mut AuthStore<S>, path: &str) -> Navigation {
    auth.check_auth().await;
    let meta = find_route(path).map(|route| route.meta).unwrap_or_default();
    guard(&meta, auth.user())
}
