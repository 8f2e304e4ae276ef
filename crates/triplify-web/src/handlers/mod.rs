//! HTTP handlers, grouped by concern.

pub mod admin;
pub mod auth;
pub mod endpoints;
pub mod files;
pub mod graphs;
pub mod integration;
pub mod jobs;
pub mod query;
pub mod shortcuts;

use axum_extra::extract::cookie::{Cookie, CookieJar};

use crate::state::SESSION_COOKIE;

/// Session cookie for a fresh token.
pub(crate) fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .build()
}

/// Drop the session cookie from the jar.
pub(crate) fn clear_session_cookie(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/").build())
}
