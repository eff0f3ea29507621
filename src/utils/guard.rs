// src/utils/guard.rs

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{HeaderMap, Request, header, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::{
    error::AppError,
    models::{security_log::SecurityEvent, user::User},
    services::{audit::SecurityLog, sessions::SessionManager},
};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

/// Header carrying the token for non-browser clients, both ways.
pub const SESSION_HEADER: &str = "x-session-token";

/// The identity resolved for the current request.
/// Inserted into request extensions by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Source address of the request, for the security log.
#[derive(Debug, Clone)]
pub struct ClientAddr(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientAddr {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientAddr(client_addr(&parts.extensions)))
    }
}

fn client_addr(extensions: &axum::http::Extensions) -> String {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Session token candidates in precedence order: cookie, then
/// `x-session-token`, then `Authorization: Bearer`.
///
/// Empty values and repeats are dropped. A browser can keep sending a stale
/// cookie next to a valid header token, so callers try every candidate.
pub fn session_tokens(headers: &HeaderMap) -> Vec<String> {
    let cookie = CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string());

    let header_token = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string);

    let mut tokens: Vec<String> = Vec::new();
    for token in [cookie, header_token, bearer].into_iter().flatten() {
        if !token.is_empty() && !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}

/// HTTP-only, `SameSite=Lax` cookie carrying a fresh session token.
pub fn session_cookie(token: String, ttl: chrono::Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::seconds(ttl.num_seconds()))
        .build()
}

/// Cookie value used to clear the session cookie on logout.
pub fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

/// Axum Middleware: Authentication.
///
/// Resolves the request's session token to a user and injects
/// [`CurrentUser`] into the request extensions for handlers to use.
/// Rejects with 401 before any handler runs otherwise.
pub async fn auth_middleware(
    State(sessions): State<SessionManager>,
    State(audit): State<SecurityLog>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let source = client_addr(req.extensions());
    let path = req.uri().path().to_string();

    let tokens = session_tokens(req.headers());
    if tokens.is_empty() {
        audit
            .record(SecurityEvent::Unauthenticated, &source, &format!("no session token for {path}"))
            .await;
        return Err(AppError::Unauthenticated("Login required".to_string()));
    }

    // First candidate that resolves wins.
    let mut reason = String::new();
    for token in &tokens {
        match sessions.resolve_session(token).await {
            Ok(user) => {
                req.extensions_mut().insert(CurrentUser(user));
                return Ok(next.run(req).await);
            }
            Err(AppError::Unauthenticated(why)) => reason = why,
            Err(e) => return Err(e),
        }
    }

    audit
        .record(SecurityEvent::Unauthenticated, &source, &format!("{reason} for {path}"))
        .await;
    Err(AppError::Unauthenticated(reason))
}

/// Axum Middleware: Admin Authorization.
///
/// Must be used AFTER `auth_middleware`. Checks the resolved user's admin flag.
/// If not set, returns 403 Forbidden.
pub async fn admin_middleware(
    State(audit): State<SecurityLog>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let CurrentUser(user) = req
        .extensions()
        .get::<CurrentUser>()
        .cloned()
        .ok_or_else(|| AppError::Unauthenticated("Login required".to_string()))?;

    if !user.is_admin {
        let source = client_addr(req.extensions());
        audit
            .record(
                SecurityEvent::Forbidden,
                &source,
                &format!("user {} ('{}') requested {}", user.id, user.name, req.uri().path()),
            )
            .await;
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }

    Ok(next.run(req).await)
}
