// src/handlers/auth.rs

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::{
        security_log::SecurityEvent,
        user::{LoginRequest, RegisterRequest},
    },
    services::{
        audit::SecurityLog,
        credentials::{AuthFailure, CredentialStore},
        invite::{InviteDecision, InviteGate},
        sessions::SessionManager,
    },
    utils::guard::{
        ClientAddr, SESSION_HEADER, expired_session_cookie, session_cookie, session_tokens,
    },
};

/// Registers a new user behind the invite gate.
///
/// Returns 201 Created with the user (never the password hash) and a
/// session cookie, so a fresh account is logged in straight away.
pub async fn register(
    State(users): State<CredentialStore>,
    State(sessions): State<SessionManager>,
    State(gate): State<InviteGate>,
    State(audit): State<SecurityLog>,
    State(config): State<Config>,
    ClientAddr(source): ClientAddr,
    jar: CookieJar,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    match gate.check(&payload.invite_code) {
        InviteDecision::Allowed => {}
        InviteDecision::Denied => {
            audit
                .record(
                    SecurityEvent::InviteDenied,
                    &source,
                    &format!("code {:?} for handle '{}'", payload.invite_code, payload.name),
                )
                .await;
            return Err(AppError::Forbidden("Invalid invite code".to_string()));
        }
        InviteDecision::NotConfigured => {
            tracing::error!("Registration attempted but INVITE_CODE is not configured");
            audit
                .record(SecurityEvent::InviteDenied, &source, "invite gate not configured")
                .await;
            return Err(AppError::Forbidden("Registration is closed".to_string()));
        }
    }

    let id = users
        .create_user(&payload.name, &payload.profile, &payload.password)
        .await?;
    let user = users.get(id).await?;

    let token = sessions.create_session(user.id).await?;
    audit
        .record(SecurityEvent::Registered, &source, &format!("user {} ('{}')", user.id, user.name))
        .await;
    tracing::info!("User {} registered", user.name);

    let cookie = session_cookie(token.clone(), sessions.ttl(), config.cookie_secure);
    let view = user.view_for(&user);

    Ok((
        StatusCode::CREATED,
        jar.add(cookie),
        [(SESSION_HEADER, token)],
        Json(view),
    ))
}

/// Authenticates a user and starts a session.
///
/// Every failure answers the same 401; the precise reason goes to the
/// security log only.
pub async fn login(
    State(users): State<CredentialStore>,
    State(sessions): State<SessionManager>,
    State(audit): State<SecurityLog>,
    State(config): State<Config>,
    ClientAddr(source): ClientAddr,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = match users.verify_credentials(&payload.name, &payload.password).await {
        Ok(user) => user,
        Err(AuthFailure::Store(e)) => return Err(e),
        Err(failure) => {
            audit
                .record(
                    SecurityEvent::LoginFailed,
                    &source,
                    &format!("{} for handle '{}'", failure, payload.name),
                )
                .await;
            return Err(failure.into());
        }
    };

    let token = sessions.create_session(user.id).await?;
    let cookie = session_cookie(token.clone(), sessions.ttl(), config.cookie_secure);
    let view = user.view_for(&user);

    Ok((jar.add(cookie), [(SESSION_HEADER, token)], Json(view)))
}

/// Ends the current session, if any. Always succeeds.
pub async fn logout(
    State(sessions): State<SessionManager>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    for token in session_tokens(&headers) {
        sessions.revoke_session(&token).await?;
    }

    Ok((
        jar.remove(expired_session_cookie()),
        Json(serde_json::json!({ "success": true })),
    ))
}
