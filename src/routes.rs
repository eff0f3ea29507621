// src/routes.rs

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use tower::ServiceBuilder;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    error::AppError,
    handlers::{admin, auth, bugs, listings, profile},
    state::AppState,
    utils::{
        guard::{SESSION_HEADER, admin_middleware, auth_middleware},
        storage::PUBLIC_PREFIX,
    },
};

/// Assembles the main application router.
///
/// * Everything JSON lives under `/api`; stored images under `/uploads`.
/// * Login and register share a strict per-IP limiter, bulk reads a looser one.
/// * Session routes sit behind `auth_middleware`, admin routes additionally
///   behind `admin_middleware`.
///
/// The server must be started with
/// `into_make_service_with_connect_info::<SocketAddr>()`, the limiters key on
/// the peer address.
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:8081"),
            HeaderValue::from_static("http://127.0.0.1:8081"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::HeaderName::from_static(SESSION_HEADER),
        ])
        .allow_credentials(true);

    let auth_governor = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(config.auth_rate_period_secs.max(1))
            .burst_size(config.auth_rate_burst.max(1))
            .finish()
            .unwrap_or_default(),
    );
    let api_governor = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(config.api_rate_period_secs.max(1))
            .burst_size(config.api_rate_burst.max(1))
            .finish()
            .unwrap_or_default(),
    );

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(GovernorLayer::new(auth_governor).error_handler(limiter_rejection));

    let public_routes = Router::new()
        .route("/logout", post(auth::logout))
        .merge(
            Router::new()
                .route("/bugs", post(bugs::create_bug))
                .layer(GovernorLayer::new(api_governor.clone()).error_handler(limiter_rejection)),
        );

    // Bulk reads, rate limited.
    let read_routes = Router::new()
        .route("/listings", get(listings::list_listings))
        .route("/search", get(listings::search_listings))
        .route("/discover", get(listings::discover))
        .layer(GovernorLayer::new(api_governor).error_handler(limiter_rejection));

    // Room for every image plus the text fields.
    let upload_limit = config.max_upload_bytes * listings::MAX_IMAGES + 1024 * 1024;

    let session_routes = Router::new()
        .route("/me", get(profile::get_me).put(profile::update_me))
        .route("/users", get(profile::list_users))
        .route("/users/{id}", get(profile::get_user))
        .route("/users/{id}/listings", get(profile::user_listings))
        .route(
            "/listings",
            post(listings::create_listing).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/listings/{id}",
            get(listings::get_listing)
                .put(listings::update_listing)
                .delete(listings::delete_listing),
        )
        .route("/match/{user_id}", get(listings::match_listings))
        .merge(read_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/{id}", delete(admin::delete_user))
        .route("/users/{id}/admin", put(admin::set_admin))
        .route("/stats", get(admin::stats))
        .route("/bugs", get(admin::list_bugs))
        .route("/bugs/{id}", put(admin::update_bug_status))
        .route("/security-log", get(admin::security_log))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn_with_state(state.clone(), admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let api = Router::new()
        .merge(auth_routes)
        .merge(public_routes)
        .merge(session_routes)
        .nest("/admin", admin_routes);

    Router::new()
        .nest("/api", api)
        .nest_service(PUBLIC_PREFIX, ServeDir::new(&config.upload_dir))
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Renders a limiter rejection like every other API error.
/// A 429 keeps the limiter's headers and gains `Retry-After`.
fn limiter_rejection(err: GovernorError) -> Response {
    match err {
        GovernorError::TooManyRequests { wait_time, headers } => {
            let mut response = AppError::RateLimited.into_response();
            if let Some(headers) = headers {
                response.headers_mut().extend(headers);
            }
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(wait_time));
            response
        }
        GovernorError::UnableToExtractKey => {
            AppError::Internal("rate limiter could not read the peer address".to_string())
                .into_response()
        }
        GovernorError::Other { msg, .. } => {
            AppError::Internal(msg.unwrap_or_else(|| "rate limiter failure".to_string()))
                .into_response()
        }
    }
}
