use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::SqlitePool;

use crate::{
    config::Config,
    services::{
        audit::SecurityLog, credentials::CredentialStore, invite::InviteGate,
        listings::ListingStore, sessions::SessionManager,
    },
    utils::storage::{BlobStore, LocalBlobStore},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub blobs: Arc<dyn BlobStore>,
}

impl AppState {
    /// State backed by the local upload directory from `config`.
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        let blobs = Arc::new(LocalBlobStore::new(
            config.upload_dir.clone(),
            config.max_upload_bytes,
        ));
        Self {
            pool,
            config,
            blobs,
        }
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<dyn BlobStore> {
    fn from_ref(state: &AppState) -> Self {
        state.blobs.clone()
    }
}

impl FromRef<AppState> for CredentialStore {
    fn from_ref(state: &AppState) -> Self {
        CredentialStore::new(state.pool.clone())
    }
}

impl FromRef<AppState> for SessionManager {
    fn from_ref(state: &AppState) -> Self {
        SessionManager::new(state.pool.clone(), state.config.session_ttl())
    }
}

impl FromRef<AppState> for ListingStore {
    fn from_ref(state: &AppState) -> Self {
        ListingStore::new(state.pool.clone())
    }
}

impl FromRef<AppState> for SecurityLog {
    fn from_ref(state: &AppState) -> Self {
        SecurityLog::new(state.pool.clone())
    }
}

impl FromRef<AppState> for InviteGate {
    fn from_ref(state: &AppState) -> Self {
        InviteGate::new(state.config.invite_code.clone())
    }
}
