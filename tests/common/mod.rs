// tests/common/mod.rs

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;

use campus_market::{
    config::Config, db, routes, services::credentials::CredentialStore, state::AppState,
};
use serde_json::{Value, json};
use sqlx::SqlitePool;

pub const INVITE: &str = "X7Q9";
pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub address: String,
    pub pool: SqlitePool,
    pub upload_dir: PathBuf,
    pub client: reqwest::Client,
}

/// A registered member and the session token issued to them.
pub struct Member {
    pub id: i64,
    pub token: String,
}

pub fn test_config(upload_dir: &PathBuf) -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        invite_code: Some(INVITE.to_string()),
        session_ttl_days: 30,
        cookie_secure: false,
        upload_dir: upload_dir.to_string_lossy().into_owned(),
        max_upload_bytes: 64 * 1024,
        // Generous limits so tests never trip the limiters by accident.
        auth_rate_period_secs: 1,
        auth_rate_burst: 1000,
        api_rate_period_secs: 1,
        api_rate_burst: 1000,
        admin_username: None,
        admin_password: None,
    }
}

/// Spawns the app on a random port with a private in-memory database.
pub async fn spawn_app() -> TestApp {
    let upload_dir = std::env::temp_dir().join(format!("campus-market-test-{}", uuid::Uuid::new_v4()));
    spawn_app_with(test_config(&upload_dir)).await
}

pub async fn spawn_app_with(config: Config) -> TestApp {
    let pool = db::memory_pool().await.expect("Failed to create test database");
    let upload_dir = PathBuf::from(&config.upload_dir);

    let state = AppState::new(pool.clone(), config);
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestApp {
        address,
        pool,
        upload_dir,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.address, path)
    }

    pub async fn register_raw(&self, body: Value) -> reqwest::Response {
        self.client
            .post(self.url("/register"))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Registers `name` with the given interests and returns its session.
    pub async fn register(&self, name: &str, interests: &str) -> Member {
        let response = self
            .register_raw(json!({
                "name": name,
                "password": PASSWORD,
                "inviteCode": INVITE,
                "interests": interests,
            }))
            .await;
        assert_eq!(response.status().as_u16(), 201, "register {name}");
        member_from(response).await
    }

    pub async fn login(&self, name: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/login"))
            .json(&json!({ "name": name, "password": password }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Seeds an admin directly in the database and logs in as it.
    pub async fn admin(&self, name: &str) -> Member {
        CredentialStore::new(self.pool.clone())
            .create_admin(name, PASSWORD)
            .await
            .expect("Failed to seed admin");
        let response = self.login(name, PASSWORD).await;
        assert_eq!(response.status().as_u16(), 200);
        member_from(response).await
    }

    pub fn get(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.url(path))
            .header("x-session-token", token)
    }

    pub fn put(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .put(self.url(path))
            .header("x-session-token", token)
    }

    pub fn post(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .header("x-session-token", token)
    }

    pub fn delete(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .delete(self.url(path))
            .header("x-session-token", token)
    }

    /// Creates a text-only listing and returns its id.
    pub async fn create_listing(&self, token: &str, title: &str, description: &str, tags: &str) -> i64 {
        let form = reqwest::multipart::Form::new()
            .text("title", title.to_string())
            .text("description", description.to_string())
            .text("category", "misc")
            .text("tags", tags.to_string())
            .text("type", "offer");

        let response = self
            .post("/listings", token)
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 201, "create listing {title}");

        let body: Value = response.json().await.unwrap();
        body["id"].as_i64().expect("listing id")
    }
}

async fn member_from(response: reqwest::Response) -> Member {
    let token = response
        .headers()
        .get("x-session-token")
        .expect("session token header")
        .to_str()
        .unwrap()
        .to_string();
    let body: Value = response.json().await.unwrap();
    Member {
        id: body["id"].as_i64().expect("user id"),
        token,
    }
}
