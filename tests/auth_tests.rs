// tests/auth_tests.rs

mod common;

use common::{INVITE, PASSWORD, spawn_app};
use serde_json::{Value, json};

#[tokio::test]
async fn unknown_path_is_404() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(format!("{}/random_path_that_does_not_exist", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_returns_user_and_session_cookie() {
    let app = spawn_app().await;

    let response = app
        .register_raw(json!({
            "name": "ann",
            "password": PASSWORD,
            "inviteCode": INVITE,
            "full_name": "Ann Example",
            "interests": "robotics, art",
            "contact": "ann@example.org",
        }))
        .await;

    assert_eq!(response.status().as_u16(), 201);

    let cookie = response
        .headers()
        .get("set-cookie")
        .expect("Set-Cookie header")
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));

    let token = response.headers().get("x-session-token").unwrap().to_str().unwrap().to_string();
    assert_eq!(token.len(), 64);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["name"], "ann");
    assert_eq!(body["full_name"], "Ann Example");
    assert_eq!(body["is_admin"], false);
    assert!(body.get("password_hash").is_none());
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn session_cookie_authenticates() {
    let app = spawn_app().await;
    let member = app.register("ann", "").await;

    let response = app
        .client
        .get(app.url("/me"))
        .header("cookie", format!("session={}", member.token))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["id"], member.id);
}

#[tokio::test]
async fn stale_cookie_falls_back_to_header_token() {
    let app = spawn_app().await;
    let member = app.register("ann", "").await;

    let response = app
        .get("/me", &member.token)
        .header("cookie", "session=deadbeef")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let bearer = app
        .client
        .get(app.url("/me"))
        .header("cookie", "session=deadbeef")
        .bearer_auth(&member.token)
        .send()
        .await
        .unwrap();
    assert_eq!(bearer.status().as_u16(), 200);

    let rejected = app
        .get("/me", "also-stale")
        .header("cookie", "session=deadbeef")
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status().as_u16(), 401);
}

#[tokio::test]
async fn invite_code_gate() {
    let app = spawn_app().await;

    for code in ["", "WRONG", "x7q9", "X7Q9 "] {
        let response = app
            .register_raw(json!({ "name": "bob", "password": PASSWORD, "inviteCode": code }))
            .await;
        assert_eq!(response.status().as_u16(), 403, "code {code:?}");
    }

    let missing = app
        .register_raw(json!({ "name": "bob", "password": PASSWORD }))
        .await;
    assert_eq!(missing.status().as_u16(), 403);

    let accepted = app
        .register_raw(json!({ "name": "bob", "password": PASSWORD, "inviteCode": "X7Q9" }))
        .await;
    assert_eq!(accepted.status().as_u16(), 201);

    let denials: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM security_log WHERE event = 'invite_denied'")
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(denials, 5);
}

#[tokio::test]
async fn registration_closed_without_configured_invite() {
    let upload_dir = std::env::temp_dir().join(format!("campus-market-test-{}", uuid::Uuid::new_v4()));
    let mut config = common::test_config(&upload_dir);
    config.invite_code = None;
    let app = common::spawn_app_with(config).await;

    let response = app
        .register_raw(json!({ "name": "bob", "password": PASSWORD, "inviteCode": "anything" }))
        .await;
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn login_limiter_answers_with_json_429() {
    let upload_dir = std::env::temp_dir().join(format!("campus-market-test-{}", uuid::Uuid::new_v4()));
    let mut config = common::test_config(&upload_dir);
    config.auth_rate_period_secs = 600;
    config.auth_rate_burst = 1;
    let app = common::spawn_app_with(config).await;

    let first = app.login("nobody", PASSWORD).await;
    assert_eq!(first.status().as_u16(), 401);

    let second = app.login("nobody", PASSWORD).await;
    assert_eq!(second.status().as_u16(), 429);
    assert_eq!(second.headers()["content-type"], "application/json");
    assert!(second.headers().contains_key("retry-after"));
    let body: Value = second.json().await.unwrap();
    assert_eq!(body["error"], "Too many requests");
}

#[tokio::test]
async fn duplicate_handle_is_conflict() {
    let app = spawn_app().await;
    app.register("ann", "").await;

    let response = app
        .register_raw(json!({ "name": "ann", "password": "other-pass", "inviteCode": INVITE }))
        .await;
    assert_eq!(response.status().as_u16(), 409);

    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("ann"));
}

#[tokio::test]
async fn concurrent_registrations_of_one_handle_yield_one_success() {
    let app = spawn_app().await;

    let mut set = tokio::task::JoinSet::new();
    for _ in 0..6 {
        let client = app.client.clone();
        let url = app.url("/register");
        set.spawn(async move {
            client
                .post(url)
                .json(&json!({ "name": "race", "password": PASSWORD, "inviteCode": INVITE }))
                .send()
                .await
                .unwrap()
                .status()
                .as_u16()
        });
    }

    let mut statuses = Vec::new();
    while let Some(status) = set.join_next().await {
        statuses.push(status.unwrap());
    }

    assert_eq!(statuses.iter().filter(|s| **s == 201).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == 409).count(), 5);
}

#[tokio::test]
async fn register_validates_input() {
    let app = spawn_app().await;

    let short_handle = app
        .register_raw(json!({ "name": "a", "password": PASSWORD, "inviteCode": INVITE }))
        .await;
    assert_eq!(short_handle.status().as_u16(), 400);

    let spaced_handle = app
        .register_raw(json!({ "name": "ann b", "password": PASSWORD, "inviteCode": INVITE }))
        .await;
    assert_eq!(spaced_handle.status().as_u16(), 400);

    let short_password = app
        .register_raw(json!({ "name": "ann", "password": "abc", "inviteCode": INVITE }))
        .await;
    assert_eq!(short_password.status().as_u16(), 400);
}

#[tokio::test]
async fn login_failures_are_uniform_and_logged() {
    let app = spawn_app().await;
    app.register("ann", "").await;

    let wrong_password = app.login("ann", "not-the-password").await;
    assert_eq!(wrong_password.status().as_u16(), 401);
    let wrong_body: Value = wrong_password.json().await.unwrap();

    let unknown_user = app.login("nobody", PASSWORD).await;
    assert_eq!(unknown_user.status().as_u16(), 401);
    let unknown_body: Value = unknown_user.json().await.unwrap();

    assert_eq!(wrong_body, unknown_body);

    let failures: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM security_log WHERE event = 'login_failed'")
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(failures, 2);
}

#[tokio::test]
async fn login_issues_a_fresh_token() {
    let app = spawn_app().await;
    let member = app.register("ann", "").await;

    let response = app.login("ann", PASSWORD).await;
    assert_eq!(response.status().as_u16(), 200);
    let token = response.headers().get("x-session-token").unwrap().to_str().unwrap().to_string();
    assert_ne!(token, member.token);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["id"], member.id);
    assert!(body.get("password_hash").is_none());

    // Both sessions are valid side by side.
    for token in [&token, &member.token] {
        let me = app.get("/me", token).send().await.unwrap();
        assert_eq!(me.status().as_u16(), 200);
    }
}

#[tokio::test]
async fn protected_routes_need_a_session() {
    let app = spawn_app().await;

    for path in ["/me", "/users", "/listings", "/search?q=x", "/discover", "/match/1"] {
        let response = app.client.get(app.url(path)).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 401, "{path}");
    }

    let bogus = app.get("/me", "deadbeef").send().await.unwrap();
    assert_eq!(bogus.status().as_u16(), 401);

    let bearer = app
        .client
        .get(app.url("/me"))
        .header("authorization", "Bearer deadbeef")
        .send()
        .await
        .unwrap();
    assert_eq!(bearer.status().as_u16(), 401);
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let app = spawn_app().await;
    let member = app.register("ann", "").await;

    let response = app.post("/logout", &member.token).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let me = app.get("/me", &member.token).send().await.unwrap();
    assert_eq!(me.status().as_u16(), 401);

    // Logging out twice, or without a session, still succeeds.
    let again = app.post("/logout", &member.token).send().await.unwrap();
    assert_eq!(again.status().as_u16(), 200);
    let anonymous = app.client.post(app.url("/logout")).send().await.unwrap();
    assert_eq!(anonymous.status().as_u16(), 200);
}

#[tokio::test]
async fn expired_session_is_rejected() {
    let app = spawn_app().await;
    let member = app.register("ann", "").await;

    sqlx::query("UPDATE sessions SET expires_at = ? WHERE token = ?")
        .bind(chrono::Utc::now() - chrono::Duration::seconds(1))
        .bind(&member.token)
        .execute(&app.pool)
        .await
        .unwrap();

    let me = app.get("/me", &member.token).send().await.unwrap();
    assert_eq!(me.status().as_u16(), 401);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE token = ?")
        .bind(&member.token)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn profile_update_and_contact_visibility() {
    let app = spawn_app().await;
    let ann = app.register("ann", "").await;
    let bob = app.register("bob", "").await;

    let updated = app
        .put("/me", &ann.token)
        .json(&json!({ "contact": "ann@example.org", "hide_contact": true, "skills": "welding" }))
        .send()
        .await
        .unwrap();
    assert_eq!(updated.status().as_u16(), 200);
    let body: Value = updated.json().await.unwrap();
    assert_eq!(body["contact"], "ann@example.org");
    assert_eq!(body["skills"], "welding");

    // Hidden from other members.
    let seen_by_bob: Value = app
        .get(&format!("/users/{}", ann.id), &bob.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(seen_by_bob["contact"], Value::Null);
    assert_eq!(seen_by_bob["hide_contact"], true);

    // But visible to admins.
    let admin = app.admin("root").await;
    let seen_by_admin: Value = app
        .get(&format!("/users/{}", ann.id), &admin.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(seen_by_admin["contact"], "ann@example.org");

    // Renaming onto a taken handle is a conflict.
    let clash = app
        .put("/me", &ann.token)
        .json(&json!({ "name": "bob" }))
        .send()
        .await
        .unwrap();
    assert_eq!(clash.status().as_u16(), 409);
}

#[tokio::test]
async fn bug_reports_are_public() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/bugs"))
        .json(&json!({ "title": "Upload broken", "description": "<script>x</script>Fails" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    let (description, status, reporter): (String, String, String) =
        sqlx::query_as("SELECT description, status, reporter FROM bug_reports")
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert!(!description.contains("<script>"));
    assert_eq!(status, "open");
    assert_eq!(reporter, "Anonymous");

    let invalid = app
        .client
        .post(app.url("/bugs"))
        .json(&json!({ "title": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status().as_u16(), 400);
}
