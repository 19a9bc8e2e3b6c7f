// tests/user_tests.rs
//
// Admin user directory and the /users/me self-profile surface.

use std::sync::Arc;

use critica::{config::Config, routes, state::AppState, utils::mail::LogMailer};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

async fn spawn_app() -> (String, SqlitePool) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        mail_from: "no-reply@critica.test".to_string(),
        admin_username: None,
        admin_email: None,
    };

    let state = AppState {
        pool: pool.clone(),
        config,
        mailer: Arc::new(LogMailer {
            from: "no-reply@critica.test".to_string(),
        }),
    };

    let app = routes::create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, pool)
}

async fn issue_user(address: &str, pool: &SqlitePool, role: &str) -> (String, String) {
    let client = reqwest::Client::new();
    let username = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let email = format!("{}@example.com", username);

    client
        .post(format!("{}/api/v1/auth/signup", address))
        .json(&serde_json::json!({"username": username, "email": email}))
        .send()
        .await
        .expect("signup failed");

    if role != "user" {
        sqlx::query("UPDATE users SET role = ? WHERE username = ?")
            .bind(role)
            .bind(&username)
            .execute(pool)
            .await
            .unwrap();
    }

    let code: String =
        sqlx::query_scalar("SELECT confirmation_code FROM users WHERE username = ?")
            .bind(&username)
            .fetch_one(pool)
            .await
            .unwrap();

    let body: serde_json::Value = client
        .post(format!("{}/api/v1/auth/token", address))
        .json(&serde_json::json!({"username": username, "confirmation_code": code}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    (username, body["token"].as_str().unwrap().to_string())
}

#[tokio::test]
async fn user_directory_is_admin_only() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, user_token) = issue_user(&address, &pool, "user").await;
    let (_, admin_token) = issue_user(&address, &pool, "admin").await;

    let response = client
        .get(format!("{}/api/v1/users", address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let response = client
        .get(format!("{}/api/v1/users", address))
        .bearer_auth(&user_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = client
        .get(format!("{}/api/v1/users", address))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Vec<serde_json::Value> = response.json().await.unwrap();
    assert_eq!(body.len(), 2);
    // Payloads carry no internal id or confirmation code.
    assert!(body[0].get("id").is_none());
    assert!(body[0].get("confirmation_code").is_none());
}

#[tokio::test]
async fn admin_creates_updates_and_deletes_users() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, admin_token) = issue_user(&address, &pool, "admin").await;

    let response = client
        .post(format!("{}/api/v1/users", address))
        .bearer_auth(&admin_token)
        .json(&serde_json::json!({
            "username": "newbie",
            "email": "newbie@example.com",
            "first_name": "New",
            "role": "moderator"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["role"], "moderator");

    // Duplicate username is a field-scoped 400 from the store constraint.
    let response = client
        .post(format!("{}/api/v1/users", address))
        .bearer_auth(&admin_token)
        .json(&serde_json::json!({"username": "newbie", "email": "else@example.com"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body.get("username").is_some());

    let response = client
        .patch(format!("{}/api/v1/users/newbie", address))
        .bearer_auth(&admin_token)
        .json(&serde_json::json!({"role": "admin", "bio": "promoted"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["role"], "admin");
    assert_eq!(body["bio"], "promoted");

    let response = client
        .delete(format!("{}/api/v1/users/newbie", address))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let response = client
        .get(format!("{}/api/v1/users/newbie", address))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn user_search_filters_by_username() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, admin_token) = issue_user(&address, &pool, "admin").await;

    for name in ["findme_x", "other_y"] {
        client
            .post(format!("{}/api/v1/users", address))
            .bearer_auth(&admin_token)
            .json(&serde_json::json!({"username": name, "email": format!("{}@example.com", name)}))
            .send()
            .await
            .unwrap();
    }

    let body: Vec<serde_json::Value> = client
        .get(format!("{}/api/v1/users?search=findme", address))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body.len(), 1);
    assert_eq!(body[0]["username"], "findme_x");
}

#[tokio::test]
async fn role_change_applies_on_next_request() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (username, token) = issue_user(&address, &pool, "user").await;
    let (_, admin_token) = issue_user(&address, &pool, "admin").await;

    let response = client
        .get(format!("{}/api/v1/users", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    client
        .patch(format!("{}/api/v1/users/{}", address, username))
        .bearer_auth(&admin_token)
        .json(&serde_json::json!({"role": "admin"}))
        .send()
        .await
        .unwrap();

    // Same token: the actor snapshot is re-read per request.
    let response = client
        .get(format!("{}/api/v1/users", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn me_returns_own_record_only() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (username_a, token_a) = issue_user(&address, &pool, "user").await;
    let (username_b, token_b) = issue_user(&address, &pool, "user").await;

    let response = client
        .get(format!("{}/api/v1/users/me", address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let me_a: serde_json::Value = client
        .get(format!("{}/api/v1/users/me", address))
        .bearer_auth(&token_a)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me_a["username"], username_a);
    assert_eq!(me_a["role"], "user");

    // No query manipulation returns someone else's record.
    let me_b: serde_json::Value = client
        .get(format!("{}/api/v1/users/me?username={}", address, username_a))
        .bearer_auth(&token_b)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me_b["username"], username_b);
}

#[tokio::test]
async fn me_patch_cannot_change_role_or_take_reserved_name() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (username, token) = issue_user(&address, &pool, "user").await;

    let response = client
        .patch(format!("{}/api/v1/users/me", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({"role": "admin", "bio": "still just me"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["role"], "user");
    assert_eq!(body["bio"], "still just me");

    let role: String = sqlx::query_scalar("SELECT role FROM users WHERE username = ?")
        .bind(&username)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(role, "user");

    let response = client
        .patch(format!("{}/api/v1/users/me", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({"username": "ME"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn me_patch_conflict_leaves_record_untouched() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (username, token) = issue_user(&address, &pool, "user").await;
    let (other_username, _) = issue_user(&address, &pool, "user").await;

    // Valid new username alongside an email that belongs to someone else:
    // the whole update must be rejected, the username included.
    let response = client
        .patch(format!("{}/api/v1/users/me", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "username": "renamed_halfway",
            "email": format!("{}@example.com", other_username),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body.get("email").is_some());

    let renamed: Option<i64> =
        sqlx::query_scalar("SELECT id FROM users WHERE username = 'renamed_halfway'")
            .fetch_optional(&pool)
            .await
            .unwrap();
    assert!(renamed.is_none());

    let me: serde_json::Value = client
        .get(format!("{}/api/v1/users/me", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["username"], username);
    assert_eq!(me["email"], format!("{}@example.com", username));
}

#[tokio::test]
async fn me_patch_updates_profile_fields() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, token) = issue_user(&address, &pool, "user").await;

    let response = client
        .patch(format!("{}/api/v1/users/me", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "username": "renamed_user",
            "first_name": "Ada",
            "last_name": "L."
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["username"], "renamed_user");
    assert_eq!(body["first_name"], "Ada");

    // The new identity is what /users/me resolves from now on.
    let me: serde_json::Value = client
        .get(format!("{}/api/v1/users/me", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["username"], "renamed_user");
}
