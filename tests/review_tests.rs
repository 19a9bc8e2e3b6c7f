// tests/review_tests.rs
//
// Review/comment invariants: one review per (title, author), scoped
// parent lookups, ownership on mutation, cascade deletes.

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

/// Seeds one title directly through the store and returns its id.
async fn seed_title(pool: &SqlitePool, name: &str) -> i64 {
    sqlx::query_scalar("INSERT INTO titles (name, year, description) VALUES (?, 1979, '') RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn anonymous_reads_reviews_but_cannot_post() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let title_id = seed_title(&pool, "Stalker").await;

    let response = client
        .get(format!("{}/api/v1/titles/{}/reviews", address, title_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let response = client
        .post(format!("{}/api/v1/titles/{}/reviews", address, title_id))
        .json(&serde_json::json!({"text": "great", "score": 9}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn review_on_missing_title_is_404_and_bad_score_is_400() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, token) = issue_user(&address, &pool, "user").await;

    let response = client
        .post(format!("{}/api/v1/titles/9999/reviews", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({"text": "great", "score": 9}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let title_id = seed_title(&pool, "Solaris").await;
    for score in [0, 11] {
        let response = client
            .post(format!("{}/api/v1/titles/{}/reviews", address, title_id))
            .bearer_auth(&token)
            .json(&serde_json::json!({"text": "great", "score": score}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400, "score {}", score);
    }
}

#[tokio::test]
async fn second_review_by_same_author_conflicts() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (username, token) = issue_user(&address, &pool, "user").await;
    let title_id = seed_title(&pool, "Ubik").await;

    let response = client
        .post(format!("{}/api/v1/titles/{}/reviews", address, title_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({"text": "first", "score": 8}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["author"], username);

    let response = client
        .post(format!("{}/api/v1/titles/{}/reviews", address, title_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({"text": "second", "score": 3}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body.get("non_field_errors").is_some());
}

#[tokio::test]
async fn concurrent_duplicate_creates_yield_one_success() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, token) = issue_user(&address, &pool, "user").await;
    let title_id = seed_title(&pool, "Roadside Picnic").await;

    let first = client
        .post(format!("{}/api/v1/titles/{}/reviews", address, title_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({"text": "a", "score": 7}))
        .send();
    let second = client
        .post(format!("{}/api/v1/titles/{}/reviews", address, title_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({"text": "b", "score": 7}))
        .send();

    let (first, second) = tokio::join!(first, second);
    let mut statuses = vec![
        first.unwrap().status().as_u16(),
        second.unwrap().status().as_u16(),
    ];
    statuses.sort();
    assert_eq!(statuses, vec![201, 400]);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE title_id = ?")
        .bind(title_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn review_mutation_is_author_moderator_or_admin() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, author_token) = issue_user(&address, &pool, "user").await;
    let (_, other_token) = issue_user(&address, &pool, "user").await;
    let (_, moderator_token) = issue_user(&address, &pool, "moderator").await;
    let title_id = seed_title(&pool, "Lem Omnibus").await;

    let review: serde_json::Value = client
        .post(format!("{}/api/v1/titles/{}/reviews", address, title_id))
        .bearer_auth(&author_token)
        .json(&serde_json::json!({"text": "mine", "score": 6}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let review_id = review["id"].as_i64().unwrap();
    let review_url = format!("{}/api/v1/titles/{}/reviews/{}", address, title_id, review_id);

    // Another plain user can neither edit nor delete it.
    let response = client
        .patch(&review_url)
        .bearer_auth(&other_token)
        .json(&serde_json::json!({"score": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = client
        .delete(&review_url)
        .bearer_auth(&other_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    // The author edits their own.
    let response = client
        .patch(&review_url)
        .bearer_auth(&author_token)
        .json(&serde_json::json!({"score": 10}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["score"], 10);
    assert_eq!(body["text"], "mine");

    // A moderator deletes someone else's.
    let response = client
        .delete(&review_url)
        .bearer_auth(&moderator_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);
}

#[tokio::test]
async fn comment_parent_is_scoped_to_title_and_review() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, token) = issue_user(&address, &pool, "user").await;
    let title_a = seed_title(&pool, "Title A").await;
    let title_b = seed_title(&pool, "Title B").await;

    let review: serde_json::Value = client
        .post(format!("{}/api/v1/titles/{}/reviews", address, title_a))
        .bearer_auth(&token)
        .json(&serde_json::json!({"text": "on A", "score": 5}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let review_id = review["id"].as_i64().unwrap();

    // The review exists, but not under title B: 404, never a silent hit.
    let response = client
        .post(format!(
            "{}/api/v1/titles/{}/reviews/{}/comments",
            address, title_b, review_id
        ))
        .bearer_auth(&token)
        .json(&serde_json::json!({"text": "misplaced"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let response = client
        .post(format!(
            "{}/api/v1/titles/{}/reviews/{}/comments",
            address, title_a, review_id
        ))
        .bearer_auth(&token)
        .json(&serde_json::json!({"text": "well put"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
}

#[tokio::test]
async fn comment_ownership_and_cascade_delete() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, author_token) = issue_user(&address, &pool, "user").await;
    let (commenter, commenter_token) = issue_user(&address, &pool, "user").await;
    let title_id = seed_title(&pool, "Annihilation").await;

    let review: serde_json::Value = client
        .post(format!("{}/api/v1/titles/{}/reviews", address, title_id))
        .bearer_auth(&author_token)
        .json(&serde_json::json!({"text": "eerie", "score": 8}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let review_id = review["id"].as_i64().unwrap();
    let comments_url = format!(
        "{}/api/v1/titles/{}/reviews/{}/comments",
        address, title_id, review_id
    );

    let comment: serde_json::Value = client
        .post(&comments_url)
        .bearer_auth(&commenter_token)
        .json(&serde_json::json!({"text": "agreed"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(comment["author"], commenter);
    let comment_id = comment["id"].as_i64().unwrap();

    // The review author does not own the comment.
    let response = client
        .patch(format!("{}/{}", comments_url, comment_id))
        .bearer_auth(&author_token)
        .json(&serde_json::json!({"text": "edited"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    // Deleting the review takes its comments with it.
    let response = client
        .delete(format!(
            "{}/api/v1/titles/{}/reviews/{}",
            address, title_id, review_id
        ))
        .bearer_auth(&author_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let comments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(comments, 0);
}

#[tokio::test]
async fn deleting_title_cascades_to_reviews() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, user_token) = issue_user(&address, &pool, "user").await;
    let (_, admin_token) = issue_user(&address, &pool, "admin").await;
    let title_id = seed_title(&pool, "Short-lived").await;

    client
        .post(format!("{}/api/v1/titles/{}/reviews", address, title_id))
        .bearer_auth(&user_token)
        .json(&serde_json::json!({"text": "soon gone", "score": 4}))
        .send()
        .await
        .unwrap();

    let response = client
        .delete(format!("{}/api/v1/titles/{}", address, title_id))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let reviews: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(reviews, 0);
}
