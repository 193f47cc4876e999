//! services/api/tests/api_tests.rs
//!
//! Drives the full router against an in-memory SQLite database.

use api_lib::{
    adapters::db::DbAdapter,
    config::Config,
    seed::seed_if_empty,
    web::{router, state::AppState},
};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tower::ServiceExt;

async fn app() -> Router {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let db = Arc::new(DbAdapter::new(pool));
    db.run_migrations().await.unwrap();

    let config = Arc::new(Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "sqlite::memory:".to_string(),
        log_level: tracing::Level::INFO,
        cors_origin: None,
        trending_threshold: 4.3,
        recommendation_count: 8,
        seed_catalog: true,
    });
    let state = Arc::new(AppState::new(db.clone(), db.clone(), config).unwrap());
    seed_if_empty(db.as_ref(), &state.fallback_catalog).await.unwrap();
    router(state)
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

async fn register(app: &Router, email: &str) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/users/register",
        None,
        Some(json!({ "name": "Ada", "email": email, "password": "hunter22" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["token"].as_str().unwrap().to_string()
}

fn titles(books: &Value) -> Vec<String> {
    books
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["title"].as_str().unwrap().to_string())
        .collect()
}

async fn first_book_with_genre(app: &Router, genre: &str) -> Value {
    let (status, books) = call(app, Method::GET, &format!("/api/books/genre/{}", genre), None, None).await;
    assert_eq!(status, StatusCode::OK);
    books[0].clone()
}

#[tokio::test]
async fn registration_login_and_logout() {
    let app = app().await;
    let token = register(&app, "ada@example.com").await;

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/users/register",
        None,
        Some(json!({ "name": "Other", "email": "ada@example.com", "password": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/users/login",
        None,
        Some(json!({ "email": "ada@example.com", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/users/login",
        None,
        Some(json!({ "email": "ada@example.com", "password": "hunter22" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());

    let (status, name) = call(&app, Method::GET, "/api/users/name", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(name["name"], "Ada");

    let (status, _) = call(&app, Method::POST, "/api/users/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, Method::GET, "/api/users/name", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn catalog_lookups() {
    let app = app().await;

    let (status, books) = call(&app, Method::GET, "/api/books", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(books.as_array().unwrap().len(), 36);

    let id = books[0]["id"].as_str().unwrap().to_string();
    let (status, book) = call(&app, Method::GET, &format!("/api/books/{}", id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(book["title"], books[0]["title"]);

    let (status, _) = call(&app, Method::GET, "/api/books/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let missing = format!("/api/books/{}", uuid::Uuid::new_v4());
    let (status, _) = call(&app, Method::GET, &missing, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, found) = call(&app, Method::GET, "/api/books/search?q=HOBBIT", None, None).await;
    assert_eq!(titles(&found), vec!["The Hobbit".to_string()]);
    let (status, found) = call(&app, Method::GET, "/api/books/search?q=h", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found, json!([]));

    let (_, sci_fi) = call(&app, Method::GET, "/api/books/genre/sci-fi", None, None).await;
    assert!(!sci_fi.as_array().unwrap().is_empty());
    assert!(sci_fi
        .as_array()
        .unwrap()
        .iter()
        .all(|b| b["genres"].as_array().unwrap().contains(&json!("sci-fi"))));
}

#[tokio::test]
async fn recommendations_follow_preferences() {
    let app = app().await;

    let (status, trending) = call(&app, Method::GET, "/api/recommendations/trending", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let trending = trending.as_array().unwrap();
    assert_eq!(trending.len(), 8);
    assert!(trending.iter().all(|b| b["rating"].as_f64().unwrap() >= 4.3));

    let (status, _) = call(&app, Method::GET, "/api/recommendations", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = register(&app, "reader@example.com").await;
    let (status, picks) = call(&app, Method::GET, "/api/recommendations", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(picks, json!([]));

    let (status, prefs) = call(
        &app,
        Method::PUT,
        "/api/users/preferences",
        Some(&token),
        Some(json!({ "preferences": ["fantasy"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(prefs, json!(["fantasy"]));

    let (_, feed) = call(&app, Method::GET, "/api/users/notifications", Some(&token), None).await;
    assert_eq!(feed[0]["title"], "Welcome to Booksy!");

    let (_, picks) = call(&app, Method::GET, "/api/recommendations", Some(&token), None).await;
    let picks = picks.as_array().unwrap();
    assert_eq!(picks.len(), 8);
    // The catalog carries seven fantasy titles; all of them rank ahead of the filler.
    assert!(picks[..7]
        .iter()
        .all(|b| b["genres"].as_array().unwrap().contains(&json!("fantasy"))));

    let hobbit = first_book_with_genre(&app, "fantasy").await;
    let uri = format!("/api/recommendations/similar/{}", hobbit["id"].as_str().unwrap());
    let (status, similar) = call(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    let similar = similar.as_array().unwrap();
    assert_eq!(similar.len(), 4);
    assert!(similar.iter().all(|b| b["id"] != hobbit["id"]));

    let (status, list) = call(
        &app,
        Method::GET,
        "/api/recommendations/reading-list",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(list
        .as_array()
        .unwrap()
        .iter()
        .all(|b| b["genres"].as_array().unwrap().contains(&json!("fantasy"))));
}

#[tokio::test]
async fn reading_flow_records_completion_once() {
    let app = app().await;
    let token = register(&app, "finisher@example.com").await;
    let book = first_book_with_genre(&app, "fantasy").await;
    let id = book["id"].as_str().unwrap();

    let progress_uri = format!("/api/users/books/reading/{}/progress", id);
    let (status, _) = call(
        &app,
        Method::PUT,
        &progress_uri,
        Some(&token),
        Some(json!({ "progress": 40 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let start_uri = format!("/api/users/books/reading/{}", id);
    let (status, list) = call(&app, Method::POST, &start_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(list[0]["progress"], 0);
    let (status, list) = call(&app, Method::POST, &start_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, partial) = call(
        &app,
        Method::PUT,
        &progress_uri,
        Some(&token),
        Some(json!({ "progress": 42.5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(partial["progress"], 43);
    assert_eq!(partial["completed"], false);

    let (_, done) = call(
        &app,
        Method::PUT,
        &progress_uri,
        Some(&token),
        Some(json!({ "progress": 150 })),
    )
    .await;
    assert_eq!(done["progress"], 100);
    assert_eq!(done["completed"], true);
    assert!(done["daysToComplete"].as_i64().unwrap() <= 1);

    let (_, again) = call(
        &app,
        Method::PUT,
        &progress_uri,
        Some(&token),
        Some(json!({ "progress": 100 })),
    )
    .await;
    assert_eq!(again["completed"], false);

    let (_, feed) = call(&app, Method::GET, "/api/users/notifications", Some(&token), None).await;
    let feed_titles: Vec<&str> = feed
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["title"].as_str().unwrap())
        .collect();
    assert_eq!(feed_titles, vec!["Book Completed", "Added to Reading List"]);

    let (status, analysis) = call(&app, Method::GET, "/api/users/analysis", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        analysis["insights"][0],
        "You've started reading 1 book and completed 1."
    );
    assert_eq!(analysis["genreCounts"]["fantasy"], 1);
}

#[tokio::test]
async fn saved_books_and_views() {
    let app = app().await;
    let token = register(&app, "saver@example.com").await;
    let book = first_book_with_genre(&app, "mystery").await;
    let save_uri = format!("/api/users/books/save/{}", book["id"].as_str().unwrap());

    let (status, saved) = call(&app, Method::POST, &save_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(saved.as_array().unwrap().len(), 1);
    let (status, _) = call(&app, Method::POST, &save_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app, Method::POST, "/api/users/books/save/nope", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, saved) = call(&app, Method::DELETE, &save_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved, json!([]));

    let view_uri = format!("/api/users/books/view/{}", book["id"].as_str().unwrap());
    let (status, views) = call(&app, Method::POST, &view_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(views["count"], 1);
}

#[tokio::test]
async fn notification_feed_operations() {
    let app = app().await;
    let token = register(&app, "feed@example.com").await;

    let (status, created) = call(
        &app,
        Method::POST,
        "/api/users/notifications",
        Some(&token),
        Some(json!({ "title": "Hello", "message": "First" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["read"], false);
    call(
        &app,
        Method::POST,
        "/api/users/notifications",
        Some(&token),
        Some(json!({ "title": "Hello", "message": "Second" })),
    )
    .await;

    let (_, unread) = call(&app, Method::GET, "/api/users/notifications/unread", Some(&token), None).await;
    assert_eq!(unread["count"], 2);

    let (_, marked) = call(
        &app,
        Method::POST,
        "/api/users/notifications/read",
        Some(&token),
        Some(json!({ "message": "First" })),
    )
    .await;
    assert_eq!(marked["count"], 1);

    let uri = format!("/api/users/notifications/{}/read", created["id"].as_str().unwrap());
    let (_, marked) = call(&app, Method::POST, &uri, Some(&token), None).await;
    assert_eq!(marked["count"], 0);
    let (status, _) = call(&app, Method::POST, "/api/users/notifications/xyz/read", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, Method::DELETE, "/api/users/notifications", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, feed) = call(&app, Method::GET, "/api/users/notifications", Some(&token), None).await;
    assert_eq!(feed, json!([]));
}
