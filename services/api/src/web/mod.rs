//! services/api/src/web/mod.rs
//!
//! HTTP surface: route table, handlers and the shared state they run against.

pub mod auth;
pub mod middleware;
pub mod profile;
pub mod protocol;
pub mod rest;
pub mod session_jobs;
pub mod state;
pub mod ws_handler;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

pub use middleware::require_auth;
pub use state::AppState;
pub use ws_handler::ws_search_handler;

/// Builds the API router. CORS and Swagger UI are layered on by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/api/users/register", post(auth::register_handler))
        .route("/api/users/login", post(auth::login_handler))
        .route("/api/users/logout", post(auth::logout_handler))
        .route("/api/books", get(rest::list_books_handler))
        .route("/api/books/search", get(rest::search_books_handler))
        .route("/api/books/genre/{genre}", get(rest::books_by_genre_handler))
        .route("/api/books/{id}", get(rest::get_book_handler))
        .route("/api/recommendations/trending", get(rest::trending_handler))
        .route("/api/recommendations/similar/{id}", get(rest::similar_handler))
        .route("/ws/search", get(ws_search_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/api/recommendations", get(rest::personalized_handler))
        .route(
            "/api/recommendations/reading-list",
            get(rest::reading_list_recommendations_handler),
        )
        .route(
            "/api/users/preferences",
            get(profile::get_preferences_handler).put(profile::put_preferences_handler),
        )
        .route(
            "/api/users/name",
            get(profile::get_name_handler).put(profile::put_name_handler),
        )
        .route("/api/users/books/saved", get(profile::saved_books_handler))
        .route(
            "/api/users/books/save/{id}",
            post(profile::save_book_handler).delete(profile::unsave_book_handler),
        )
        .route("/api/users/books/reading", get(profile::reading_list_handler))
        .route("/api/users/books/reading/{id}", post(profile::start_reading_handler))
        .route(
            "/api/users/books/reading/{id}/progress",
            put(profile::update_progress_handler),
        )
        .route("/api/users/books/view/{id}", post(profile::record_view_handler))
        .route("/api/users/analysis", get(profile::analysis_handler))
        .route(
            "/api/users/notifications",
            get(profile::notifications_handler)
                .post(profile::push_notification_handler)
                .delete(profile::clear_notifications_handler),
        )
        .route(
            "/api/users/notifications/read",
            post(profile::mark_read_by_message_handler),
        )
        .route(
            "/api/users/notifications/{id}/read",
            post(profile::mark_read_handler),
        )
        .route(
            "/api/users/notifications/unread",
            get(profile::unread_count_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(app_state)
}
