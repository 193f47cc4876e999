//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the catalog and recommendation endpoints and
//! the master definition for the OpenAPI specification.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use bookrec_core::domain::Book;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::{IntoParams, OpenApi};
use uuid::Uuid;

use crate::error::port_failure;
use crate::web::{auth, profile, state::AppState};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register_handler,
        auth::login_handler,
        auth::logout_handler,
        list_books_handler,
        get_book_handler,
        books_by_genre_handler,
        search_books_handler,
        trending_handler,
        personalized_handler,
        reading_list_recommendations_handler,
        similar_handler,
        profile::get_preferences_handler,
        profile::put_preferences_handler,
        profile::get_name_handler,
        profile::put_name_handler,
        profile::saved_books_handler,
        profile::save_book_handler,
        profile::unsave_book_handler,
        profile::reading_list_handler,
        profile::start_reading_handler,
        profile::update_progress_handler,
        profile::record_view_handler,
        profile::analysis_handler,
        profile::notifications_handler,
        profile::push_notification_handler,
        profile::mark_read_by_message_handler,
        profile::mark_read_handler,
        profile::clear_notifications_handler,
        profile::unread_count_handler,
    ),
    components(
        schemas(
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            profile::PreferencesRequest,
            profile::NameBody,
            profile::ProgressRequest,
            profile::NotificationRequest,
            profile::MarkReadRequest,
            profile::CountResponse,
        )
    ),
    tags(
        (name = "Book Recommendations API", description = "Catalog, recommendations and reading analytics.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Shared Helpers
//=========================================================================================

/// Parses a path id, answering 400 before any store is touched.
pub(crate) fn parse_book_id(raw: &str) -> Result<Uuid, (StatusCode, String)> {
    Uuid::parse_str(raw).map_err(|_| (StatusCode::BAD_REQUEST, format!("Invalid book id '{}'", raw)))
}

#[derive(Deserialize, IntoParams)]
pub struct SearchParams {
    /// Matched against title, author and genre tags.
    #[serde(default)]
    pub q: String,
}

//=========================================================================================
// Catalog Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/api/books",
    responses((status = 200, description = "Every book in catalog order"))
)]
pub async fn list_books_handler(State(state): State<Arc<AppState>>) -> Json<Vec<Book>> {
    Json(state.catalog().await.books().to_vec())
}

#[utoipa::path(
    get,
    path = "/api/books/{id}",
    params(("id" = String, Path, description = "Book id")),
    responses(
        (status = 200, description = "The book"),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "No such book")
    )
)]
pub async fn get_book_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Book>, (StatusCode, String)> {
    let book_id = parse_book_id(&id)?;
    let book = state.find_book(book_id).await.map_err(port_failure)?;
    Ok(Json(book))
}

#[utoipa::path(
    get,
    path = "/api/books/genre/{genre}",
    params(("genre" = String, Path, description = "Exact genre tag, e.g. sci-fi")),
    responses((status = 200, description = "Books carrying the tag"))
)]
pub async fn books_by_genre_handler(
    State(state): State<Arc<AppState>>,
    Path(genre): Path<String>,
) -> Json<Vec<Book>> {
    Json(state.books_by_genre(&genre).await)
}

#[utoipa::path(
    get,
    path = "/api/books/search",
    params(SearchParams),
    responses((status = 200, description = "Matching books; empty for queries under two characters"))
)]
pub async fn search_books_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<Book>> {
    let results = state.catalog().await.search(&params.q).unwrap_or_default();
    Json(results)
}

//=========================================================================================
// Recommendation Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/api/recommendations/trending",
    responses((status = 200, description = "Highly rated books in random order"))
)]
pub async fn trending_handler(State(state): State<Arc<AppState>>) -> Json<Vec<Book>> {
    let catalog = state.catalog().await;
    let mut rng = StdRng::from_os_rng();
    Json(state.profiles.recommender().trending(&catalog, &mut rng))
}

#[utoipa::path(
    get,
    path = "/api/recommendations",
    responses(
        (status = 200, description = "Personalized picks; empty when no preferences are set"),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn personalized_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let catalog = state.catalog().await;
    let mut rng = StdRng::from_os_rng();
    let picks = state
        .profiles
        .personalized_recommendations(user_id, &catalog, &mut rng)
        .await
        .map_err(port_failure)?;
    Ok(Json(picks.unwrap_or_default()))
}

#[utoipa::path(
    get,
    path = "/api/recommendations/reading-list",
    responses(
        (status = 200, description = "Unread, highly rated books in preferred genres"),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn reading_list_recommendations_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let catalog = state.catalog().await;
    let mut rng = StdRng::from_os_rng();
    let picks = state
        .profiles
        .personalized_reading_list(user_id, &catalog, &mut rng)
        .await
        .map_err(port_failure)?;
    Ok(Json(picks))
}

#[utoipa::path(
    get,
    path = "/api/recommendations/similar/{id}",
    params(("id" = String, Path, description = "Book id")),
    responses(
        (status = 200, description = "Books sharing the most genres"),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "No such book")
    )
)]
pub async fn similar_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Book>>, (StatusCode, String)> {
    let book_id = parse_book_id(&id)?;
    let book = state.find_book(book_id).await.map_err(port_failure)?;
    let catalog = state.catalog().await;
    Ok(Json(state.profiles.recommender().similar(&catalog, &book)))
}
