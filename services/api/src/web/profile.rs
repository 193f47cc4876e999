//! services/api/src/web/profile.rs
//!
//! Handlers for the signed-in user's profile: preferences, saved books, the
//! reading list, analysis and the notification feed. Every route here sits
//! behind `require_auth`, which supplies the user id as an extension.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use bookrec_core::analytics::Analysis;
use bookrec_core::domain::{Book, NewNotification, Notification, ReadingListEntry};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::port_failure;
use crate::web::rest::parse_book_id;
use crate::web::state::AppState;

type HandlerResult<T> = Result<T, (StatusCode, String)>;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct PreferencesRequest {
    pub preferences: Vec<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct NameBody {
    pub name: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ProgressRequest {
    /// Percent read; rounded, and values outside 0-100 are clamped.
    pub progress: f64,
}

impl ProgressRequest {
    fn percent(&self) -> i64 {
        self.progress.round() as i64
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    #[serde(flatten)]
    pub entry: ReadingListEntry,
    /// True only on the update that finished the book.
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_to_complete: Option<i64>,
}

#[derive(Deserialize, ToSchema)]
pub struct NotificationRequest {
    pub title: String,
    pub message: String,
}

#[derive(Deserialize, ToSchema)]
pub struct MarkReadRequest {
    pub message: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct CountResponse {
    pub count: usize,
}

//=========================================================================================
// Preferences and Name
//=========================================================================================

#[utoipa::path(get, path = "/api/users/preferences",
    responses((status = 200, description = "Preferred genre tags")))]
pub async fn get_preferences_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> HandlerResult<Json<Vec<String>>> {
    let prefs = state.profiles.preferences(user_id).await.map_err(port_failure)?;
    Ok(Json(prefs))
}

#[utoipa::path(put, path = "/api/users/preferences", request_body = PreferencesRequest,
    responses((status = 200, description = "The stored preference set")))]
pub async fn put_preferences_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<PreferencesRequest>,
) -> HandlerResult<Json<Vec<String>>> {
    let prefs = state
        .profiles
        .set_preferences(user_id, req.preferences, Utc::now())
        .await
        .map_err(port_failure)?;
    Ok(Json(prefs))
}

#[utoipa::path(get, path = "/api/users/name",
    responses((status = 200, description = "Display name", body = NameBody)))]
pub async fn get_name_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> HandlerResult<Json<NameBody>> {
    let name = state.profiles.user_name(user_id).await.map_err(port_failure)?;
    Ok(Json(NameBody { name }))
}

#[utoipa::path(put, path = "/api/users/name", request_body = NameBody,
    responses((status = 200, description = "The stored name; blank input keeps the old one", body = NameBody)))]
pub async fn put_name_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<NameBody>,
) -> HandlerResult<Json<NameBody>> {
    let name = state
        .profiles
        .set_user_name(user_id, &req.name)
        .await
        .map_err(port_failure)?;
    Ok(Json(NameBody { name }))
}

//=========================================================================================
// Saved Books, Reading List and Views
//=========================================================================================

#[utoipa::path(get, path = "/api/users/books/saved",
    responses((status = 200, description = "Saved books in save order")))]
pub async fn saved_books_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> HandlerResult<Json<Vec<Book>>> {
    let saved = state.profiles.saved_books(user_id).await.map_err(port_failure)?;
    Ok(Json(saved))
}

#[utoipa::path(post, path = "/api/users/books/save/{id}",
    params(("id" = String, Path, description = "Book id")),
    responses(
        (status = 201, description = "Saved; body is the saved list"),
        (status = 200, description = "Already saved; body is the saved list"),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "No such book")
    ))]
pub async fn save_book_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<String>,
) -> HandlerResult<impl IntoResponse> {
    let book_id = parse_book_id(&id)?;
    let book = state.find_book(book_id).await.map_err(port_failure)?;
    let added = state
        .profiles
        .save_book(user_id, &book, Utc::now())
        .await
        .map_err(port_failure)?;
    let saved = state.profiles.saved_books(user_id).await.map_err(port_failure)?;
    let status = if added { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(saved)))
}

#[utoipa::path(delete, path = "/api/users/books/save/{id}",
    params(("id" = String, Path, description = "Book id")),
    responses(
        (status = 200, description = "Body is the remaining saved list"),
        (status = 400, description = "Malformed id")
    ))]
pub async fn unsave_book_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<String>,
) -> HandlerResult<Json<Vec<Book>>> {
    let book_id = parse_book_id(&id)?;
    state
        .profiles
        .remove_saved_book(user_id, book_id)
        .await
        .map_err(port_failure)?;
    let saved = state.profiles.saved_books(user_id).await.map_err(port_failure)?;
    Ok(Json(saved))
}

#[utoipa::path(get, path = "/api/users/books/reading",
    responses((status = 200, description = "Reading list with progress")))]
pub async fn reading_list_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> HandlerResult<Json<Vec<ReadingListEntry>>> {
    let list = state.profiles.reading_list(user_id).await.map_err(port_failure)?;
    Ok(Json(list))
}

#[utoipa::path(post, path = "/api/users/books/reading/{id}",
    params(("id" = String, Path, description = "Book id")),
    responses(
        (status = 201, description = "Started; body is the reading list"),
        (status = 200, description = "Already on the list; body is the reading list"),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "No such book")
    ))]
pub async fn start_reading_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<String>,
) -> HandlerResult<impl IntoResponse> {
    let book_id = parse_book_id(&id)?;
    let book = state.find_book(book_id).await.map_err(port_failure)?;
    let added = state
        .profiles
        .start_reading(user_id, &book, Utc::now())
        .await
        .map_err(port_failure)?;
    let list = state.profiles.reading_list(user_id).await.map_err(port_failure)?;
    let status = if added { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(list)))
}

#[utoipa::path(put, path = "/api/users/books/reading/{id}/progress",
    params(("id" = String, Path, description = "Book id")),
    request_body = ProgressRequest,
    responses(
        (status = 200, description = "Updated entry"),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "Book is not on the reading list")
    ))]
pub async fn update_progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<String>,
    Json(req): Json<ProgressRequest>,
) -> HandlerResult<Json<ProgressResponse>> {
    let book_id = parse_book_id(&id)?;
    let update = state
        .profiles
        .update_progress(user_id, book_id, req.percent(), Utc::now())
        .await
        .map_err(port_failure)?;
    Ok(Json(ProgressResponse {
        entry: update.entry,
        completed: update.completion.is_some(),
        days_to_complete: update.completion.map(|s| s.days_to_complete),
    }))
}

#[utoipa::path(post, path = "/api/users/books/view/{id}",
    params(("id" = String, Path, description = "Book id")),
    responses(
        (status = 200, description = "Size of the view history", body = CountResponse),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "No such book")
    ))]
pub async fn record_view_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<String>,
) -> HandlerResult<Json<CountResponse>> {
    let book_id = parse_book_id(&id)?;
    let book = state.find_book(book_id).await.map_err(port_failure)?;
    let count = state
        .profiles
        .record_view(user_id, &book, Utc::now())
        .await
        .map_err(port_failure)?;
    Ok(Json(CountResponse { count }))
}

#[utoipa::path(get, path = "/api/users/analysis",
    responses((status = 200, description = "Genre distribution and insight sentences")))]
pub async fn analysis_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> HandlerResult<Json<Analysis>> {
    let analysis = state
        .profiles
        .analysis(user_id, Utc::now())
        .await
        .map_err(port_failure)?;
    Ok(Json(analysis))
}

//=========================================================================================
// Notifications
//=========================================================================================

#[utoipa::path(get, path = "/api/users/notifications",
    responses((status = 200, description = "Feed, newest first")))]
pub async fn notifications_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> HandlerResult<Json<Vec<Notification>>> {
    let feed = state.profiles.notifications(user_id).await.map_err(port_failure)?;
    Ok(Json(feed))
}

#[utoipa::path(post, path = "/api/users/notifications", request_body = NotificationRequest,
    responses(
        (status = 201, description = "The stored notification"),
        (status = 400, description = "Missing title or message")
    ))]
pub async fn push_notification_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<NotificationRequest>,
) -> HandlerResult<impl IntoResponse> {
    if req.title.trim().is_empty() || req.message.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Notifications need a title and a message".to_string(),
        ));
    }
    let stored = state
        .profiles
        .notify(user_id, NewNotification::new(req.title, req.message, Utc::now()))
        .await
        .map_err(port_failure)?;
    Ok((StatusCode::CREATED, Json(stored)))
}

#[utoipa::path(post, path = "/api/users/notifications/read", request_body = MarkReadRequest,
    responses((status = 200, description = "How many notifications were marked", body = CountResponse)))]
pub async fn mark_read_by_message_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<MarkReadRequest>,
) -> HandlerResult<Json<CountResponse>> {
    let count = state
        .profiles
        .mark_read_by_message(user_id, &req.message)
        .await
        .map_err(port_failure)?;
    Ok(Json(CountResponse { count }))
}

#[utoipa::path(post, path = "/api/users/notifications/{id}/read",
    params(("id" = String, Path, description = "Notification id")),
    responses(
        (status = 200, description = "How many notifications were marked (0 or 1)", body = CountResponse),
        (status = 400, description = "Malformed id")
    ))]
pub async fn mark_read_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<String>,
) -> HandlerResult<Json<CountResponse>> {
    let notification_id = Uuid::parse_str(&id).map_err(|_| {
        (StatusCode::BAD_REQUEST, format!("Invalid notification id '{}'", id))
    })?;
    let marked = state
        .profiles
        .mark_read(user_id, notification_id)
        .await
        .map_err(port_failure)?;
    Ok(Json(CountResponse {
        count: usize::from(marked),
    }))
}

#[utoipa::path(delete, path = "/api/users/notifications",
    responses((status = 204, description = "Feed cleared")))]
pub async fn clear_notifications_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> HandlerResult<StatusCode> {
    state
        .profiles
        .clear_notifications(user_id)
        .await
        .map_err(port_failure)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(get, path = "/api/users/notifications/unread",
    responses((status = 200, description = "Unread count", body = CountResponse)))]
pub async fn unread_count_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> HandlerResult<Json<CountResponse>> {
    let count = state.profiles.unread_count(user_id).await.map_err(port_failure)?;
    Ok(Json(CountResponse { count }))
}
