//! crates/bookrec_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

use crate::domain::{Book, User, UserCredentials};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Already exists: {0}")]
    Conflict(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Persisted User State Keys
//=========================================================================================

/// The keys under which per-user state is persisted. Every value is JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    UserPreferences,
    GenreWeights,
    ReadingList,
    BookViewHistory,
    ReadingSpeeds,
    SavedBooks,
    Notifications,
    UserInsights,
    UserName,
}

impl StateKey {
    pub fn as_str(self) -> &'static str {
        match self {
            StateKey::UserPreferences => "userPreferences",
            StateKey::GenreWeights => "genreWeights",
            StateKey::ReadingList => "readingList",
            StateKey::BookViewHistory => "bookViewHistory",
            StateKey::ReadingSpeeds => "readingSpeeds",
            StateKey::SavedBooks => "savedBooks",
            StateKey::Notifications => "notifications",
            StateKey::UserInsights => "userInsights",
            StateKey::UserName => "userName",
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Raw key-value storage for per-user state.
///
/// Implementations only move strings around; decoding, defaults and atomic
/// read-modify-write live in [`crate::state::StateRepository`].
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, user_id: Uuid, key: StateKey) -> PortResult<Option<String>>;

    async fn save(&self, user_id: Uuid, key: StateKey, value: &str) -> PortResult<()>;

    /// Stores every entry or none of them.
    async fn save_many(&self, user_id: Uuid, entries: &[(StateKey, String)]) -> PortResult<()>;
}

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    async fn create_user(
        &self,
        name: &str,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User>;

    async fn get_user(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    // --- Auth Methods ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Catalog ---
    async fn list_books(&self) -> PortResult<Vec<Book>>;

    async fn get_book(&self, book_id: Uuid) -> PortResult<Book>;

    async fn list_books_by_genre(&self, genre: &str) -> PortResult<Vec<Book>>;

    async fn insert_books(&self, books: &[Book]) -> PortResult<usize>;

    async fn count_books(&self) -> PortResult<i64>;
}
