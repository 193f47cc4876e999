//! crates/bookrec_core/src/domain.rs
//!
//! Defines the core data structures for the application.
//! Field names serialize in camelCase so persisted user state keeps the same
//! JSON shape regardless of which store holds it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An immutable catalog record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub description: String,
    pub cover_image: String,
    /// Average rating on a 0-5 scale.
    pub rating: f64,
    pub genres: Vec<String>,
    pub publication_year: i32,
    pub publisher: String,
}

impl Book {
    pub fn has_genre(&self, genre: &str) -> bool {
        self.genres.iter().any(|g| g == genre)
    }
}

/// A book the user has started, with progress tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingListEntry {
    #[serde(flatten)]
    pub book: Book,
    /// Percent read, always within 0..=100.
    pub progress: u8,
    pub started_at: DateTime<Utc>,
    pub last_read: DateTime<Utc>,
}

impl ReadingListEntry {
    pub fn start(book: Book, now: DateTime<Utc>) -> Self {
        Self {
            book,
            progress: 0,
            started_at: now,
            last_read: now,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.progress == 100
    }
}

/// Recorded once per completed book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingSpeedSample {
    pub book_id: Uuid,
    pub title: String,
    pub days_to_complete: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookView {
    pub book_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub genres: Vec<String>,
}

/// A user-facing event message held in the notification feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub time: DateTime<Utc>,
    pub read: bool,
}

/// The payload a producer hands to the feed; the feed assigns id and read flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub time: DateTime<Utc>,
}

impl NewNotification {
    pub fn new(title: impl Into<String>, message: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            time,
        }
    }
}

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}
