//! crates/bookrec_core/src/history.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::domain::{Book, BookView};

pub const VIEW_HISTORY_CAPACITY: usize = 100;

/// Oldest-first log of book views holding at most [`VIEW_HISTORY_CAPACITY`] items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<BookView>", into = "Vec<BookView>")]
pub struct ViewHistory {
    views: VecDeque<BookView>,
}

impl ViewHistory {
    pub fn record(&mut self, book: &Book, now: DateTime<Utc>) {
        self.views.push_back(BookView {
            book_id: book.id,
            timestamp: now,
            genres: book.genres.clone(),
        });
        while self.views.len() > VIEW_HISTORY_CAPACITY {
            self.views.pop_front();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &BookView> {
        self.views.iter()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

impl From<Vec<BookView>> for ViewHistory {
    fn from(views: Vec<BookView>) -> Self {
        let skip = views.len().saturating_sub(VIEW_HISTORY_CAPACITY);
        Self {
            views: views.into_iter().skip(skip).collect(),
        }
    }
}

impl From<ViewHistory> for Vec<BookView> {
    fn from(history: ViewHistory) -> Self {
        history.views.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn book(n: usize) -> Book {
        Book {
            id: Uuid::new_v4(),
            title: format!("Book {n}"),
            author: "Author".to_string(),
            description: String::new(),
            cover_image: String::new(),
            rating: 4.0,
            genres: vec!["fantasy".to_string()],
            publication_year: 1999,
            publisher: "Publisher".to_string(),
        }
    }

    #[test]
    fn evicts_oldest_past_capacity() {
        let books: Vec<Book> = (0..105).map(book).collect();
        let mut history = ViewHistory::default();
        for b in &books {
            history.record(b, Utc::now());
        }

        assert_eq!(history.len(), VIEW_HISTORY_CAPACITY);
        assert_eq!(history.iter().next().unwrap().book_id, books[5].id);
        assert_eq!(history.iter().last().unwrap().book_id, books[104].id);
    }

    #[test]
    fn snapshots_genres_at_view_time() {
        let mut b = book(1);
        let mut history = ViewHistory::default();
        history.record(&b, Utc::now());
        b.genres.push("horror".to_string());

        assert_eq!(history.iter().next().unwrap().genres, vec!["fantasy".to_string()]);
    }

    #[test]
    fn oversized_persisted_history_keeps_newest() {
        let now = Utc::now();
        let views: Vec<BookView> = (0..150)
            .map(|_| BookView {
                book_id: Uuid::new_v4(),
                timestamp: now,
                genres: Vec::new(),
            })
            .collect();
        let newest = views[149].book_id;

        let history: ViewHistory = serde_json::from_value(serde_json::to_value(&views).unwrap()).unwrap();
        assert_eq!(history.len(), VIEW_HISTORY_CAPACITY);
        assert_eq!(history.iter().last().unwrap().book_id, newest);
    }
}
