//! crates/bookrec_core/src/catalog.rs
//!
//! The set of books available for recommendation.

use uuid::Uuid;

use crate::domain::Book;
use crate::ports::{PortError, PortResult};

/// Queries shorter than this are not executed.
pub const MIN_SEARCH_LEN: usize = 2;

const BUNDLED_BOOKS: &str = include_str!("../data/books.json");

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    books: Vec<Book>,
}

impl Catalog {
    pub fn new(books: Vec<Book>) -> Self {
        Self { books }
    }

    /// The catalog shipped with the crate. Seeds empty databases and stands in
    /// when the database catalog cannot be read.
    pub fn bundled() -> PortResult<Self> {
        let books: Vec<Book> = serde_json::from_str(BUNDLED_BOOKS)
            .map_err(|e| PortError::Unexpected(format!("Bundled catalog is invalid: {}", e)))?;
        Ok(Self::new(books))
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    pub fn find(&self, id: Uuid) -> Option<&Book> {
        self.books.iter().find(|b| b.id == id)
    }

    pub fn by_genre(&self, genre: &str) -> Vec<Book> {
        self.books
            .iter()
            .filter(|b| b.has_genre(genre))
            .cloned()
            .collect()
    }

    /// Case-insensitive substring match on title, author or any genre tag.
    ///
    /// Returns `None` when the trimmed query is too short to run.
    pub fn search(&self, query: &str) -> Option<Vec<Book>> {
        let query = query.trim().to_lowercase();
        if query.chars().count() < MIN_SEARCH_LEN {
            return None;
        }
        let results = self
            .books
            .iter()
            .filter(|b| {
                b.title.to_lowercase().contains(&query)
                    || b.author.to_lowercase().contains(&query)
                    || b.genres.iter().any(|g| g.to_lowercase().contains(&query))
            })
            .cloned()
            .collect();
        Some(results)
    }
}

impl From<Vec<Book>> for Catalog {
    fn from(books: Vec<Book>) -> Self {
        Self::new(books)
    }
}
