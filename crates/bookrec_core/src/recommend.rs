//! crates/bookrec_core/src/recommend.rs
//!
//! The recommendation engine: preference scoring, similarity ranking, trending
//! picks and the personalized reading list.
//!
//! The personalized, trending and reading-list modes shuffle their
//! candidate set so repeated visits show some variety. The randomness source is
//! passed in by the caller; seed it to get reproducible output.
//!
//! In the personalized mode the shuffle breaks ties between candidates matching
//! the same number of preferred genres: a candidate matching more preferences
//! is always shown before one matching fewer.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::domain::{Book, ReadingListEntry};

pub const DEFAULT_TRENDING_THRESHOLD: f64 = 4.3;

#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationConfig {
    /// How many books a recommendation panel shows.
    pub display_count: usize,
    /// How many top-scored books enter the shuffle in the personalized mode.
    pub candidate_pool: usize,
    /// Minimum rating for a book to count as trending.
    pub trending_threshold: f64,
    pub similar_count: usize,
    /// How many top-rated books enter the shuffle in the reading-list mode.
    pub reading_list_pool: usize,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            display_count: 8,
            candidate_pool: 12,
            trending_threshold: DEFAULT_TRENDING_THRESHOLD,
            similar_count: 4,
            reading_list_pool: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredBook {
    pub book: Book,
    /// Number of distinct preferred genres the book carries.
    pub matches: usize,
    pub score: f64,
}

fn preference_matches(book: &Book, preferences: &HashSet<&str>) -> usize {
    let genres: HashSet<&str> = book.genres.iter().map(String::as_str).collect();
    genres.intersection(preferences).count()
}

/// `2 * |genres ∩ preferences| + (rating - 3)`.
pub fn score(book: &Book, preferences: &HashSet<&str>) -> f64 {
    2.0 * preference_matches(book, preferences) as f64 + (book.rating - 3.0)
}

fn shared_genres(a: &Book, b: &Book) -> usize {
    a.genres.iter().filter(|g| b.has_genre(g)).count()
}

fn read_ids(reading_list: &[ReadingListEntry]) -> HashSet<Uuid> {
    reading_list.iter().map(|e| e.book.id).collect()
}

#[derive(Debug, Clone, Default)]
pub struct Recommender {
    config: RecommendationConfig,
}

impl Recommender {
    pub fn new(config: RecommendationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RecommendationConfig {
        &self.config
    }

    /// Scores every book not in the reading list and sorts by score,
    /// highest first. Equal scores keep catalog order.
    pub fn rank(
        &self,
        catalog: &Catalog,
        preferences: &[String],
        reading_list: &[ReadingListEntry],
    ) -> Vec<ScoredBook> {
        let read = read_ids(reading_list);
        let preferences: HashSet<&str> = preferences.iter().map(String::as_str).collect();

        let mut scored: Vec<ScoredBook> = catalog
            .books()
            .iter()
            .filter(|b| !read.contains(&b.id))
            .map(|b| {
                let matches = preference_matches(b, &preferences);
                ScoredBook {
                    score: 2.0 * matches as f64 + (b.rating - 3.0),
                    matches,
                    book: b.clone(),
                }
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored
    }

    /// Personalized picks for a preference set.
    ///
    /// Returns `None` when there are no preferences to score against.
    pub fn personalized<R>(
        &self,
        catalog: &Catalog,
        preferences: &[String],
        reading_list: &[ReadingListEntry],
        rng: &mut R,
    ) -> Option<Vec<Book>>
    where
        R: Rng + ?Sized,
    {
        if preferences.is_empty() {
            return None;
        }

        let mut candidates: Vec<ScoredBook> = self
            .rank(catalog, preferences, reading_list)
            .into_iter()
            .take(self.config.candidate_pool)
            .collect();
        candidates.shuffle(rng);
        candidates.sort_by(|a, b| b.matches.cmp(&a.matches));
        Some(
            candidates
                .into_iter()
                .take(self.config.display_count)
                .map(|s| s.book)
                .collect(),
        )
    }

    /// Books sharing genres with `book`, most shared genres first, then by
    /// rating. Deterministic.
    pub fn similar(&self, catalog: &Catalog, book: &Book) -> Vec<Book> {
        let mut matches: Vec<(usize, &Book)> = catalog
            .books()
            .iter()
            .filter(|b| b.id != book.id)
            .map(|b| (shared_genres(b, book), b))
            .filter(|(shared, _)| *shared > 0)
            .collect();
        matches.sort_by(|(sa, a), (sb, b)| sb.cmp(sa).then(b.rating.total_cmp(&a.rating)));
        matches
            .into_iter()
            .take(self.config.similar_count)
            .map(|(_, b)| b.clone())
            .collect()
    }

    pub fn trending<R>(&self, catalog: &Catalog, rng: &mut R) -> Vec<Book>
    where
        R: Rng + ?Sized,
    {
        let mut picks: Vec<Book> = catalog
            .books()
            .iter()
            .filter(|b| b.rating >= self.config.trending_threshold)
            .cloned()
            .collect();
        picks.shuffle(rng);
        picks.truncate(self.config.display_count);
        picks
    }

    /// Unread books in any preferred genre, drawn from the highest rated.
    pub fn reading_list<R>(
        &self,
        catalog: &Catalog,
        preferences: &[String],
        reading_list: &[ReadingListEntry],
        rng: &mut R,
    ) -> Vec<Book>
    where
        R: Rng + ?Sized,
    {
        let read = read_ids(reading_list);
        let mut picks: Vec<Book> = catalog
            .books()
            .iter()
            .filter(|b| !read.contains(&b.id))
            .filter(|b| preferences.iter().any(|p| b.has_genre(p)))
            .cloned()
            .collect();
        picks.sort_by(|a, b| b.rating.total_cmp(&a.rating));
        picks.truncate(self.config.reading_list_pool);
        picks.shuffle(rng);
        picks.truncate(self.config.display_count);
        picks
    }
}
