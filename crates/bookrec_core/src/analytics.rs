//! crates/bookrec_core/src/analytics.rs
//!
//! Derives reading insights and a genre distribution from a user's history.

use chrono::{DateTime, Duration, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;

use crate::domain::{ReadingListEntry, ReadingSpeedSample};

const MS_PER_DAY: f64 = 24.0 * 60.0 * 60.0 * 1000.0;
const RECENT_WINDOW_DAYS: i64 = 30;

//=========================================================================================
// Genre Weights
//=========================================================================================

/// A user action that signals interest in a book's genres.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Saved,
    Started,
    Completed,
}

impl Activity {
    pub fn weight(self) -> u64 {
        match self {
            Activity::Saved => 2,
            Activity::Started => 3,
            Activity::Completed => 4,
        }
    }
}

/// A genre to number map kept in first-seen order. Serializes as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenreTally {
    entries: Vec<(String, u64)>,
}

/// Accumulated interest per genre. Weights only ever grow.
pub type GenreWeights = GenreTally;

/// How often each genre appears across the reading list.
pub type GenreCounts = GenreTally;

impl GenreTally {
    pub fn get(&self, genre: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(g, _)| g == genre)
            .map(|(_, w)| *w)
    }

    pub fn add(&mut self, genre: &str, amount: u64) {
        match self.entries.iter_mut().find(|(g, _)| g == genre) {
            Some((_, weight)) => *weight = weight.saturating_add(amount),
            None => self.entries.push((genre.to_string(), amount)),
        }
    }

    pub fn record(&mut self, genres: &[String], activity: Activity) {
        for genre in genres {
            self.add(genre, activity.weight());
        }
    }

    /// The heaviest genre; on equal weight the one seen first wins.
    pub fn favorite(&self) -> Option<&str> {
        let mut best: Option<&(String, u64)> = None;
        for entry in &self.entries {
            if best.map_or(true, |(_, w)| entry.1 > *w) {
                best = Some(entry);
            }
        }
        best.map(|(g, _)| g.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(g, w)| (g.as_str(), *w))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for GenreTally {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (genre, weight) in &self.entries {
            map.serialize_entry(genre, weight)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for GenreTally {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TallyVisitor;

        impl<'de> Visitor<'de> for TallyVisitor {
            type Value = GenreTally;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of genre to number")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut tally = GenreTally::default();
                while let Some((genre, value)) = access.next_entry::<String, u64>()? {
                    tally.add(&genre, value);
                }
                Ok(tally)
            }
        }

        deserializer.deserialize_map(TallyVisitor)
    }
}

//=========================================================================================
// Reading Speed
//=========================================================================================

/// Whole days from start to `completed_at`, rounded up.
pub fn days_to_complete(entry: &ReadingListEntry, completed_at: DateTime<Utc>) -> i64 {
    let elapsed = (completed_at - entry.started_at).num_milliseconds() as f64;
    (elapsed / MS_PER_DAY).ceil() as i64
}

pub fn speed_sample(entry: &ReadingListEntry, completed_at: DateTime<Utc>) -> ReadingSpeedSample {
    ReadingSpeedSample {
        book_id: entry.book.id,
        title: entry.book.title.clone(),
        days_to_complete: days_to_complete(entry, completed_at),
        timestamp: completed_at,
    }
}

//=========================================================================================
// Insights
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub genre_counts: GenreCounts,
    pub insights: Vec<String>,
}

pub struct AnalyticsInput<'a> {
    pub reading_list: &'a [ReadingListEntry],
    pub preferences: &'a [String],
    pub weights: &'a GenreWeights,
    pub speeds: &'a [ReadingSpeedSample],
}

pub fn analyze(input: &AnalyticsInput<'_>, now: DateTime<Utc>) -> Analysis {
    Analysis {
        genre_counts: genre_distribution(input.reading_list),
        insights: generate_insights(input, now),
    }
}

/// Shown before any analysis has run.
pub fn welcome_insights() -> Vec<String> {
    vec![
        "Welcome to your reading analysis! Start reading books to see personalized insights.".to_string(),
        "We'll analyze your reading patterns to help you discover new books you'll love.".to_string(),
        "Your preferences will help us tailor recommendations just for you.".to_string(),
    ]
}

/// Occurrences of each genre across the reading list, in first-seen order.
pub fn genre_distribution(reading_list: &[ReadingListEntry]) -> GenreCounts {
    let mut counts = GenreCounts::default();
    for genre in reading_list.iter().flat_map(|e| &e.book.genres) {
        counts.add(genre, 1);
    }
    counts
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

pub fn generate_insights(input: &AnalyticsInput<'_>, now: DateTime<Utc>) -> Vec<String> {
    let history = input.reading_list;
    if history.is_empty() {
        return vec![
            "Start your reading journey by adding books to your reading list!".to_string(),
            "Your personalized insights will appear here as you read more books.".to_string(),
            "We'll analyze your reading patterns to help you discover new favorites.".to_string(),
        ];
    }

    let mut insights = Vec::new();

    let started = history.len();
    let completed = history.iter().filter(|e| e.is_completed()).count();
    insights.push(format!(
        "You've started reading {} book{} and completed {}.",
        started,
        plural(started),
        completed
    ));

    if let Some(genre) = input.weights.favorite() {
        insights.push(format!(
            "Your favorite genre appears to be {}.",
            format_genre_name(genre)
        ));
    }

    if !input.speeds.is_empty() {
        let total: i64 = input.speeds.iter().map(|s| s.days_to_complete).sum();
        let avg = total as f64 / input.speeds.len() as f64;
        let days = avg.round();
        insights.push(if avg < 7.0 {
            format!("You're a fast reader! You finish books in about {} days on average.", days)
        } else if avg < 14.0 {
            format!(
                "You have a steady reading pace, finishing books in about {} days on average.",
                days
            )
        } else {
            format!(
                "You take your time with books, spending about {} days to complete each one.",
                days
            )
        });
    }

    let cutoff = now - Duration::days(RECENT_WINDOW_DAYS);
    let recent = history.iter().filter(|e| e.last_read > cutoff).count();
    if recent > 0 {
        insights.push(format!(
            "You've been active with {} book{} in the past month.",
            recent,
            plural(recent)
        ));
    } else {
        insights.push(
            "It's been a while since you last read. Why not pick up where you left off?".to_string(),
        );
    }

    let genres: HashSet<&str> = history
        .iter()
        .flat_map(|e| e.book.genres.iter().map(String::as_str))
        .collect();
    if genres.len() > 3 {
        insights.push(format!(
            "You have diverse reading tastes, exploring {} different genres!",
            genres.len()
        ));
    } else if genres.len() > 1 {
        insights.push(format!(
            "You've explored {} genres so far. Consider branching out to discover new favorites!",
            genres.len()
        ));
    }

    let underexplored = input
        .preferences
        .iter()
        .find(|p| input.weights.get(p).map_or(true, |w| w < 2));
    if let Some(pref) = underexplored {
        let genre = format_genre_name(pref);
        insights.push(format!(
            "You've shown interest in {} but haven't read much in this genre. Try exploring more {} books!",
            genre, genre
        ));
    }

    insights
}

/// `"sci-fi"` becomes `"Sci Fi"`.
pub fn format_genre_name(genre: &str) -> String {
    genre
        .split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
