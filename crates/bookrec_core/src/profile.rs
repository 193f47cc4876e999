//! crates/bookrec_core/src/profile.rs
//!
//! User actions and the state changes they cause.
//!
//! Each public method opens the user's state once and commits everything it
//! changed (reading list, weights, speeds, feed, insights) in a single batch,
//! so a failed store leaves no half-applied action behind. Notifications are
//! pushed straight into the feed by the action that produces them.

use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::analytics::{self, Activity, Analysis, AnalyticsInput, GenreWeights};
use crate::catalog::Catalog;
use crate::domain::{Book, NewNotification, Notification, ReadingListEntry, ReadingSpeedSample};
use crate::history::ViewHistory;
use crate::notifications::{self, NotificationFeed};
use crate::ports::{PortError, PortResult, StateKey, StateStore};
use crate::recommend::Recommender;
use crate::state::{StateRepository, UserState};

pub const DEFAULT_USER_NAME: &str = "Reader";

/// The outcome of a progress write.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub entry: ReadingListEntry,
    /// Set only on the write that moved the book to 100%.
    pub completion: Option<ReadingSpeedSample>,
}

pub struct ProfileService {
    repo: StateRepository,
    recommender: Recommender,
}

impl ProfileService {
    pub fn new(store: Arc<dyn StateStore>, recommender: Recommender) -> Self {
        Self {
            repo: StateRepository::new(store),
            recommender,
        }
    }

    pub fn recommender(&self) -> &Recommender {
        &self.recommender
    }

    // --- Preferences and name ---

    pub async fn preferences(&self, user_id: Uuid) -> PortResult<Vec<String>> {
        self.repo.open(user_id).await.read(StateKey::UserPreferences).await
    }

    /// Replaces the preference set wholesale. Blank and repeated tags are dropped.
    ///
    /// The first non-empty set a user stores also greets them in the feed.
    pub async fn set_preferences(
        &self,
        user_id: Uuid,
        preferences: Vec<String>,
        now: DateTime<Utc>,
    ) -> PortResult<Vec<String>> {
        let mut cleaned: Vec<String> = Vec::with_capacity(preferences.len());
        for pref in preferences {
            let pref = pref.trim().to_string();
            if !pref.is_empty() && !cleaned.contains(&pref) {
                cleaned.push(pref);
            }
        }
        let mut state = self.repo.open(user_id).await;
        let previous: Vec<String> = state.read(StateKey::UserPreferences).await?;
        state.write(StateKey::UserPreferences, &cleaned)?;
        if previous.is_empty() && !cleaned.is_empty() {
            push_notification(&mut state, notifications::welcome(now)).await?;
        }
        state.commit().await?;
        info!(%user_id, count = cleaned.len(), "Preferences updated");
        Ok(cleaned)
    }

    pub async fn user_name(&self, user_id: Uuid) -> PortResult<String> {
        let name: Option<String> = self.repo.open(user_id).await.read(StateKey::UserName).await?;
        Ok(name.unwrap_or_else(|| DEFAULT_USER_NAME.to_string()))
    }

    /// Stores a trimmed display name. A blank name keeps the current one.
    pub async fn set_user_name(&self, user_id: Uuid, name: &str) -> PortResult<String> {
        let mut state = self.repo.open(user_id).await;
        let name = name.trim();
        if name.is_empty() {
            let current: Option<String> = state.read(StateKey::UserName).await?;
            return Ok(current.unwrap_or_else(|| DEFAULT_USER_NAME.to_string()));
        }
        state.write(StateKey::UserName, name)?;
        state.commit().await?;
        Ok(name.to_string())
    }

    // --- Views and saved books ---

    /// Returns the size of the view history after recording.
    pub async fn record_view(&self, user_id: Uuid, book: &Book, now: DateTime<Utc>) -> PortResult<usize> {
        let mut state = self.repo.open(user_id).await;
        let mut views: ViewHistory = state.read(StateKey::BookViewHistory).await?;
        views.record(book, now);
        state.write(StateKey::BookViewHistory, &views)?;
        state.commit().await?;
        Ok(views.len())
    }

    pub async fn view_history(&self, user_id: Uuid) -> PortResult<ViewHistory> {
        self.repo.open(user_id).await.read(StateKey::BookViewHistory).await
    }

    pub async fn saved_books(&self, user_id: Uuid) -> PortResult<Vec<Book>> {
        self.repo.open(user_id).await.read(StateKey::SavedBooks).await
    }

    /// Returns false when the book was already saved; nothing changes then.
    pub async fn save_book(&self, user_id: Uuid, book: &Book, now: DateTime<Utc>) -> PortResult<bool> {
        let mut state = self.repo.open(user_id).await;
        let mut saved: Vec<Book> = state.read(StateKey::SavedBooks).await?;
        if saved.iter().any(|b| b.id == book.id) {
            return Ok(false);
        }
        saved.push(book.clone());
        state.write(StateKey::SavedBooks, &saved)?;

        record_activity(&mut state, &book.genres, Activity::Saved).await?;
        push_notification(
            &mut state,
            NewNotification::new(
                "Book Saved",
                format!("\"{}\" has been added to your saved books.", book.title),
                now,
            ),
        )
        .await?;
        state.commit().await?;
        info!(%user_id, book_id = %book.id, "Book saved");
        Ok(true)
    }

    pub async fn remove_saved_book(&self, user_id: Uuid, book_id: Uuid) -> PortResult<bool> {
        let mut state = self.repo.open(user_id).await;
        let mut saved: Vec<Book> = state.read(StateKey::SavedBooks).await?;
        let before = saved.len();
        saved.retain(|b| b.id != book_id);
        if saved.len() == before {
            return Ok(false);
        }
        state.write(StateKey::SavedBooks, &saved)?;
        state.commit().await?;
        Ok(true)
    }

    // --- Reading list ---

    pub async fn reading_list(&self, user_id: Uuid) -> PortResult<Vec<ReadingListEntry>> {
        self.repo.open(user_id).await.read(StateKey::ReadingList).await
    }

    /// Returns false when the book is already on the reading list.
    pub async fn start_reading(&self, user_id: Uuid, book: &Book, now: DateTime<Utc>) -> PortResult<bool> {
        let mut state = self.repo.open(user_id).await;
        let mut list: Vec<ReadingListEntry> = state.read(StateKey::ReadingList).await?;
        if list.iter().any(|e| e.book.id == book.id) {
            return Ok(false);
        }
        list.push(ReadingListEntry::start(book.clone(), now));
        state.write(StateKey::ReadingList, &list)?;

        record_activity(&mut state, &book.genres, Activity::Started).await?;
        push_notification(
            &mut state,
            NewNotification::new(
                "Added to Reading List",
                format!("You've started reading \"{}\". Enjoy!", book.title),
                now,
            ),
        )
        .await?;
        state.commit().await?;
        info!(%user_id, book_id = %book.id, "Book started");
        Ok(true)
    }

    /// Writes progress (clamped to 0..=100) for a book on the reading list.
    ///
    /// The write that first reaches 100 records the completion: genre weights,
    /// a reading-speed sample, a notification and a fresh analysis. Writing 100
    /// again changes only the last-read time. If the store rejects the batch,
    /// nothing is kept and the same write can be retried.
    pub async fn update_progress(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        progress: i64,
        now: DateTime<Utc>,
    ) -> PortResult<ProgressUpdate> {
        let mut state = self.repo.open(user_id).await;
        let mut list: Vec<ReadingListEntry> = state.read(StateKey::ReadingList).await?;
        let entry = list
            .iter_mut()
            .find(|e| e.book.id == book_id)
            .ok_or_else(|| PortError::NotFound(format!("Book {} is not on the reading list", book_id)))?;

        let was_completed = entry.is_completed();
        entry.progress = progress.clamp(0, 100) as u8;
        entry.last_read = now;
        let entry = entry.clone();
        state.write(StateKey::ReadingList, &list)?;

        let completion = if entry.is_completed() && !was_completed {
            Some(complete(&mut state, &entry, now).await?)
        } else {
            None
        };
        state.commit().await?;
        if let Some(sample) = &completion {
            info!(%user_id, book_id = %book_id, days = sample.days_to_complete, "Book completed");
        }
        Ok(ProgressUpdate { entry, completion })
    }

    // --- Analytics ---

    pub async fn genre_weights(&self, user_id: Uuid) -> PortResult<GenreWeights> {
        self.repo.open(user_id).await.read(StateKey::GenreWeights).await
    }

    pub async fn reading_speeds(&self, user_id: Uuid) -> PortResult<Vec<ReadingSpeedSample>> {
        self.repo.open(user_id).await.read(StateKey::ReadingSpeeds).await
    }

    /// Computes the analysis and caches its insights.
    pub async fn analysis(&self, user_id: Uuid, now: DateTime<Utc>) -> PortResult<Analysis> {
        let mut state = self.repo.open(user_id).await;
        let analysis = refresh_analysis(&mut state, now).await?;
        state.commit().await?;
        Ok(analysis)
    }

    /// The last computed insights, or the welcome set if none were computed yet.
    pub async fn cached_insights(&self, user_id: Uuid) -> PortResult<Vec<String>> {
        let cached: Option<Vec<String>> = self.repo.open(user_id).await.read(StateKey::UserInsights).await?;
        Ok(cached.unwrap_or_else(analytics::welcome_insights))
    }

    // --- Notifications ---

    /// Newest first.
    pub async fn notifications(&self, user_id: Uuid) -> PortResult<Vec<Notification>> {
        let feed: NotificationFeed = self.repo.open(user_id).await.read(StateKey::Notifications).await?;
        Ok(feed.into())
    }

    pub async fn notify(&self, user_id: Uuid, payload: NewNotification) -> PortResult<Notification> {
        let mut state = self.repo.open(user_id).await;
        let notification = push_notification(&mut state, payload).await?;
        state.commit().await?;
        Ok(notification)
    }

    /// Marks unread notifications whose message equals `message` as read.
    pub async fn mark_read_by_message(&self, user_id: Uuid, message: &str) -> PortResult<usize> {
        self.update_feed(user_id, |feed| feed.mark_read_by_message(message)).await
    }

    pub async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> PortResult<bool> {
        self.update_feed(user_id, |feed| feed.mark_read(notification_id)).await
    }

    pub async fn clear_notifications(&self, user_id: Uuid) -> PortResult<()> {
        self.update_feed(user_id, NotificationFeed::clear).await
    }

    pub async fn unread_count(&self, user_id: Uuid) -> PortResult<usize> {
        let feed: NotificationFeed = self.repo.open(user_id).await.read(StateKey::Notifications).await?;
        Ok(feed.unread_count())
    }

    async fn update_feed<R>(&self, user_id: Uuid, f: impl FnOnce(&mut NotificationFeed) -> R) -> PortResult<R> {
        let mut state = self.repo.open(user_id).await;
        let mut feed: NotificationFeed = state.read(StateKey::Notifications).await?;
        let result = f(&mut feed);
        state.write(StateKey::Notifications, &feed)?;
        state.commit().await?;
        Ok(result)
    }

    // --- Recommendations ---

    /// `None` when the user has no preferences yet.
    pub async fn personalized_recommendations<R>(
        &self,
        user_id: Uuid,
        catalog: &Catalog,
        rng: &mut R,
    ) -> PortResult<Option<Vec<Book>>>
    where
        R: Rng + Send + ?Sized,
    {
        let state = self.repo.open(user_id).await;
        let preferences: Vec<String> = state.read(StateKey::UserPreferences).await?;
        let reading_list: Vec<ReadingListEntry> = state.read(StateKey::ReadingList).await?;
        drop(state);

        let picks = self
            .recommender
            .personalized(catalog, &preferences, &reading_list, rng);
        if picks.is_none() {
            debug!(%user_id, "No preferences set; skipping recommendations");
        }
        Ok(picks)
    }

    pub async fn personalized_reading_list<R>(
        &self,
        user_id: Uuid,
        catalog: &Catalog,
        rng: &mut R,
    ) -> PortResult<Vec<Book>>
    where
        R: Rng + Send + ?Sized,
    {
        let state = self.repo.open(user_id).await;
        let preferences: Vec<String> = state.read(StateKey::UserPreferences).await?;
        let reading_list: Vec<ReadingListEntry> = state.read(StateKey::ReadingList).await?;
        drop(state);

        Ok(self
            .recommender
            .reading_list(catalog, &preferences, &reading_list, rng))
    }
}

/// Stages the side effects of finishing a book.
async fn complete(
    state: &mut UserState,
    entry: &ReadingListEntry,
    now: DateTime<Utc>,
) -> PortResult<ReadingSpeedSample> {
    record_activity(state, &entry.book.genres, Activity::Completed).await?;

    let sample = analytics::speed_sample(entry, now);
    let mut speeds: Vec<ReadingSpeedSample> = state.read(StateKey::ReadingSpeeds).await?;
    speeds.push(sample.clone());
    state.write(StateKey::ReadingSpeeds, &speeds)?;

    push_notification(
        state,
        NewNotification::new(
            "Book Completed",
            format!("Congratulations! You've finished reading \"{}\".", entry.book.title),
            now,
        ),
    )
    .await?;
    refresh_analysis(state, now).await?;
    Ok(sample)
}

async fn record_activity(state: &mut UserState, genres: &[String], activity: Activity) -> PortResult<()> {
    let mut weights: GenreWeights = state.read(StateKey::GenreWeights).await?;
    weights.record(genres, activity);
    state.write(StateKey::GenreWeights, &weights)
}

async fn push_notification(state: &mut UserState, payload: NewNotification) -> PortResult<Notification> {
    let mut feed: NotificationFeed = state.read(StateKey::Notifications).await?;
    let notification = feed.push(payload);
    state.write(StateKey::Notifications, &feed)?;
    Ok(notification)
}

async fn refresh_analysis(state: &mut UserState, now: DateTime<Utc>) -> PortResult<Analysis> {
    let reading_list: Vec<ReadingListEntry> = state.read(StateKey::ReadingList).await?;
    let preferences: Vec<String> = state.read(StateKey::UserPreferences).await?;
    let weights: GenreWeights = state.read(StateKey::GenreWeights).await?;
    let speeds: Vec<ReadingSpeedSample> = state.read(StateKey::ReadingSpeeds).await?;

    let analysis = analytics::analyze(
        &AnalyticsInput {
            reading_list: &reading_list,
            preferences: &preferences,
            weights: &weights,
            speeds: &speeds,
        },
        now,
    );
    state.write(StateKey::UserInsights, &analysis.insights)?;
    Ok(analysis)
}
