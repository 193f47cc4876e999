//! crates/bookrec_core/src/notifications.rs
//!
//! The bounded notification feed and the automated notices scheduled once per
//! session.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{NewNotification, Notification};

pub const FEED_CAPACITY: usize = 20;

/// Newest-first list of notifications holding at most [`FEED_CAPACITY`] items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Notification>", into = "Vec<Notification>")]
pub struct NotificationFeed {
    items: VecDeque<Notification>,
}

impl NotificationFeed {
    /// Inserts at the head, evicting the oldest entry when full.
    pub fn push(&mut self, payload: NewNotification) -> Notification {
        let notification = Notification {
            id: Uuid::new_v4(),
            title: payload.title,
            message: payload.message,
            time: payload.time,
            read: false,
        };
        self.items.push_front(notification.clone());
        self.items.truncate(FEED_CAPACITY);
        notification
    }

    /// Marks every unread entry whose message equals `message` as read.
    pub fn mark_read_by_message(&mut self, message: &str) -> usize {
        let mut marked = 0;
        for n in self.items.iter_mut().filter(|n| !n.read && n.message == message) {
            n.read = true;
            marked += 1;
        }
        marked
    }

    pub fn mark_read(&mut self, id: Uuid) -> bool {
        match self.items.iter_mut().find(|n| n.id == id) {
            Some(n) if !n.read => {
                n.read = true;
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.read).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl From<Vec<Notification>> for NotificationFeed {
    fn from(mut items: Vec<Notification>) -> Self {
        items.truncate(FEED_CAPACITY);
        Self {
            items: items.into(),
        }
    }
}

impl From<NotificationFeed> for Vec<Notification> {
    fn from(feed: NotificationFeed) -> Self {
        feed.items.into()
    }
}

//=========================================================================================
// Automated Notices
//=========================================================================================

/// Background notices fired once per session after a randomized delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutomatedNotice {
    NewBook,
    ReadingReminder,
    AnalysisReady,
}

impl AutomatedNotice {
    pub const ALL: [AutomatedNotice; 3] = [
        AutomatedNotice::NewBook,
        AutomatedNotice::ReadingReminder,
        AutomatedNotice::AnalysisReady,
    ];

    /// Delay window in minutes.
    fn window_minutes(self) -> (f64, f64) {
        match self {
            AutomatedNotice::NewBook => (6.0, 10.0),
            AutomatedNotice::ReadingReminder => (2.0, 5.0),
            AutomatedNotice::AnalysisReady => (7.0, 12.0),
        }
    }

    pub fn pick_delay<R>(self, rng: &mut R) -> Duration
    where
        R: Rng + ?Sized,
    {
        let (min, max) = self.window_minutes();
        Duration::from_secs_f64(rng.random_range(min..max) * 60.0)
    }

    pub fn payload(self, now: DateTime<Utc>) -> NewNotification {
        match self {
            AutomatedNotice::NewBook => NewNotification::new(
                "New Book Available",
                "A new book matching your preferences is now available!",
                now,
            ),
            AutomatedNotice::ReadingReminder => NewNotification::new(
                "Reading Reminder",
                "Continue your reading journey with books from your list!",
                now,
            ),
            AutomatedNotice::AnalysisReady => NewNotification::new(
                "Reading Analysis Updated",
                "We've analyzed your reading patterns. Check out your insights!",
                now,
            ),
        }
    }

    /// Whether delivering this notice should also recompute the user's analysis.
    pub fn refreshes_analysis(self) -> bool {
        matches!(self, AutomatedNotice::AnalysisReady)
    }
}

/// How often a signed-in user's recommendations are recomputed.
pub const RECOMMENDATION_REFRESH_PERIOD: Duration = Duration::from_secs(60 * 60);

/// Chance that a refresh announces itself in the feed.
pub const RECOMMENDATION_NOTICE_PROBABILITY: f64 = 0.3;

pub fn recommendations_updated(now: DateTime<Utc>) -> NewNotification {
    NewNotification::new(
        "New Recommendations",
        "We've updated your recommendations based on your preferences.",
        now,
    )
}

/// Sent the first time a user picks their favourite genres.
pub fn welcome(now: DateTime<Utc>) -> NewNotification {
    NewNotification::new(
        "Welcome to Booksy!",
        "We've prepared some book recommendations just for you.",
        now,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn payload(message: &str) -> NewNotification {
        NewNotification::new("Title", message, Utc::now())
    }

    #[test]
    fn push_inserts_unread_at_head() {
        let mut feed = NotificationFeed::default();
        feed.push(payload("first"));
        let second = feed.push(payload("second"));

        let messages: Vec<&str> = feed.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, ["second", "first"]);
        assert!(!second.read);
        assert_eq!(feed.unread_count(), 2);
    }

    #[test]
    fn feed_never_exceeds_capacity_and_drops_oldest() {
        let mut feed = NotificationFeed::default();
        for i in 0..25 {
            feed.push(payload(&format!("n{i}")));
        }
        assert_eq!(feed.len(), FEED_CAPACITY);
        assert_eq!(feed.iter().next().unwrap().message, "n24");
        assert_eq!(feed.iter().last().unwrap().message, "n5");
    }

    #[test]
    fn ids_are_unique() {
        let mut feed = NotificationFeed::default();
        let a = feed.push(payload("same"));
        let b = feed.push(payload("same"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn mark_read_by_message_touches_only_matching_unread() {
        let mut feed = NotificationFeed::default();
        feed.push(payload("hello"));
        feed.push(payload("other"));
        feed.push(payload("hello"));

        assert_eq!(feed.mark_read_by_message("hello"), 2);
        assert_eq!(feed.unread_count(), 1);
        assert_eq!(feed.mark_read_by_message("hello"), 0);
    }

    #[test]
    fn mark_read_by_id() {
        let mut feed = NotificationFeed::default();
        let a = feed.push(payload("same"));
        feed.push(payload("same"));

        assert!(feed.mark_read(a.id));
        assert!(!feed.mark_read(a.id));
        assert!(!feed.mark_read(Uuid::new_v4()));
        assert_eq!(feed.unread_count(), 1);
    }

    #[test]
    fn clear_empties_the_feed() {
        let mut feed = NotificationFeed::default();
        feed.push(payload("x"));
        feed.clear();
        assert!(feed.is_empty());
        assert_eq!(feed.unread_count(), 0);
    }

    #[test]
    fn oversized_persisted_feed_is_trimmed_on_load() {
        let mut feed = NotificationFeed::default();
        for i in 0..20 {
            feed.push(payload(&format!("n{i}")));
        }
        let mut raw: Vec<Notification> = feed.into();
        raw.extend(raw.clone());
        let json = serde_json::to_string(&raw).unwrap();

        let loaded: NotificationFeed = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.len(), FEED_CAPACITY);
    }

    #[test]
    fn automated_delays_fall_in_their_windows() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..100 {
            let d = AutomatedNotice::NewBook.pick_delay(&mut rng).as_secs_f64();
            assert!((360.0..600.0).contains(&d));
            let d = AutomatedNotice::ReadingReminder.pick_delay(&mut rng).as_secs_f64();
            assert!((120.0..300.0).contains(&d));
            let d = AutomatedNotice::AnalysisReady.pick_delay(&mut rng).as_secs_f64();
            assert!((420.0..720.0).contains(&d));
        }
        assert!(AutomatedNotice::AnalysisReady.refreshes_analysis());
        assert!(!AutomatedNotice::NewBook.refreshes_analysis());
    }
}
