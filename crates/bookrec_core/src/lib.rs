//! crates/bookrec_core/src/lib.rs
//!
//! Framework-free core of the book recommendation service: the domain model,
//! the ports adapters implement, and the engines that run on top of them.

pub mod analytics;
pub mod catalog;
pub mod domain;
pub mod history;
pub mod notifications;
pub mod ports;
pub mod profile;
pub mod recommend;
pub mod search;
pub mod state;

pub use catalog::Catalog;
pub use domain::{
    Book, BookView, NewNotification, Notification, ReadingListEntry, ReadingSpeedSample, User,
    UserCredentials,
};
pub use ports::{DatabaseService, PortError, PortResult, StateKey, StateStore};
pub use profile::{ProfileService, ProgressUpdate};
pub use recommend::{RecommendationConfig, Recommender};
