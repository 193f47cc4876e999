//! services/api/src/web/session_jobs.rs
//!
//! Background work started the first time a user signs in during the lifetime
//! of the process: the three automated notices and the hourly recommendation
//! refresh. Jobs run until the process exits.

use bookrec_core::notifications::{
    recommendations_updated, AutomatedNotice, RECOMMENDATION_NOTICE_PROBABILITY,
    RECOMMENDATION_REFRESH_PERIOD,
};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::web::state::AppState;

pub struct SessionJobs {
    started: Mutex<HashSet<Uuid>>,
    refresh_period: Duration,
    notice_probability: f64,
}

impl Default for SessionJobs {
    fn default() -> Self {
        Self::new(RECOMMENDATION_REFRESH_PERIOD, RECOMMENDATION_NOTICE_PROBABILITY)
    }
}

impl SessionJobs {
    pub fn new(refresh_period: Duration, notice_probability: f64) -> Self {
        Self {
            started: Mutex::new(HashSet::new()),
            refresh_period,
            notice_probability: notice_probability.clamp(0.0, 1.0),
        }
    }

    /// Starts the user's jobs unless they are already running. Returns whether
    /// anything was started.
    pub async fn ensure_started(&self, state: &Arc<AppState>, user_id: Uuid) -> bool {
        if !self.started.lock().await.insert(user_id) {
            return false;
        }

        let mut rng = StdRng::from_os_rng();
        for notice in AutomatedNotice::ALL {
            let delay = notice.pick_delay(&mut rng);
            let state = state.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                deliver_notice(&state, user_id, notice).await;
            });
        }

        let state = state.clone();
        let period = self.refresh_period;
        let probability = self.notice_probability;
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                refresh_recommendations(&state, user_id, probability).await;
            }
        });

        info!(%user_id, "Session jobs started");
        true
    }
}

async fn deliver_notice(state: &AppState, user_id: Uuid, notice: AutomatedNotice) {
    let now = Utc::now();
    if let Err(e) = state.profiles.notify(user_id, notice.payload(now)).await {
        error!(%user_id, ?notice, "Failed to deliver notice: {}", e);
        return;
    }
    if notice.refreshes_analysis() {
        if let Err(e) = state.profiles.analysis(user_id, now).await {
            error!(%user_id, "Failed to refresh analysis: {}", e);
        }
    }
}

async fn refresh_recommendations(state: &AppState, user_id: Uuid, probability: f64) {
    let catalog = state.catalog().await;
    let mut rng = StdRng::from_os_rng();
    match state
        .profiles
        .personalized_recommendations(user_id, &catalog, &mut rng)
        .await
    {
        Ok(Some(picks)) if !picks.is_empty() => {
            debug!(%user_id, count = picks.len(), "Recommendations refreshed");
            if rng.random_bool(probability) {
                if let Err(e) = state
                    .profiles
                    .notify(user_id, recommendations_updated(Utc::now()))
                    .await
                {
                    error!(%user_id, "Failed to announce recommendations: {}", e);
                }
            }
        }
        Ok(_) => debug!(%user_id, "Nothing to refresh"),
        Err(e) => error!(%user_id, "Failed to refresh recommendations: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use async_trait::async_trait;
    use bookrec_core::domain::{Book, User, UserCredentials};
    use bookrec_core::ports::{DatabaseService, PortError, PortResult};
    use bookrec_core::state::MemoryStateStore;
    use chrono::DateTime;

    /// A database that is always down, so the bundled catalog serves every lookup.
    struct DownDb;

    fn down<T>() -> PortResult<T> {
        Err(PortError::Unexpected("database unavailable".to_string()))
    }

    #[async_trait]
    impl DatabaseService for DownDb {
        async fn create_user(&self, _: &str, _: &str, _: &str) -> PortResult<User> {
            down()
        }
        async fn get_user(&self, _: Uuid) -> PortResult<User> {
            down()
        }
        async fn get_user_by_email(&self, _: &str) -> PortResult<UserCredentials> {
            down()
        }
        async fn create_auth_session(&self, _: &str, _: Uuid, _: DateTime<Utc>) -> PortResult<()> {
            down()
        }
        async fn validate_auth_session(&self, _: &str) -> PortResult<Uuid> {
            down()
        }
        async fn delete_auth_session(&self, _: &str) -> PortResult<()> {
            down()
        }
        async fn list_books(&self) -> PortResult<Vec<Book>> {
            down()
        }
        async fn get_book(&self, _: Uuid) -> PortResult<Book> {
            down()
        }
        async fn list_books_by_genre(&self, _: &str) -> PortResult<Vec<Book>> {
            down()
        }
        async fn insert_books(&self, _: &[Book]) -> PortResult<usize> {
            down()
        }
        async fn count_books(&self) -> PortResult<i64> {
            down()
        }
    }

    fn app_state(jobs: SessionJobs) -> Arc<AppState> {
        let config = Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            database_url: "sqlite::memory:".to_string(),
            log_level: tracing::Level::INFO,
            cors_origin: None,
            trending_threshold: 4.3,
            recommendation_count: 8,
            seed_catalog: false,
        };
        let mut state = AppState::new(
            Arc::new(DownDb),
            Arc::new(MemoryStateStore::new()),
            Arc::new(config),
        )
        .unwrap();
        state.jobs = Arc::new(jobs);
        Arc::new(state)
    }

    async fn has_title(state: &AppState, user: Uuid, title: &str) -> bool {
        state
            .profiles
            .notifications(user)
            .await
            .unwrap()
            .iter()
            .any(|n| n.title == title)
    }

    #[tokio::test(start_paused = true)]
    async fn automated_notices_arrive_within_their_windows() {
        let state = app_state(SessionJobs::default());
        let user = Uuid::new_v4();

        assert!(state.jobs.ensure_started(&state, user).await);
        assert!(!state.jobs.ensure_started(&state, user).await);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(state.profiles.notifications(user).await.unwrap().is_empty());

        tokio::time::sleep(Duration::from_secs(12 * 60)).await;
        let titles: Vec<String> = state
            .profiles
            .notifications(user)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.title)
            .collect();
        assert_eq!(titles.len(), 3);
        assert!(titles.contains(&"New Book Available".to_string()));
        assert!(titles.contains(&"Reading Reminder".to_string()));
        assert!(titles.contains(&"Reading Analysis Updated".to_string()));

        let insights = state.profiles.cached_insights(user).await.unwrap();
        assert_eq!(
            insights[0],
            "Start your reading journey by adding books to your reading list!"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hourly_refresh_announces_new_recommendations() {
        let state = app_state(SessionJobs::new(RECOMMENDATION_REFRESH_PERIOD, 1.0));
        let user = Uuid::new_v4();
        state
            .profiles
            .set_preferences(user, vec!["fantasy".to_string()], Utc::now())
            .await
            .unwrap();

        state.jobs.ensure_started(&state, user).await;
        tokio::time::sleep(Duration::from_secs(59 * 60)).await;
        assert!(!has_title(&state, user, "New Recommendations").await);

        tokio::time::sleep(Duration::from_secs(2 * 60)).await;
        assert!(has_title(&state, user, "New Recommendations").await);
    }
}
