//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the catalog lookups handlers use.
//!
//! The database is the catalog of record. When it fails, or holds no books yet,
//! lookups fall back to the bundled catalog and the failure is logged.

use bookrec_core::catalog::Catalog;
use bookrec_core::domain::Book;
use bookrec_core::ports::{DatabaseService, PortError, PortResult, StateStore};
use bookrec_core::profile::ProfileService;
use bookrec_core::recommend::Recommender;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::config::Config;
use crate::web::session_jobs::SessionJobs;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub profiles: Arc<ProfileService>,
    pub jobs: Arc<SessionJobs>,
    pub fallback_catalog: Arc<Catalog>,
}

impl AppState {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        store: Arc<dyn StateStore>,
        config: Arc<Config>,
    ) -> PortResult<Self> {
        let recommender = Recommender::new(config.recommendation_config());
        Ok(Self {
            db,
            profiles: Arc::new(ProfileService::new(store, recommender)),
            jobs: Arc::new(SessionJobs::default()),
            fallback_catalog: Arc::new(Catalog::bundled()?),
            config,
        })
    }

    /// The full catalog, in catalog order.
    pub async fn catalog(&self) -> Arc<Catalog> {
        match self.db.list_books().await {
            Ok(books) if !books.is_empty() => Arc::new(Catalog::new(books)),
            Ok(_) => {
                warn!("Catalog table is empty, serving bundled catalog");
                self.fallback_catalog.clone()
            }
            Err(e) => {
                warn!("Failed to load catalog, serving bundled catalog: {}", e);
                self.fallback_catalog.clone()
            }
        }
    }

    pub async fn find_book(&self, book_id: Uuid) -> PortResult<Book> {
        match self.db.get_book(book_id).await {
            Ok(book) => return Ok(book),
            Err(PortError::NotFound(msg)) => {
                if self.catalog_is_stored().await {
                    return Err(PortError::NotFound(msg));
                }
            }
            Err(e) => warn!(%book_id, "Book lookup failed, using bundled catalog: {}", e),
        }
        self.fallback_catalog
            .find(book_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Book {} not found", book_id)))
    }

    pub async fn books_by_genre(&self, genre: &str) -> Vec<Book> {
        match self.db.list_books_by_genre(genre).await {
            Ok(books) if !books.is_empty() || self.catalog_is_stored().await => books,
            Ok(_) => self.fallback_catalog.by_genre(genre),
            Err(e) => {
                warn!(genre, "Genre lookup failed, using bundled catalog: {}", e);
                self.fallback_catalog.by_genre(genre)
            }
        }
    }

    async fn catalog_is_stored(&self) -> bool {
        matches!(self.db.count_books().await, Ok(n) if n > 0)
    }
}
