//! services/api/src/seed.rs
//!
//! Loads the bundled catalog into an empty database.

use bookrec_core::catalog::Catalog;
use bookrec_core::ports::{DatabaseService, PortResult};
use tracing::info;

/// Inserts `catalog` when the `books` table is empty. Returns how many books
/// were inserted.
pub async fn seed_if_empty(db: &dyn DatabaseService, catalog: &Catalog) -> PortResult<usize> {
    let existing = db.count_books().await?;
    if existing > 0 {
        info!(existing, "Catalog already present, skipping seed");
        return Ok(0);
    }
    let inserted = db.insert_books(catalog.books()).await?;
    info!(inserted, "Seeded catalog");
    Ok(inserted)
}
