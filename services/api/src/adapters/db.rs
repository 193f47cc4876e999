//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! `DatabaseService` and `StateStore` ports from the `core` crate. It handles all
//! interactions with the SQLite database using `sqlx`.

use async_trait::async_trait;
use bookrec_core::domain::{Book, User, UserCredentials};
use bookrec_core::ports::{DatabaseService, PortError, PortResult, StateKey, StateStore};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` and `StateStore` ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: SqlitePool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    name: String,
    email: String,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            name: self.name,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct AuthSessionRecord {
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct BookRecord {
    id: Uuid,
    title: String,
    author: String,
    description: String,
    cover_image: String,
    rating: f64,
    genres: String,
    publication_year: i64,
    publisher: String,
}
impl BookRecord {
    fn to_domain(self) -> PortResult<Book> {
        let genres: Vec<String> = serde_json::from_str(&self.genres).map_err(|e| {
            PortError::Unexpected(format!("Book {} has malformed genres: {}", self.id, e))
        })?;
        Ok(Book {
            id: self.id,
            title: self.title,
            author: self.author,
            description: self.description,
            cover_image: self.cover_image,
            rating: self.rating,
            genres,
            publication_year: self.publication_year as i32,
            publisher: self.publisher,
        })
    }
}

const BOOK_COLUMNS: &str =
    "id, title, author, description, cover_image, rating, genres, publication_year, publisher";

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user(
        &self,
        name: &str,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, name, email, hashed_password) VALUES (?, ?, ?, ?) \
             RETURNING user_id, name, email",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                PortError::Conflict("User already exists".to_string())
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, name, email FROM users WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("No user with email {}", email)))?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (session_id, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let record = sqlx::query_as::<_, AuthSessionRecord>(
            "SELECT user_id, expires_at FROM auth_sessions WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)?;

        if record.expires_at <= Utc::now() {
            debug!("Auth session expired");
            self.delete_auth_session(session_id).await?;
            return Err(PortError::Unauthorized);
        }
        Ok(record.user_id)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn list_books(&self) -> PortResult<Vec<Book>> {
        let sql = format!("SELECT {} FROM books ORDER BY rowid", BOOK_COLUMNS);
        let records = sqlx::query_as::<_, BookRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        records.into_iter().map(BookRecord::to_domain).collect()
    }

    async fn get_book(&self, book_id: Uuid) -> PortResult<Book> {
        let sql = format!("SELECT {} FROM books WHERE id = ?", BOOK_COLUMNS);
        sqlx::query_as::<_, BookRecord>(&sql)
            .bind(book_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Book {} not found", book_id)))?
            .to_domain()
    }

    async fn list_books_by_genre(&self, genre: &str) -> PortResult<Vec<Book>> {
        let sql = format!(
            "SELECT {} FROM books \
             WHERE EXISTS (SELECT 1 FROM json_each(books.genres) WHERE json_each.value = ?) \
             ORDER BY rowid",
            BOOK_COLUMNS
        );
        let records = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(genre)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        records.into_iter().map(BookRecord::to_domain).collect()
    }

    async fn insert_books(&self, books: &[Book]) -> PortResult<usize> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let mut inserted = 0;
        for book in books {
            let genres = serde_json::to_string(&book.genres)
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
            let result = sqlx::query(
                "INSERT OR IGNORE INTO books \
                 (id, title, author, description, cover_image, rating, genres, publication_year, publisher) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(book.id)
            .bind(&book.title)
            .bind(&book.author)
            .bind(&book.description)
            .bind(&book.cover_image)
            .bind(book.rating)
            .bind(genres)
            .bind(book.publication_year)
            .bind(&book.publisher)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
            inserted += result.rows_affected() as usize;
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(inserted)
    }

    async fn count_books(&self) -> PortResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(count)
    }
}

//=========================================================================================
// `StateStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl StateStore for DbAdapter {
    async fn load(&self, user_id: Uuid, key: StateKey) -> PortResult<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM user_state WHERE user_id = ? AND key = ?")
                .bind(user_id)
                .bind(key.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(unexpected)?;
        Ok(row.map(|(value,)| value))
    }

    async fn save(&self, user_id: Uuid, key: StateKey, value: &str) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO user_state (user_id, key, value) VALUES (?, ?, ?) \
             ON CONFLICT (user_id, key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(user_id)
        .bind(key.as_str())
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn save_many(&self, user_id: Uuid, entries: &[(StateKey, String)]) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        for (key, value) in entries {
            sqlx::query(
                "INSERT INTO user_state (user_id, key, value) VALUES (?, ?, ?) \
                 ON CONFLICT (user_id, key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
            )
            .bind(user_id)
            .bind(key.as_str())
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }
        tx.commit().await.map_err(unexpected)?;
        debug!(%user_id, keys = entries.len(), "User state committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookrec_core::catalog::Catalog;
    use chrono::Duration;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn adapter() -> DbAdapter {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let db = DbAdapter::new(pool);
        db.run_migrations().await.unwrap();
        db
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let db = adapter().await;
        db.create_user("Ada", "ada@example.com", "hash").await.unwrap();
        let again = db.create_user("Ada", "ada@example.com", "hash").await;
        assert!(matches!(again, Err(PortError::Conflict(_))));

        let creds = db.get_user_by_email("ada@example.com").await.unwrap();
        assert_eq!(creds.hashed_password, "hash");
        assert_eq!(db.get_user(creds.user_id).await.unwrap().name, "Ada");
    }

    #[tokio::test]
    async fn expired_sessions_are_rejected_and_removed() {
        let db = adapter().await;
        let user = db.create_user("Bo", "bo@example.com", "hash").await.unwrap();
        db.create_auth_session("live", user.user_id, Utc::now() + Duration::days(1))
            .await
            .unwrap();
        db.create_auth_session("stale", user.user_id, Utc::now() - Duration::minutes(1))
            .await
            .unwrap();

        assert_eq!(db.validate_auth_session("live").await.unwrap(), user.user_id);
        assert!(matches!(
            db.validate_auth_session("stale").await,
            Err(PortError::Unauthorized)
        ));
        assert!(matches!(
            db.validate_auth_session("missing").await,
            Err(PortError::Unauthorized)
        ));

        db.delete_auth_session("live").await.unwrap();
        assert!(db.validate_auth_session("live").await.is_err());
    }

    #[tokio::test]
    async fn catalog_round_trips_in_insertion_order() {
        let db = adapter().await;
        let catalog = Catalog::bundled().unwrap();

        assert_eq!(db.insert_books(catalog.books()).await.unwrap(), catalog.len());
        assert_eq!(db.insert_books(catalog.books()).await.unwrap(), 0);
        assert_eq!(db.count_books().await.unwrap(), catalog.len() as i64);

        let listed = db.list_books().await.unwrap();
        assert_eq!(listed, catalog.books());

        let first = &catalog.books()[0];
        assert_eq!(&db.get_book(first.id).await.unwrap(), first);
        assert!(matches!(
            db.get_book(Uuid::new_v4()).await,
            Err(PortError::NotFound(_))
        ));

        let fantasy = db.list_books_by_genre("fantasy").await.unwrap();
        assert_eq!(fantasy, catalog.by_genre("fantasy"));
        assert!(db.list_books_by_genre("fan").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn state_is_upserted_per_user_and_key() {
        let db = adapter().await;
        let user = Uuid::new_v4();

        assert_eq!(db.load(user, StateKey::UserName).await.unwrap(), None);
        db.save(user, StateKey::UserName, "\"Ada\"").await.unwrap();
        db.save(user, StateKey::UserName, "\"Grace\"").await.unwrap();

        assert_eq!(
            db.load(user, StateKey::UserName).await.unwrap().as_deref(),
            Some("\"Grace\"")
        );
        assert_eq!(db.load(Uuid::new_v4(), StateKey::UserName).await.unwrap(), None);
    }

    #[tokio::test]
    async fn batched_state_is_written_together() {
        let db = adapter().await;
        let user = Uuid::new_v4();
        db.save(user, StateKey::UserName, "\"Ada\"").await.unwrap();

        db.save_many(
            user,
            &[
                (StateKey::UserName, "\"Grace\"".to_string()),
                (StateKey::SavedBooks, "[]".to_string()),
            ],
        )
        .await
        .unwrap();

        assert_eq!(
            db.load(user, StateKey::UserName).await.unwrap().as_deref(),
            Some("\"Grace\"")
        );
        assert_eq!(
            db.load(user, StateKey::SavedBooks).await.unwrap().as_deref(),
            Some("[]")
        );
    }
}
