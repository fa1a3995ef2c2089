use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::categorize::CategorizedReview;
use crate::{Error, Result};

/// Named collections of categorized reviews.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Drops everything in `collection` and stores `docs` in its place.
    async fn replace_collection(&self, collection: &str, docs: &[CategorizedReview]) -> Result<()>;

    async fn load_collection(&self, collection: &str) -> Result<Vec<CategorizedReview>>;
}

/// [`DocumentStore`] backed by SQLite, one table per collection.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self { pool })
    }

    async fn ensure_collection(&self, table: &str) -> Result<()> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                rating INTEGER NOT NULL,
                comment TEXT NOT NULL,
                categories TEXT NOT NULL,
                processed_at TEXT NOT NULL
            )"
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn replace_collection(&self, collection: &str, docs: &[CategorizedReview]) -> Result<()> {
        let table = collection_table(collection)?;
        self.ensure_collection(table).await?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("DELETE FROM \"{table}\""))
            .execute(&mut *tx)
            .await?;

        let insert = format!(
            "INSERT INTO \"{table}\" (rating, comment, categories, processed_at) VALUES (?, ?, ?, ?)"
        );
        for doc in docs {
            sqlx::query(&insert)
                .bind(doc.rating)
                .bind(&doc.comment)
                .bind(serde_json::to_string(&doc.categories)?)
                .bind(doc.processed_at.to_rfc3339())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn load_collection(&self, collection: &str) -> Result<Vec<CategorizedReview>> {
        let table = collection_table(collection)?;
        self.ensure_collection(table).await?;

        let rows = sqlx::query(&format!(
            "SELECT rating, comment, categories, processed_at FROM \"{table}\" ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<CategorizedReview> {
                let categories: String = row.try_get("categories")?;
                let processed_at: String = row.try_get("processed_at")?;
                Ok(CategorizedReview {
                    rating: row.try_get("rating")?,
                    comment: row.try_get("comment")?,
                    categories: serde_json::from_str::<BTreeSet<String>>(&categories)?,
                    processed_at: DateTime::parse_from_rfc3339(&processed_at)?.with_timezone(&Utc),
                })
            })
            .collect()
    }
}

/// Collection names end up in SQL, so only plain identifiers are accepted.
fn collection_table(collection: &str) -> Result<&str> {
    let mut chars = collection.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(collection)
    } else {
        Err(Error::InvalidCollection(collection.to_string()))
    }
}
