//! SQLite implementation of the fingerprint store.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;

use super::{FingerprintRecord, FingerprintStore};
use crate::error::StoreError;
use crate::fingerprint::{ContentDigest, PerceptualHash};

/// SQLite-backed fingerprint store.
#[derive(Clone)]
pub struct SqliteFingerprintStore {
    pool: SqlitePool,
}

/// Row type for database queries.
#[derive(FromRow)]
struct FingerprintRow {
    key: String,
    hash_value: String,
    perceptual_hash: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<FingerprintRow> for FingerprintRecord {
    type Error = StoreError;

    fn try_from(row: FingerprintRow) -> Result<Self, Self::Error> {
        let hash_value =
            ContentDigest::from_hex(&row.hash_value).map_err(|e| StoreError::Corrupt {
                key: row.key.clone(),
                reason: e.to_string(),
            })?;
        let perceptual_hash =
            PerceptualHash::from_hex(&row.perceptual_hash).map_err(|e| StoreError::Corrupt {
                key: row.key.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            key: row.key,
            hash_value,
            perceptual_hash,
            updated_at: row.updated_at,
        })
    }
}

impl SqliteFingerprintStore {
    /// Open (creating if needed) the database at `database_url`.
    ///
    /// Runs migrations automatically on connection.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StoreError::Connection(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Self::migrate(&pool).await?;
        tracing::info!(database_url, "Fingerprint store connected and migrations applied");

        Ok(Self { pool })
    }

    /// Private in-memory database, for tests and throwaway runs.
    ///
    /// Every SQLite `:memory:` connection is its own database, so the pool is
    /// pinned to a single connection that never expires.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(pool).await?;
        Ok(())
    }
}

#[async_trait]
impl FingerprintStore for SqliteFingerprintStore {
    /// A single `INSERT .. ON CONFLICT DO UPDATE` statement, so the write is
    /// atomic and an existing key is never reported as an error.
    async fn upsert(&self, record: &FingerprintRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO fingerprints (key, hash_value, perceptual_hash, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (key) DO UPDATE SET
                hash_value = excluded.hash_value,
                perceptual_hash = excluded.perceptual_hash,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.key)
        .bind(record.hash_value.to_hex())
        .bind(record.perceptual_hash.to_hex())
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(key = %record.key, "Stored fingerprint");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<FingerprintRecord>, StoreError> {
        let row: Option<FingerprintRow> = sqlx::query_as(
            r#"
            SELECT key, hash_value, perceptual_hash, updated_at
            FROM fingerprints
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FingerprintRecord::try_from).transpose()
    }

    /// Rows that no longer parse are skipped with a warning rather than
    /// failing the whole listing.
    async fn list(&self) -> Result<Vec<FingerprintRecord>, StoreError> {
        let rows: Vec<FingerprintRow> = sqlx::query_as(
            r#"
            SELECT key, hash_value, perceptual_hash, updated_at
            FROM fingerprints
            ORDER BY key
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match FingerprintRecord::try_from(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable fingerprint row");
                    None
                }
            })
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM fingerprints WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM fingerprints")
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::fingerprint::ImageFingerprint;

    fn record(key: &str, seed: u8) -> FingerprintRecord {
        FingerprintRecord::new(
            key,
            ImageFingerprint {
                digest: ContentDigest::of_pixels(&[seed, seed]),
                perceptual_hash: PerceptualHash::new([seed; 8]),
            },
        )
    }

    #[tokio::test]
    async fn test_upsert_then_get() {
        let store = SqliteFingerprintStore::in_memory().await.unwrap();
        let rec = record("a.jpg", 1);
        store.upsert(&rec).await.unwrap();

        let stored = store.get("a.jpg").await.unwrap().unwrap();
        assert_eq!(stored.key, "a.jpg");
        assert_eq!(stored.hash_value, rec.hash_value);
        assert_eq!(stored.perceptual_hash, rec.perceptual_hash);
    }

    #[tokio::test]
    async fn test_upsert_existing_key_updates_in_place() {
        let store = SqliteFingerprintStore::in_memory().await.unwrap();
        store.upsert(&record("a.jpg", 1)).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        let h2 = record("a.jpg", 2);
        store.upsert(&h2).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let stored = store.get("a.jpg").await.unwrap().unwrap();
        assert_eq!(stored.hash_value, h2.hash_value);
        assert_eq!(stored.perceptual_hash, h2.perceptual_hash);
    }

    #[tokio::test]
    async fn test_list_ordered_and_delete() {
        let store = SqliteFingerprintStore::in_memory().await.unwrap();
        for (i, key) in ["b.png", "c.png", "a.png"].iter().enumerate() {
            store.upsert(&record(key, i as u8)).await.unwrap();
        }

        let keys: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec!["a.png", "b.png", "c.png"]);

        assert!(store.delete("b.png").await.unwrap());
        assert!(!store.delete("b.png").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 2);
        assert!(store.get("b.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_row_skipped_in_list_but_reported_by_get() {
        let store = SqliteFingerprintStore::in_memory().await.unwrap();
        store.upsert(&record("good.png", 7)).await.unwrap();

        sqlx::query(
            "INSERT INTO fingerprints (key, hash_value, perceptual_hash, updated_at) \
             VALUES ('bad.png', 'not-hex', 'also-not-hex', $1)",
        )
        .bind(Utc::now())
        .execute(&store.pool)
        .await
        .unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key, "good.png");

        let err = store.get("bad.png").await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_connect_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("imprint.db").display());

        let store = SqliteFingerprintStore::connect(&url, 2).await.unwrap();
        store.upsert(&record("persisted.png", 4)).await.unwrap();
        drop(store);

        let reopened = SqliteFingerprintStore::connect(&url, 2).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        assert!(reopened.get("persisted.png").await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_upserts_same_key_leave_one_whole_record() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("imprint.db").display());
        let store = Arc::new(SqliteFingerprintStore::connect(&url, 4).await.unwrap());

        let handles: Vec<_> = (0..16u8)
            .map(|seed| {
                let store = store.clone();
                tokio::spawn(async move { store.upsert(&record("shared", seed)).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.count().await.unwrap(), 1);
        let stored = store.get("shared").await.unwrap().unwrap();
        // Both hashes must come from the same write
        let seed = stored.perceptual_hash.as_bytes()[0];
        assert_eq!(stored.hash_value, ContentDigest::of_pixels(&[seed, seed]));
    }
}
