use crate::constants::PERSISTENT_CACHE_KEY;
use crate::error::Error;
use crate::models::{CacheEntry, CsvMetadata, Instrument, TierKind};
use crate::services::cache_tier::CacheTier;
use crate::services::segment_filter;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Row layout of the `instruments_cache` table
///
/// One logical row per dataset, keyed by a constant id. Instruments and
/// metadata are stored as JSON text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedRow {
    pub instruments_data: String,
    pub csv_metadata: Option<String>,
    pub last_updated: String,
    pub record_count: i64,
}

impl PersistedRow {
    pub fn from_entry(entry: &CacheEntry) -> Result<Self, Error> {
        let instruments_data = serde_json::to_string(entry.instruments.as_ref())?;
        let csv_metadata = entry
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        Ok(Self {
            instruments_data,
            csv_metadata,
            last_updated: entry.fetched_at.to_rfc3339(),
            record_count: entry.record_count() as i64,
        })
    }

    pub fn into_entry(self) -> Result<CacheEntry, Error> {
        let instruments: Vec<Instrument> = serde_json::from_str(&self.instruments_data)?;
        let instruments = segment_filter::filter_instruments(instruments);

        if instruments.len() as i64 != self.record_count {
            warn!(
                stored = self.record_count,
                actual = instruments.len(),
                "Persisted record count does not match stored instruments"
            );
        }

        let fetched_at = DateTime::parse_from_rfc3339(&self.last_updated)
            .map_err(|e| Error::Parse(format!("Invalid last_updated '{}': {}", self.last_updated, e)))?
            .with_timezone(&Utc);

        let metadata = self
            .csv_metadata
            .as_deref()
            .map(serde_json::from_str::<CsvMetadata>)
            .transpose()?;

        let mut entry = CacheEntry::new(instruments, fetched_at);
        entry.metadata = metadata;
        Ok(entry)
    }
}

/// Persistent cache tier backed by SQLite
#[derive(Debug, Clone)]
pub struct SqliteCache {
    pool: SqlitePool,
    key: String,
}

impl SqliteCache {
    /// Connect using a URL such as `sqlite://data/instruments.db`
    ///
    /// The database file and table are created when missing.
    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        info!("Connecting persistent cache at: {}", database_url);

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(connect_options)
            .await?;

        let store = Self {
            pool,
            key: PERSISTENT_CACHE_KEY.to_string(),
        };
        store.initialize_schema().await?;

        info!("Persistent cache initialized successfully");
        Ok(store)
    }

    /// Connect if a URL is configured; any failure degrades to `None`
    pub async fn connect_optional(database_url: Option<&str>) -> Option<Arc<Self>> {
        let url = database_url?;
        match Self::connect(url).await {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                warn!(error = %e, "Persistent cache unavailable, running memory-only");
                None
            }
        }
    }

    async fn initialize_schema(&self) -> Result<(), Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS instruments_cache (
                id TEXT PRIMARY KEY,
                instruments_data TEXT NOT NULL,
                csv_metadata TEXT,
                last_updated TEXT NOT NULL,
                record_count INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl CacheTier for SqliteCache {
    fn kind(&self) -> TierKind {
        TierKind::Persistent
    }

    async fn read(&self) -> Result<Option<CacheEntry>, Error> {
        let row = sqlx::query(
            "SELECT instruments_data, csv_metadata, last_updated, record_count FROM instruments_cache WHERE id = ?1",
        )
        .bind(&self.key)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            debug!("Persistent cache is empty");
            return Ok(None);
        };

        let persisted = PersistedRow {
            instruments_data: row.try_get("instruments_data")?,
            csv_metadata: row.try_get("csv_metadata")?,
            last_updated: row.try_get("last_updated")?,
            record_count: row.try_get("record_count")?,
        };

        persisted.into_entry().map(Some)
    }

    async fn write(&self, entry: &CacheEntry) -> Result<(), Error> {
        let persisted = PersistedRow::from_entry(entry)?;

        sqlx::query(
            r#"
            INSERT INTO instruments_cache (id, instruments_data, csv_metadata, last_updated, record_count)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                instruments_data = excluded.instruments_data,
                csv_metadata = excluded.csv_metadata,
                last_updated = excluded.last_updated,
                record_count = excluded.record_count
            "#,
        )
        .bind(&self.key)
        .bind(&persisted.instruments_data)
        .bind(&persisted.csv_metadata)
        .bind(&persisted.last_updated)
        .bind(persisted.record_count)
        .execute(&self.pool)
        .await?;

        debug!(records = persisted.record_count, "Persistent cache updated");
        Ok(())
    }
}
