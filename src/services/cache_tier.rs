use crate::error::Error;
use crate::models::{CacheEntry, TierKind};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// One layer of the instrument cache hierarchy
///
/// Writes always replace the whole entry (records, timestamp and metadata
/// together). A tier that cannot be reached reports an error from `read`;
/// the orchestrator treats that the same as an empty tier.
#[async_trait]
pub trait CacheTier: Send + Sync {
    fn kind(&self) -> TierKind;

    /// Current entry regardless of age
    async fn read(&self) -> Result<Option<CacheEntry>, Error>;

    async fn write(&self, entry: &CacheEntry) -> Result<(), Error>;

    /// Freshness check shared by every tier
    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>, ttl: Duration) -> bool {
        entry.is_fresh(now, ttl)
    }
}

pub type SharedCacheTier = Arc<dyn CacheTier>;
