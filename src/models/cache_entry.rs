//! Cache entry and status types shared by every cache tier.

use crate::models::Instrument;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Description of the raw payload a cache entry was built from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvMetadata {
    pub size_bytes: usize,
    pub line_count: usize,
    /// First few header names, for debugging upstream format changes
    pub headers: Vec<String>,
    pub segments_included: BTreeMap<String, usize>,
}

/// Last successfully fetched and filtered instrument set
///
/// Entries are never mutated; a refresh builds a new one and swaps it in.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub instruments: Arc<Vec<Instrument>>,
    pub fetched_at: DateTime<Utc>,
    pub metadata: Option<CsvMetadata>,
}

impl CacheEntry {
    pub fn new(instruments: Vec<Instrument>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            instruments: Arc::new(instruments),
            fetched_at,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: CsvMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn record_count(&self) -> usize {
        self.instruments.len()
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.fetched_at
    }

    /// Fresh iff `now - fetched_at < ttl`
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.age(now) < ttl
    }
}

/// Which tier of the cache hierarchy an entry lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierKind {
    Memory,
    Persistent,
}

impl TierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TierKind::Memory => "memory",
            TierKind::Persistent => "persistent",
        }
    }

    /// Status reported when a fresh entry is served from this tier
    pub fn cache_hit_status(&self) -> CacheStatus {
        match self {
            TierKind::Memory => CacheStatus::MemoryCache,
            TierKind::Persistent => CacheStatus::PersistentCache,
        }
    }

    /// Status reported when a stale entry from this tier is used after a failed refresh
    pub fn fallback_status(&self) -> CacheStatus {
        match self {
            TierKind::Memory => CacheStatus::FallbackMemory,
            TierKind::Persistent => CacheStatus::FallbackPersistent,
        }
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a pipeline result was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    MemoryCache,
    PersistentCache,
    FreshDownload,
    ForceRefresh,
    FallbackMemory,
    FallbackPersistent,
    SampleData,
    NoData,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::MemoryCache => "memory_cache",
            CacheStatus::PersistentCache => "persistent_cache",
            CacheStatus::FreshDownload => "fresh_download",
            CacheStatus::ForceRefresh => "force_refresh",
            CacheStatus::FallbackMemory => "fallback_memory",
            CacheStatus::FallbackPersistent => "fallback_persistent",
            CacheStatus::SampleData => "sample_data",
            CacheStatus::NoData => "no_data",
        }
    }

    pub fn is_fresh_data(&self) -> bool {
        matches!(self, CacheStatus::FreshDownload | CacheStatus::ForceRefresh)
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
