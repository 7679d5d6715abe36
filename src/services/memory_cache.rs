use crate::error::Error;
use crate::models::{CacheEntry, TierKind};
use crate::services::cache_tier::CacheTier;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

/// Process-wide single-slot cache
///
/// The slot holds the whole entry, so a write swaps records and timestamp
/// together and readers never see a mix of two refreshes. Last writer wins.
#[derive(Debug, Default)]
pub struct MemoryCache {
    slot: RwLock<Option<CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Approximate heap usage of the cached instruments
    pub async fn estimate_memory_usage(&self) -> usize {
        let slot = self.slot.read().await;
        slot.as_ref()
            .map(|entry| {
                entry
                    .instruments
                    .iter()
                    .map(|i| {
                        std::mem::size_of_val(i)
                            + i.instrument_token.len()
                            + i.exchange_token.len()
                            + i.tradingsymbol.len()
                            + i.name.len()
                            + i.last_price.len()
                            + i.expiry.len()
                            + i.strike.len()
                            + i.tick_size.len()
                            + i.lot_size.len()
                            + i.instrument_type.len()
                            + i.segment.len()
                            + i.exchange.len()
                    })
                    .sum()
            })
            .unwrap_or(0)
    }
}

#[async_trait]
impl CacheTier for MemoryCache {
    fn kind(&self) -> TierKind {
        TierKind::Memory
    }

    async fn read(&self) -> Result<Option<CacheEntry>, Error> {
        Ok(self.slot.read().await.clone())
    }

    async fn write(&self, entry: &CacheEntry) -> Result<(), Error> {
        let mut slot = self.slot.write().await;
        *slot = Some(entry.clone());
        debug!(records = entry.record_count(), "Memory cache updated");
        Ok(())
    }
}
