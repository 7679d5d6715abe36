//! Instrument Pipeline Orchestrator
//!
//! Decides, per request, whether to serve a cached instrument set or to run
//! Fetch -> Decode -> Filter, writes fresh results back into every tier, and
//! degrades to stale tiers (then the sample dataset) when the fresh path fails.
//!
//! ## State machine
//!
//! | State     | Hit  | Miss  | Ok      | Err      |
//! |-----------|------|-------|---------|----------|
//! | ReadCache | Done | Fetch | Fetch   | Fetch    |
//! | Fetch     |      |       | Decode  | Fallback |
//! | Decode    |      |       | Filter  | Fallback |
//! | Filter    |      |       | Persist | Fallback |
//! | Persist   | Done | Done  | Done    | Done     |
//! | Fallback  | Done | Done  | Done    | Done     |
//!
//! Blank cells are never produced by the runner and map to Fallback.
//! Tier read errors count as a miss; tier write errors are logged and ignored.

use crate::constants::{is_allowed_segment, METADATA_HEADER_SAMPLE};
use crate::error::Error;
use crate::models::{
    segment_stats, CacheEntry, CacheStatus, CsvMetadata, FallbackPolicy, Instrument,
    PipelineConfig, TierKind,
};
use crate::services::cache_tier::SharedCacheTier;
use crate::services::csv_decoder::{self, DecodedCsv};
use crate::services::instrument_fetcher::InstrumentSource;
use crate::services::sample_data::sample_instruments;
use crate::services::segment_filter;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    ReadCache,
    Fetch,
    Decode,
    Filter,
    Persist,
    Fallback,
    Done,
}

/// Result of executing one state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
    /// A fresh cache entry was found
    Hit,
    /// No fresh cache entry
    Miss,
    Ok,
    Err,
}

/// Transition table of the pipeline
pub fn transition(state: PipelineState, event: StepEvent) -> PipelineState {
    use PipelineState::*;

    match (state, event) {
        (ReadCache, StepEvent::Hit) => Done,
        (ReadCache, _) => Fetch,
        (Fetch, StepEvent::Ok) => Decode,
        (Decode, StepEvent::Ok) => Filter,
        (Filter, StepEvent::Ok) => Persist,
        (Fetch | Decode | Filter, _) => Fallback,
        (Persist | Fallback | Done, _) => Done,
    }
}

/// What a pipeline run hands to the presentation layer
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub instruments: Arc<Vec<Instrument>>,
    pub served_from_cache: bool,
    pub last_updated: DateTime<Utc>,
    pub cache_status: CacheStatus,
    /// States visited, in order
    pub states: Vec<PipelineState>,
}

/// Snapshot of one tier for the status endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierStatus {
    pub tier: TierKind,
    pub has_data: bool,
    pub last_updated: Option<DateTime<Utc>>,
    pub cache_age_ms: Option<i64>,
    pub record_count: usize,
    pub is_fresh: bool,
    pub metadata: Option<CsvMetadata>,
    pub error: Option<String>,
}

/// Working data carried between states of one run
struct RunContext {
    force_refresh: bool,
    raw: Option<String>,
    decoded: Option<DecodedCsv>,
    entry: Option<CacheEntry>,
    error: Option<Error>,
    outcome: Option<PipelineOutcome>,
}

/// Orchestrates cache tiers and the upstream source
pub struct InstrumentPipeline {
    source: Arc<dyn InstrumentSource>,
    /// Ordered by increasing latency (memory first)
    tiers: Vec<SharedCacheTier>,
    ttl: Duration,
    fallback_policy: FallbackPolicy,
}

pub type SharedPipeline = Arc<InstrumentPipeline>;

impl InstrumentPipeline {
    pub fn new(
        source: Arc<dyn InstrumentSource>,
        tiers: Vec<SharedCacheTier>,
        ttl: Duration,
        fallback_policy: FallbackPolicy,
    ) -> Self {
        let mut tiers = tiers;
        // Memory always ahead of persistent, original order kept otherwise
        tiers.sort_by_key(|tier| match tier.kind() {
            TierKind::Memory => 0,
            TierKind::Persistent => 1,
        });

        Self {
            source,
            tiers,
            ttl,
            fallback_policy,
        }
    }

    pub fn from_config(
        source: Arc<dyn InstrumentSource>,
        tiers: Vec<SharedCacheTier>,
        config: &PipelineConfig,
    ) -> Self {
        Self::new(source, tiers, config.cache_ttl, config.fallback_policy)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Run the pipeline for one request
    pub async fn run(&self, force_refresh: bool) -> Result<PipelineOutcome, Error> {
        let mut ctx = RunContext {
            force_refresh,
            raw: None,
            decoded: None,
            entry: None,
            error: None,
            outcome: None,
        };
        let mut states = Vec::new();
        let mut state = PipelineState::ReadCache;

        loop {
            states.push(state);
            if state == PipelineState::Done {
                break;
            }

            let event = match state {
                PipelineState::ReadCache => self.read_cache(&mut ctx).await,
                PipelineState::Fetch => self.fetch(&mut ctx).await,
                PipelineState::Decode => self.decode(&mut ctx),
                PipelineState::Filter => self.filter(&mut ctx),
                PipelineState::Persist => self.persist(&mut ctx).await,
                PipelineState::Fallback => self.fallback(&mut ctx).await,
                PipelineState::Done => StepEvent::Ok,
            };

            let next = transition(state, event);
            debug!(?state, ?event, ?next, "Pipeline transition");
            state = next;
        }

        match ctx.outcome {
            Some(mut outcome) => {
                outcome.states = states;
                info!(
                    status = %outcome.cache_status,
                    count = outcome.instruments.len(),
                    from_cache = outcome.served_from_cache,
                    "Pipeline finished"
                );
                Ok(outcome)
            }
            None => Err(ctx
                .error
                .unwrap_or_else(|| Error::Other("Pipeline finished without data".to_string()))),
        }
    }

    async fn read_cache(&self, ctx: &mut RunContext) -> StepEvent {
        if ctx.force_refresh {
            debug!("Force refresh requested, skipping cache tiers");
            return StepEvent::Miss;
        }

        let now = Utc::now();
        for (index, tier) in self.tiers.iter().enumerate() {
            match tier.read().await {
                Ok(Some(entry)) if tier.is_fresh(&entry, now, self.ttl) => {
                    debug!(tier = %tier.kind(), "Serving fresh cache entry");
                    // Warm the faster tiers so the next request stays in memory
                    for faster in &self.tiers[..index] {
                        if let Err(e) = faster.write(&entry).await {
                            warn!(tier = %faster.kind(), error = %e, "Failed to warm cache tier");
                        }
                    }
                    ctx.outcome = Some(PipelineOutcome {
                        instruments: entry.instruments.clone(),
                        served_from_cache: true,
                        last_updated: entry.fetched_at,
                        cache_status: tier.kind().cache_hit_status(),
                        states: Vec::new(),
                    });
                    return StepEvent::Hit;
                }
                Ok(Some(entry)) => {
                    debug!(
                        tier = %tier.kind(),
                        age_secs = entry.age(now).num_seconds(),
                        "Cache entry is stale"
                    );
                }
                Ok(None) => debug!(tier = %tier.kind(), "Cache tier is empty"),
                Err(e) => warn!(tier = %tier.kind(), error = %e, "Cache tier unavailable"),
            }
        }

        StepEvent::Miss
    }

    async fn fetch(&self, ctx: &mut RunContext) -> StepEvent {
        info!("Downloading fresh instruments data");
        match self.source.fetch().await {
            Ok(raw) => {
                ctx.raw = Some(raw);
                StepEvent::Ok
            }
            Err(e) => {
                warn!(error = %e, "Instrument download failed");
                ctx.error = Some(e);
                StepEvent::Err
            }
        }
    }

    fn decode(&self, ctx: &mut RunContext) -> StepEvent {
        let Some(raw) = ctx.raw.as_deref() else {
            ctx.error = Some(Error::Other("Decode reached without downloaded data".to_string()));
            return StepEvent::Err;
        };

        match csv_decoder::decode_with(raw, is_allowed_segment) {
            Ok(decoded) => {
                info!(
                    total_lines = decoded.stats.total_lines,
                    segment_matches = decoded.stats.segment_matches,
                    skipped = decoded.stats.skipped_lines,
                    "Decoded instruments CSV"
                );
                ctx.decoded = Some(decoded);
                StepEvent::Ok
            }
            Err(e) => {
                warn!(error = %e, "Instrument CSV could not be decoded");
                ctx.error = Some(e);
                StepEvent::Err
            }
        }
    }

    fn filter(&self, ctx: &mut RunContext) -> StepEvent {
        let (Some(raw), Some(decoded)) = (ctx.raw.take(), ctx.decoded.take()) else {
            ctx.error = Some(Error::Other("Filter reached without decoded data".to_string()));
            return StepEvent::Err;
        };

        let instruments = segment_filter::filter(decoded.records);
        if instruments.is_empty() {
            ctx.error = Some(Error::Format(
                "No instruments matched the allowed segments".to_string(),
            ));
            return StepEvent::Err;
        }

        let segments = segment_stats(&instruments);
        info!(valid = instruments.len(), ?segments, "Segment distribution");

        let metadata = CsvMetadata {
            size_bytes: raw.len(),
            line_count: raw.trim().lines().count(),
            headers: decoded.headers.into_iter().take(METADATA_HEADER_SAMPLE).collect(),
            segments_included: segments,
        };
        ctx.entry = Some(CacheEntry::new(instruments, Utc::now()).with_metadata(metadata));
        StepEvent::Ok
    }

    async fn persist(&self, ctx: &mut RunContext) -> StepEvent {
        let Some(entry) = ctx.entry.take() else {
            return StepEvent::Err;
        };

        for tier in &self.tiers {
            if let Err(e) = tier.write(&entry).await {
                warn!(tier = %tier.kind(), error = %e, "Failed to write cache tier");
            }
        }

        ctx.outcome = Some(PipelineOutcome {
            instruments: entry.instruments.clone(),
            served_from_cache: false,
            last_updated: entry.fetched_at,
            cache_status: if ctx.force_refresh {
                CacheStatus::ForceRefresh
            } else {
                CacheStatus::FreshDownload
            },
            states: Vec::new(),
        });
        StepEvent::Ok
    }

    async fn fallback(&self, ctx: &mut RunContext) -> StepEvent {
        if let Some(e) = ctx.error.as_ref().filter(|e| !e.is_pipeline_failure()) {
            error!(error = %e, "Unexpected pipeline error, falling back");
        }

        for tier in &self.tiers {
            match tier.read().await {
                Ok(Some(entry)) => {
                    warn!(
                        tier = %tier.kind(),
                        age_secs = entry.age(Utc::now()).num_seconds(),
                        "Using stale cache as fallback"
                    );
                    ctx.outcome = Some(PipelineOutcome {
                        instruments: entry.instruments.clone(),
                        served_from_cache: true,
                        last_updated: entry.fetched_at,
                        cache_status: tier.kind().fallback_status(),
                        states: Vec::new(),
                    });
                    return StepEvent::Hit;
                }
                Ok(None) => {}
                Err(e) => warn!(tier = %tier.kind(), error = %e, "Fallback tier unavailable"),
            }
        }

        match self.fallback_policy {
            FallbackPolicy::Sample => {
                warn!("No cached data available, serving built-in sample dataset");
                ctx.outcome = Some(PipelineOutcome {
                    instruments: Arc::new(sample_instruments()),
                    served_from_cache: false,
                    last_updated: Utc::now(),
                    cache_status: CacheStatus::SampleData,
                    states: Vec::new(),
                });
                StepEvent::Ok
            }
            FallbackPolicy::Fail => StepEvent::Err,
        }
    }

    /// Inspect every tier without fetching
    pub async fn tier_statuses(&self) -> Vec<TierStatus> {
        let now = Utc::now();
        let mut statuses = Vec::with_capacity(self.tiers.len());

        for tier in &self.tiers {
            let status = match tier.read().await {
                Ok(Some(entry)) => TierStatus {
                    tier: tier.kind(),
                    has_data: true,
                    last_updated: Some(entry.fetched_at),
                    cache_age_ms: Some(entry.age(now).num_milliseconds()),
                    record_count: entry.record_count(),
                    is_fresh: tier.is_fresh(&entry, now, self.ttl),
                    metadata: entry.metadata.clone(),
                    error: None,
                },
                Ok(None) => TierStatus {
                    tier: tier.kind(),
                    has_data: false,
                    last_updated: None,
                    cache_age_ms: None,
                    record_count: 0,
                    is_fresh: false,
                    metadata: None,
                    error: None,
                },
                Err(e) => TierStatus {
                    tier: tier.kind(),
                    has_data: false,
                    last_updated: None,
                    cache_age_ms: None,
                    record_count: 0,
                    is_fresh: false,
                    metadata: None,
                    error: Some(e.to_string()),
                },
            };
            statuses.push(status);
        }

        statuses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache_tier::CacheTier;
    use crate::services::memory_cache::MemoryCache;
    use crate::test_support::{csv_body, csv_with_symbols};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Upstream double returning scripted responses and counting calls
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<String, Error>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<String, Error>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl InstrumentSource for ScriptedSource {
        async fn fetch(&self) -> Result<String, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Fetch("All download attempts failed".to_string())))
        }
    }

    /// Persistent tier double backed by a mutex slot
    #[derive(Default)]
    struct FakePersistent {
        slot: Mutex<Option<CacheEntry>>,
        fail_reads: bool,
        fail_writes: bool,
        writes: AtomicUsize,
    }

    #[async_trait]
    impl CacheTier for FakePersistent {
        fn kind(&self) -> TierKind {
            TierKind::Persistent
        }

        async fn read(&self) -> Result<Option<CacheEntry>, Error> {
            if self.fail_reads {
                return Err(Error::Database("no such table: instruments_cache".to_string()));
            }
            Ok(self.slot.lock().unwrap().clone())
        }

        async fn write(&self, entry: &CacheEntry) -> Result<(), Error> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes {
                return Err(Error::Database("database is locked".to_string()));
            }
            *self.slot.lock().unwrap() = Some(entry.clone());
            Ok(())
        }
    }

    fn fetch_failure() -> Result<String, Error> {
        Err(Error::Fetch("HTTP 503: Service Unavailable".to_string()))
    }

    fn entry_aged(symbols: &[&str], age: Duration) -> CacheEntry {
        let instruments = symbols
            .iter()
            .map(|s| Instrument {
                tradingsymbol: s.to_string(),
                segment: "NSE".to_string(),
                ..Default::default()
            })
            .collect();
        CacheEntry::new(instruments, Utc::now() - age)
    }

    fn pipeline(
        source: Arc<ScriptedSource>,
        tiers: Vec<SharedCacheTier>,
        policy: FallbackPolicy,
    ) -> InstrumentPipeline {
        InstrumentPipeline::new(source, tiers, Duration::hours(1), policy)
    }

    fn symbols(outcome: &PipelineOutcome) -> Vec<String> {
        outcome.instruments.iter().map(|i| i.tradingsymbol.clone()).collect()
    }

    #[test]
    fn test_transition_table() {
        use PipelineState::*;
        assert_eq!(transition(ReadCache, StepEvent::Hit), Done);
        assert_eq!(transition(ReadCache, StepEvent::Miss), Fetch);
        assert_eq!(transition(Fetch, StepEvent::Ok), Decode);
        assert_eq!(transition(Fetch, StepEvent::Err), Fallback);
        assert_eq!(transition(Decode, StepEvent::Ok), Filter);
        assert_eq!(transition(Decode, StepEvent::Err), Fallback);
        assert_eq!(transition(Filter, StepEvent::Ok), Persist);
        assert_eq!(transition(Filter, StepEvent::Err), Fallback);
        assert_eq!(transition(Persist, StepEvent::Ok), Done);
        assert_eq!(transition(Fallback, StepEvent::Err), Done);
    }

    #[tokio::test]
    async fn test_fresh_download_fills_every_tier() {
        let source = ScriptedSource::new(vec![Ok(csv_body(20))]);
        let memory = Arc::new(MemoryCache::new());
        let persistent = Arc::new(FakePersistent::default());
        let p = pipeline(
            source.clone(),
            vec![memory.clone(), persistent.clone()],
            FallbackPolicy::Fail,
        );

        let outcome = p.run(false).await.unwrap();

        assert_eq!(outcome.cache_status, CacheStatus::FreshDownload);
        assert!(!outcome.served_from_cache);
        assert_eq!(outcome.instruments.len(), 20);
        assert_eq!(
            outcome.states,
            vec![
                PipelineState::ReadCache,
                PipelineState::Fetch,
                PipelineState::Decode,
                PipelineState::Filter,
                PipelineState::Persist,
                PipelineState::Done
            ]
        );

        let in_memory = memory.read().await.unwrap().unwrap();
        let persisted = persistent.read().await.unwrap().unwrap();
        assert_eq!(in_memory.record_count(), 20);
        assert_eq!(persisted.record_count(), 20);
        let metadata = persisted.metadata.unwrap();
        assert_eq!(metadata.segments_included.get("NSE"), Some(&20));
        assert_eq!(metadata.headers.len(), 10);
    }

    #[tokio::test]
    async fn test_second_read_within_ttl_does_not_fetch() {
        let source = ScriptedSource::new(vec![Ok(csv_body(5)), Ok(csv_body(7))]);
        let p = pipeline(source.clone(), vec![Arc::new(MemoryCache::new())], FallbackPolicy::Fail);

        let first = p.run(false).await.unwrap();
        let second = p.run(false).await.unwrap();

        assert_eq!(source.calls(), 1);
        assert_eq!(first.cache_status, CacheStatus::FreshDownload);
        assert_eq!(second.cache_status, CacheStatus::MemoryCache);
        assert!(second.served_from_cache);
        assert_eq!(second.instruments.len(), 5);
        assert_eq!(second.last_updated, first.last_updated);
    }

    #[tokio::test]
    async fn test_stale_memory_entry_triggers_fetch() {
        let source = ScriptedSource::new(vec![Ok(csv_with_symbols(&["NEWCO"], "NSE"))]);
        let memory = Arc::new(MemoryCache::new());
        memory.write(&entry_aged(&["OLDCO"], Duration::minutes(90))).await.unwrap();
        let p = pipeline(source.clone(), vec![memory.clone()], FallbackPolicy::Fail);

        let outcome = p.run(false).await.unwrap();

        assert_eq!(source.calls(), 1);
        assert_eq!(outcome.cache_status, CacheStatus::FreshDownload);
        assert_eq!(symbols(&outcome), vec!["NEWCO"]);
    }

    #[tokio::test]
    async fn test_all_mirrors_fail_falls_back_to_memory() {
        let source = ScriptedSource::new(vec![fetch_failure()]);
        let memory = Arc::new(MemoryCache::new());
        memory.write(&entry_aged(&["INFY", "TCS"], Duration::hours(3))).await.unwrap();
        let p = pipeline(source, vec![memory], FallbackPolicy::Fail);

        let outcome = p.run(false).await.unwrap();

        assert_eq!(outcome.cache_status, CacheStatus::FallbackMemory);
        assert!(outcome.served_from_cache);
        assert_eq!(symbols(&outcome), vec!["INFY", "TCS"]);
        assert_eq!(outcome.states.last(), Some(&PipelineState::Done));
        assert!(outcome.states.contains(&PipelineState::Fallback));
    }

    #[tokio::test]
    async fn test_all_mirrors_fail_without_cache_propagates_error() {
        let source = ScriptedSource::new(vec![fetch_failure()]);
        let p = pipeline(source, vec![Arc::new(MemoryCache::new())], FallbackPolicy::Fail);

        let err = p.run(false).await.unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
    }

    #[tokio::test]
    async fn test_sample_policy_serves_sample_data() {
        let source = ScriptedSource::new(vec![fetch_failure()]);
        let memory = Arc::new(MemoryCache::new());
        let p = pipeline(source, vec![memory.clone()], FallbackPolicy::Sample);

        let outcome = p.run(false).await.unwrap();

        assert_eq!(outcome.cache_status, CacheStatus::SampleData);
        assert!(!outcome.served_from_cache);
        assert_eq!(outcome.instruments.len(), sample_instruments().len());
        // Sample data is never cached
        assert!(memory.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_segment_header_falls_back() {
        let mut body = String::from("token,tradingsymbol,exchange\n");
        for i in 0..100 {
            body.push_str(&format!("{},SYM{},NSE\n", i, i));
        }
        let source = ScriptedSource::new(vec![Ok(body)]);
        let memory = Arc::new(MemoryCache::new());
        memory.write(&entry_aged(&["CACHED"], Duration::minutes(10))).await.unwrap();
        let p = pipeline(source, vec![memory], FallbackPolicy::Fail);

        let outcome = p.run(true).await.unwrap();

        assert_eq!(outcome.cache_status, CacheStatus::FallbackMemory);
        assert_eq!(symbols(&outcome), vec!["CACHED"]);
        assert_eq!(
            outcome.states,
            vec![
                PipelineState::ReadCache,
                PipelineState::Fetch,
                PipelineState::Decode,
                PipelineState::Fallback,
                PipelineState::Done
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_segment_header_without_cache_is_format_error() {
        let source = ScriptedSource::new(vec![Ok("token,tradingsymbol\n1,INFY\n".to_string())]);
        let p = pipeline(source, vec![Arc::new(MemoryCache::new())], FallbackPolicy::Fail);

        assert!(matches!(p.run(false).await, Err(Error::Format(_))));
    }

    #[tokio::test]
    async fn test_no_allowed_rows_is_treated_as_failure() {
        let source = ScriptedSource::new(vec![Ok(csv_with_symbols(&["GOLDM", "SILVERM"], "MCX"))]);
        let memory = Arc::new(MemoryCache::new());
        memory.write(&entry_aged(&["INFY"], Duration::hours(2))).await.unwrap();
        let p = pipeline(source, vec![memory], FallbackPolicy::Fail);

        let outcome = p.run(false).await.unwrap();
        assert_eq!(outcome.cache_status, CacheStatus::FallbackMemory);
    }

    #[tokio::test]
    async fn test_force_refresh_overwrites_all_tiers() {
        let source = ScriptedSource::new(vec![
            Ok(csv_with_symbols(&["AAA", "BBB", "CCC"], "NSE")),
            Ok(csv_with_symbols(&["ZZZ"], "BSE")),
        ]);
        let memory = Arc::new(MemoryCache::new());
        let persistent = Arc::new(FakePersistent::default());
        let p = pipeline(
            source.clone(),
            vec![memory.clone(), persistent.clone()],
            FallbackPolicy::Fail,
        );

        let first = p.run(true).await.unwrap();
        let second = p.run(true).await.unwrap();

        assert_eq!(source.calls(), 2);
        assert_eq!(first.cache_status, CacheStatus::ForceRefresh);
        assert_eq!(second.cache_status, CacheStatus::ForceRefresh);

        for tier in [memory.read().await.unwrap(), persistent.read().await.unwrap()] {
            let entry = tier.unwrap();
            let stored: Vec<&str> = entry.instruments.iter().map(|i| i.tradingsymbol.as_str()).collect();
            assert_eq!(stored, vec!["ZZZ"]);
        }
    }

    #[tokio::test]
    async fn test_persistent_hit_warms_memory() {
        let source = ScriptedSource::new(vec![]);
        let memory = Arc::new(MemoryCache::new());
        let persistent = Arc::new(FakePersistent::default());
        persistent.write(&entry_aged(&["INFY"], Duration::minutes(5))).await.unwrap();
        let p = pipeline(
            source.clone(),
            vec![persistent.clone(), memory.clone()],
            FallbackPolicy::Fail,
        );

        let first = p.run(false).await.unwrap();
        assert_eq!(first.cache_status, CacheStatus::PersistentCache);
        assert!(memory.read().await.unwrap().is_some());

        let second = p.run(false).await.unwrap();
        assert_eq!(second.cache_status, CacheStatus::MemoryCache);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_fallback_prefers_memory_over_persistent() {
        let source = ScriptedSource::new(vec![fetch_failure()]);
        let memory = Arc::new(MemoryCache::new());
        let persistent = Arc::new(FakePersistent::default());
        memory.write(&entry_aged(&["MEM"], Duration::hours(5))).await.unwrap();
        persistent.write(&entry_aged(&["DB"], Duration::hours(2))).await.unwrap();
        let p = pipeline(source, vec![memory, persistent], FallbackPolicy::Fail);

        let outcome = p.run(false).await.unwrap();
        assert_eq!(outcome.cache_status, CacheStatus::FallbackMemory);
        assert_eq!(symbols(&outcome), vec!["MEM"]);
    }

    #[tokio::test]
    async fn test_fallback_to_persistent_when_memory_empty() {
        let source = ScriptedSource::new(vec![fetch_failure()]);
        let persistent = Arc::new(FakePersistent::default());
        persistent.write(&entry_aged(&["DB"], Duration::hours(2))).await.unwrap();
        let p = pipeline(
            source,
            vec![Arc::new(MemoryCache::new()), persistent],
            FallbackPolicy::Fail,
        );

        let outcome = p.run(false).await.unwrap();
        assert_eq!(outcome.cache_status, CacheStatus::FallbackPersistent);
        assert_eq!(symbols(&outcome), vec!["DB"]);
    }

    #[tokio::test]
    async fn test_unavailable_persistent_tier_is_ignored() {
        let source = ScriptedSource::new(vec![Ok(csv_body(3))]);
        let persistent = Arc::new(FakePersistent {
            fail_reads: true,
            fail_writes: true,
            ..Default::default()
        });
        let memory = Arc::new(MemoryCache::new());
        let p = pipeline(
            source,
            vec![memory.clone(), persistent.clone()],
            FallbackPolicy::Fail,
        );

        let outcome = p.run(false).await.unwrap();
        assert_eq!(outcome.cache_status, CacheStatus::FreshDownload);
        assert_eq!(persistent.writes.load(Ordering::SeqCst), 1);
        assert_eq!(memory.read().await.unwrap().unwrap().record_count(), 3);

        let statuses = p.tier_statuses().await;
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].tier, TierKind::Memory);
        assert!(statuses[0].is_fresh);
        assert!(statuses[1].error.as_deref().unwrap_or_default().contains("no such table"));
    }

    #[tokio::test]
    async fn test_tier_statuses_report_stale_entry() {
        let memory = Arc::new(MemoryCache::new());
        memory.write(&entry_aged(&["INFY", "TCS"], Duration::minutes(90))).await.unwrap();
        let p = pipeline(ScriptedSource::new(vec![]), vec![memory], FallbackPolicy::Fail);

        let statuses = p.tier_statuses().await;
        assert!(statuses[0].has_data);
        assert!(!statuses[0].is_fresh);
        assert_eq!(statuses[0].record_count, 2);
        assert!(statuses[0].cache_age_ms.unwrap() >= 90 * 60 * 1000);
    }
}
