pub mod cache_tier;
pub mod company_export;
pub mod csv_decoder;
pub mod instrument_fetcher;
pub mod memory_cache;
pub mod persistent_cache;
pub mod pipeline;
pub mod sample_data;
pub mod segment_filter;

pub use cache_tier::{CacheTier, SharedCacheTier};
pub use company_export::{base_symbol, export_filename, group_by_company, render_export, search_companies};
pub use csv_decoder::{decode, decode_with, DecodeStats, DecodedCsv};
pub use instrument_fetcher::{HttpFetcher, InstrumentSource, ProbeResult};
pub use memory_cache::MemoryCache;
pub use persistent_cache::SqliteCache;
pub use pipeline::{InstrumentPipeline, PipelineOutcome, PipelineState, SharedPipeline, TierStatus};
pub use sample_data::sample_instruments;
