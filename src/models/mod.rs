mod cache_entry;
mod company;
mod instrument;
mod pipeline_config;

pub use cache_entry::{CacheEntry, CacheStatus, CsvMetadata, TierKind};
pub use company::{CompanyGroup, CorporateAction};
pub use instrument::{segment_stats, Instrument, RawRecord};
pub use pipeline_config::{parse_url_list, FallbackPolicy, PipelineConfig};
