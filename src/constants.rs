//! Instrument Pipeline Constants
//!
//! Upstream endpoints, segment allow-list, cache lifetime and the
//! column layout of the Kite instruments dump.
//!
//! ## Upstream CSV Format
//!
//! The instruments dump has 12 columns:
//! `instrument_token, exchange_token, tradingsymbol, name, last_price, expiry,
//! strike, tick_size, lot_size, instrument_type, segment, exchange`
//!
//! Only the `segment` column is mandatory for decoding. Any other missing
//! column decodes to an empty string.

/// Default mirror list, tried in order (HTTPS first, plain HTTP fallback)
pub const DEFAULT_MIRROR_URLS: &[&str] = &[
    "https://api.kite.trade/instruments",
    "http://api.kite.trade/instruments",
];

/// Segments retained after filtering (exact, case-sensitive match)
pub const ALLOWED_SEGMENTS: &[&str] = &["NFO-OPT", "NFO-FUT", "NSE", "BSE"];

/// Per-attempt download timeout
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 30_000;

/// Payloads shorter than this are treated as error pages
pub const MIN_PAYLOAD_CHARS: usize = 1000;

/// Cache entries older than this are stale (1 hour)
pub const CACHE_TTL_SECONDS: i64 = 60 * 60;

/// Key of the single row held by the persistent tier
pub const PERSISTENT_CACHE_KEY: &str = "latest";

/// Number of header names sampled into the persisted CSV metadata
pub const METADATA_HEADER_SAMPLE: usize = 10;

/// Characters of body kept by the mirror probe
pub const PROBE_PREVIEW_CHARS: usize = 500;

/// The upstream rejects default client identification
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub const ACCEPT_CSV: &str = "text/csv,text/plain,*/*";

/// Default HTTP port for `serve`
pub const DEFAULT_PORT: u16 = 3000;

/// Column names of the instruments dump
pub mod column {
    pub const INSTRUMENT_TOKEN: &str = "instrument_token";
    pub const EXCHANGE_TOKEN: &str = "exchange_token";
    pub const TRADINGSYMBOL: &str = "tradingsymbol";
    pub const NAME: &str = "name";
    pub const LAST_PRICE: &str = "last_price";
    pub const EXPIRY: &str = "expiry";
    pub const STRIKE: &str = "strike";
    pub const TICK_SIZE: &str = "tick_size";
    pub const LOT_SIZE: &str = "lot_size";
    pub const INSTRUMENT_TYPE: &str = "instrument_type";
    pub const SEGMENT: &str = "segment";
    pub const EXCHANGE: &str = "exchange";
}

/// Check a segment value against the allow-list
pub fn is_allowed_segment(segment: &str) -> bool {
    ALLOWED_SEGMENTS.contains(&segment)
}
