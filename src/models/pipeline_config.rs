use crate::constants::{
    CACHE_TTL_SECONDS, DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_MIRROR_URLS, MIN_PAYLOAD_CHARS,
};
use chrono::Duration as ChronoDuration;
use std::time::Duration;

/// What to return when the fresh path fails and no tier holds any entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Serve the built-in sample dataset, marked as such
    #[default]
    Sample,
    /// Propagate the pipeline error to the caller
    Fail,
}

impl FallbackPolicy {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "sample" | "demo" => Ok(FallbackPolicy::Sample),
            "fail" | "error" | "strict" => Ok(FallbackPolicy::Fail),
            _ => Err(format!("Invalid fallback mode: '{}'. Valid values: sample, fail", s)),
        }
    }
}

/// Configuration for the download-and-cache pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Mirror URLs, tried in order
    pub mirror_urls: Vec<String>,

    /// Per-attempt timeout
    pub fetch_timeout: Duration,

    /// Responses shorter than this many characters are rejected
    pub min_payload_chars: usize,

    /// Maximum age of a cache entry served without refresh
    pub cache_ttl: ChronoDuration,

    pub fallback_policy: FallbackPolicy,

    /// Enables the persistent tier when set (e.g. `sqlite://data/instruments.db`)
    pub database_url: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mirror_urls: DEFAULT_MIRROR_URLS.iter().map(|u| u.to_string()).collect(),
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            min_payload_chars: MIN_PAYLOAD_CHARS,
            cache_ttl: ChronoDuration::seconds(CACHE_TTL_SECONDS),
            fallback_policy: FallbackPolicy::default(),
            database_url: None,
        }
    }
}

impl PipelineConfig {
    /// Build from environment variables, falling back to defaults
    ///
    /// Unparseable or out-of-range values are logged and ignored rather than rejected.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(urls) = lookup("INSTRUMENTS_URLS") {
            let urls = parse_url_list(&urls);
            if !urls.is_empty() {
                config.mirror_urls = urls;
            }
        }

        if let Some(ms) = parse_env_number::<u64>(&lookup, "FETCH_TIMEOUT_MS") {
            config.fetch_timeout = Duration::from_millis(ms);
        }

        if let Some(chars) = parse_env_number::<usize>(&lookup, "MIN_PAYLOAD_CHARS") {
            config.min_payload_chars = chars;
        }

        if let Some(secs) = parse_env_number::<i64>(&lookup, "CACHE_TTL_SECONDS") {
            match ChronoDuration::try_seconds(secs).filter(|_| secs >= 0) {
                Some(ttl) => config.cache_ttl = ttl,
                None => tracing::warn!(
                    key = "CACHE_TTL_SECONDS",
                    value = secs,
                    "Ignoring out-of-range configuration value"
                ),
            }
        }

        if let Some(mode) = lookup("FALLBACK_MODE") {
            match FallbackPolicy::from_str(&mode) {
                Ok(policy) => config.fallback_policy = policy,
                Err(e) => tracing::warn!("{}", e),
            }
        }

        config.database_url = lookup("INSTRUMENTS_DATABASE_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        config
    }

    pub fn persistent_tier_enabled(&self) -> bool {
        self.database_url.is_some()
    }
}

/// Split a comma-separated URL list, dropping blanks
pub fn parse_url_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .map(|u| u.to_string())
        .collect()
}

fn parse_env_number<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparseable configuration value");
            None
        }
    }
}
