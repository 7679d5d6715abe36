use crate::constants::DEFAULT_PORT;
use std::path::PathBuf;
use tracing::warn;

/// Get static UI directory from environment variable or use default
pub fn get_public_dir() -> PathBuf {
    std::env::var("PUBLIC_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("public"))
}

/// Get HTTP port from environment variable or use default
pub fn get_port() -> u16 {
    parse_port(std::env::var("PORT").ok().as_deref())
}

fn parse_port(value: Option<&str>) -> u16 {
    match value.map(str::trim) {
        None | Some("") => DEFAULT_PORT,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(value = raw, "Invalid PORT, using default {}", DEFAULT_PORT);
            DEFAULT_PORT
        }),
    }
}

/// Format a byte count as megabytes with two decimals
pub fn format_mb(bytes: usize) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}
