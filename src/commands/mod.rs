pub mod probe;
pub mod pull;
pub mod serve;
pub mod status;

use crate::error::Error;
use crate::models::PipelineConfig;
use crate::server::AppState;
use std::future::Future;

/// Run a command body on a fresh multi-threaded runtime
pub(crate) fn block_on<F, T>(future: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create runtime: {}", e)))?;
    runtime.block_on(future)
}

/// Pipeline, fetcher and tiers wired from the environment
pub(crate) async fn load_state() -> Result<AppState, Error> {
    AppState::from_config(PipelineConfig::from_env()).await
}

/// Thousands separator for record counts
pub(crate) fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.insert(0, ',');
        }
        result.insert(0, c);
    }
    result
}
