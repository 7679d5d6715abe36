use crate::constants::ALLOWED_SEGMENTS;
use crate::error::Error;
use crate::models::{segment_stats, CacheStatus, CompanyGroup, CorporateAction, TierKind};
use crate::server::AppState;
use crate::services::company_export::{self, ALL_SEGMENTS};
use crate::services::{PipelineOutcome, ProbeResult, TierStatus};
use crate::utils::format_mb;
use axum::{
    extract::{Query, State},
    http::{
        header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, error, info, instrument, warn};

/// Error body shared by every endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_status: Option<CacheStatus>,
}

fn error_response(status: StatusCode, error: &str, details: String) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            details,
            timestamp: Utc::now(),
            cache_status: None,
        }),
    )
        .into_response()
}

/// 500 for a pipeline that produced nothing to serve
fn no_data_response(message: &str, e: &Error) -> Response {
    error!(error = %e, "{}", message);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: message.to_string(),
            details: e.to_string(),
            timestamp: Utc::now(),
            cache_status: Some(CacheStatus::NoData),
        }),
    )
        .into_response()
}

/// Query parameters for /api/instruments
#[derive(Debug, Deserialize, Default)]
pub struct InstrumentsQuery {
    /// `true` bypasses every cache tier
    pub refresh: Option<String>,
}

impl InstrumentsQuery {
    fn force_refresh(&self) -> bool {
        self.refresh.as_deref() == Some("true")
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentsDebug {
    pub force_refresh: bool,
    pub from_cache: bool,
    pub cache_age_ms: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentsResponse {
    pub instruments: serde_json::Value,
    pub cached: bool,
    pub last_updated: DateTime<Utc>,
    pub count: usize,
    pub allowed_segments: &'static [&'static str],
    pub segment_stats: BTreeMap<String, usize>,
    pub cache_status: CacheStatus,
    pub debug: InstrumentsDebug,
}

impl InstrumentsResponse {
    fn from_outcome(outcome: &PipelineOutcome, force_refresh: bool) -> Result<Self, Error> {
        let now = Utc::now();
        Ok(Self {
            instruments: serde_json::to_value(outcome.instruments.as_ref())?,
            cached: outcome.served_from_cache,
            last_updated: outcome.last_updated,
            count: outcome.instruments.len(),
            allowed_segments: ALLOWED_SEGMENTS,
            segment_stats: segment_stats(&outcome.instruments),
            cache_status: outcome.cache_status,
            debug: InstrumentsDebug {
                force_refresh,
                from_cache: outcome.served_from_cache,
                cache_age_ms: (now - outcome.last_updated).num_milliseconds(),
                timestamp: now,
            },
        })
    }
}

/// GET /api/instruments - Serve the filtered instrument list
///
/// Examples:
/// - /api/instruments (cached when fresh)
/// - /api/instruments?refresh=true (skip every cache tier)
#[instrument(skip(app_state))]
pub async fn get_instruments_handler(
    State(app_state): State<AppState>,
    Query(params): Query<InstrumentsQuery>,
) -> Response {
    let force_refresh = params.force_refresh();
    debug!(force_refresh, "Received request for instruments");

    let outcome = match app_state.pipeline.run(force_refresh).await {
        Ok(outcome) => outcome,
        Err(e) => return no_data_response("Failed to load instruments", &e),
    };

    match InstrumentsResponse::from_outcome(&outcome, force_refresh) {
        Ok(body) => {
            info!(
                count = body.count,
                cache_status = %body.cache_status,
                "Returning instruments"
            );
            let mut headers = HeaderMap::new();
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
            (StatusCode::OK, headers, Json(body)).into_response()
        }
        Err(e) => no_data_response("Failed to serialize instruments", &e),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub message: &'static str,
    pub count: usize,
    pub last_updated: DateTime<Utc>,
    pub allowed_segments: &'static [&'static str],
    pub segment_stats: BTreeMap<String, usize>,
    pub cache_status: CacheStatus,
}

/// POST /api/instruments - Force a refresh from the upstream mirrors
#[instrument(skip(app_state))]
pub async fn refresh_instruments_handler(State(app_state): State<AppState>) -> Response {
    info!("Force refreshing instruments");

    match app_state.pipeline.run(true).await {
        Ok(outcome) => {
            if !outcome.cache_status.is_fresh_data() {
                warn!(cache_status = %outcome.cache_status, "Refresh failed, served fallback data");
            }
            let body = RefreshResponse {
                message: "Instruments data refreshed successfully",
                count: outcome.instruments.len(),
                last_updated: outcome.last_updated,
                allowed_segments: ALLOWED_SEGMENTS,
                segment_stats: segment_stats(&outcome.instruments),
                cache_status: outcome.cache_status,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => no_data_response("Failed to refresh instruments", &e),
    }
}

/// Integrity summary of one tier's entry
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataIntegrity {
    pub has_valid_instruments: bool,
    /// Segment counts recorded at download time add up to the stored record count
    pub record_count_matches: bool,
    #[serde(rename = "dataSizeMB")]
    pub data_size_mb: f64,
    pub segments_included: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierStatusView {
    #[serde(flatten)]
    pub status: TierStatus,
    pub data_integrity: Option<DataIntegrity>,
}

impl From<TierStatus> for TierStatusView {
    fn from(status: TierStatus) -> Self {
        let data_integrity = status.has_data.then(|| {
            let (record_count_matches, size_bytes, segments) = match &status.metadata {
                Some(metadata) => (
                    metadata.segments_included.values().sum::<usize>() == status.record_count,
                    metadata.size_bytes,
                    metadata.segments_included.keys().cloned().collect(),
                ),
                None => (true, 0, Vec::new()),
            };
            DataIntegrity {
                has_valid_instruments: status.record_count > 0,
                record_count_matches,
                data_size_mb: format_mb(size_bytes),
                segments_included: segments,
            }
        });
        Self {
            status,
            data_integrity,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub memory: Option<TierStatusView>,
    pub persistent: Option<TierStatusView>,
    pub persistent_configured: bool,
    pub cache_ttl_seconds: i64,
    pub timestamp: DateTime<Utc>,
}

/// GET /api/status - Inspect cache tiers without fetching
#[instrument(skip(app_state))]
pub async fn status_handler(State(app_state): State<AppState>) -> impl IntoResponse {
    let mut memory = None;
    let mut persistent = None;

    for status in app_state.pipeline.tier_statuses().await {
        match status.tier {
            TierKind::Memory => memory = Some(status.into()),
            TierKind::Persistent => persistent = Some(status.into()),
        }
    }

    let body = StatusResponse {
        memory,
        persistent,
        persistent_configured: app_state.config.persistent_tier_enabled(),
        cache_ttl_seconds: app_state.pipeline.ttl().num_seconds(),
        timestamp: Utc::now(),
    };

    (StatusCode::OK, Json(body))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeEnvironment {
    pub version: &'static str,
    pub os: &'static str,
    pub arch: &'static str,
    pub fetch_timeout_ms: u128,
    pub min_payload_chars: usize,
    pub persistent_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct DebugResponse {
    pub timestamp: DateTime<Utc>,
    pub results: Vec<ProbeResult>,
    pub environment: RuntimeEnvironment,
}

/// GET /api/debug - Probe every mirror and report the runtime environment
#[instrument(skip(app_state))]
pub async fn debug_handler(State(app_state): State<AppState>) -> impl IntoResponse {
    let results = app_state.fetcher.probe().await;
    let reachable = results.iter().filter(|r| r.success).count();
    info!(mirrors = results.len(), reachable, "Mirror probe complete");

    let body = DebugResponse {
        timestamp: Utc::now(),
        results,
        environment: RuntimeEnvironment {
            version: env!("CARGO_PKG_VERSION"),
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            fetch_timeout_ms: app_state.config.fetch_timeout.as_millis(),
            min_payload_chars: app_state.config.min_payload_chars,
            persistent_enabled: app_state.persistent_enabled,
        },
    };

    (StatusCode::OK, Json(body))
}

/// Query parameters for /api/companies
#[derive(Debug, Deserialize)]
pub struct CompaniesQuery {
    #[serde(default)]
    pub search: String,
    /// `all` (default) or one of the allowed segments
    #[serde(default = "default_segment")]
    pub segment: String,
    pub limit: Option<usize>,
}

fn default_segment() -> String {
    ALL_SEGMENTS.to_string()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompaniesResponse {
    pub companies: Vec<CompanyGroup>,
    /// Matches before `limit` is applied
    pub total: usize,
    pub cache_status: CacheStatus,
    pub last_updated: DateTime<Utc>,
}

/// GET /api/companies - Instruments grouped by company
///
/// Examples:
/// - /api/companies?search=infy
/// - /api/companies?search=tata&segment=NFO-FUT&limit=20
#[instrument(skip(app_state))]
pub async fn companies_handler(
    State(app_state): State<AppState>,
    Query(params): Query<CompaniesQuery>,
) -> Response {
    let outcome = match app_state.pipeline.run(false).await {
        Ok(outcome) => outcome,
        Err(e) => return no_data_response("Failed to load instruments", &e),
    };

    let groups = company_export::group_by_company(&outcome.instruments);
    let matches = company_export::search_companies(&groups, &params.search, &params.segment);
    let total = matches.len();
    let companies: Vec<CompanyGroup> = matches
        .into_iter()
        .take(params.limit.unwrap_or(usize::MAX))
        .cloned()
        .collect();

    info!(
        search = params.search,
        segment = params.segment,
        total,
        returned = companies.len(),
        "Returning company groups"
    );

    let body = CompaniesResponse {
        companies,
        total,
        cache_status: outcome.cache_status,
        last_updated: outcome.last_updated,
    };
    (StatusCode::OK, Json(body)).into_response()
}

/// Query parameters for /api/export
#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub symbol: Option<String>,
    pub action: Option<String>,
}

/// GET /api/export - Download the corporate-action list for one company
///
/// Example: /api/export?symbol=INFY&action=bonus
#[instrument(skip(app_state))]
pub async fn export_handler(
    State(app_state): State<AppState>,
    Query(params): Query<ExportQuery>,
) -> Response {
    let symbol = params.symbol.as_deref().map(str::trim).unwrap_or_default();
    if symbol.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Missing symbol",
            "Please select a company before exporting".to_string(),
        );
    }

    let action = match CorporateAction::from_str(params.action.as_deref().unwrap_or_default()) {
        Ok(action) => action,
        Err(details) => return error_response(StatusCode::BAD_REQUEST, "Missing action", details),
    };

    let outcome = match app_state.pipeline.run(false).await {
        Ok(outcome) => outcome,
        Err(e) => return no_data_response("Failed to load instruments", &e),
    };

    let groups = company_export::group_by_company(&outcome.instruments);
    let Some(group) = groups
        .iter()
        .find(|g| g.base_symbol.eq_ignore_ascii_case(symbol))
    else {
        return error_response(
            StatusCode::NOT_FOUND,
            "Company not found",
            format!("No instruments found for symbol '{}'", symbol),
        );
    };

    let content = company_export::render_export(group, &action);
    let filename = company_export::export_filename(&action, Utc::now().date_naive());
    info!(
        symbol = group.base_symbol,
        action = %action,
        lines = group.symbols.len(),
        filename,
        "Exporting corporate action list"
    );

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    match format!("attachment; filename=\"{}\"", filename).parse() {
        Ok(value) => {
            headers.insert(CONTENT_DISPOSITION, value);
        }
        Err(e) => warn!(error = %e, filename, "Export filename is not a valid header value"),
    }

    (StatusCode::OK, headers, content).into_response()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: i64,
    pub memory_usage_bytes: usize,
    #[serde(rename = "memoryUsageMB")]
    pub memory_usage_mb: f64,
    pub current_system_time: DateTime<Utc>,
}

/// GET /health - Liveness
pub async fn health_handler(State(app_state): State<AppState>) -> impl IntoResponse {
    let now = Utc::now();
    let memory_bytes = app_state.memory.estimate_memory_usage().await;
    // No logging for /health endpoint (too noisy)
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: (now - app_state.started_at).num_seconds(),
        memory_usage_bytes: memory_bytes,
        memory_usage_mb: format_mb(memory_bytes),
        current_system_time: now,
    })
}
