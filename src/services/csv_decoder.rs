//! CSV Decoder for the instruments dump
//!
//! Turns raw delimited text into header-keyed records. The first non-empty
//! line is the header. Fields are split on `,` with quoting disabled, so a
//! delimiter inside a quoted field is NOT honoured; quote characters are
//! stripped from headers and values instead. Short lines are padded with
//! empty strings for the missing trailing columns. Lines with more fields
//! than the header are misaligned and skipped.

use crate::constants::column;
use crate::error::Error;
use crate::models::RawRecord;
use csv::ReaderBuilder;
use tracing::{debug, warn};

/// Counters collected while decoding
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Data lines seen (header excluded)
    pub total_lines: usize,
    /// Data lines whose segment passed the inline filter
    pub segment_matches: usize,
    /// Lines dropped because they could not be processed
    pub skipped_lines: usize,
}

/// Output of a decode pass
#[derive(Debug, Clone, Default)]
pub struct DecodedCsv {
    pub headers: Vec<String>,
    pub records: Vec<RawRecord>,
    pub stats: DecodeStats,
}

/// Decode every data line
pub fn decode(text: &str) -> Result<DecodedCsv, Error> {
    decode_with(text, |_| true)
}

/// Decode keeping only lines whose segment passes `keep_segment`
///
/// The segment value is checked before the rest of the line is materialised,
/// so rejected rows cost almost nothing.
pub fn decode_with<F>(text: &str, keep_segment: F) -> Result<DecodedCsv, Error>
where
    F: Fn(&str) -> bool,
{
    let trimmed = text.trim();
    let line_count = trimmed.lines().filter(|l| !l.trim().is_empty()).count();
    debug!(line_count, "Decoding instruments CSV");

    if line_count < 2 {
        return Err(Error::Format(format!(
            "CSV file appears to be empty or invalid ({} lines)",
            line_count
        )));
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(trimmed.as_bytes());

    let mut records_iter = reader.records();

    let headers: Vec<String> = loop {
        match records_iter.next() {
            Some(Ok(record)) => {
                let headers: Vec<String> = record.iter().map(clean_field).collect();
                if headers.iter().all(|h| h.is_empty()) {
                    continue;
                }
                break headers;
            }
            Some(Err(e)) => {
                return Err(Error::Format(format!("Unreadable CSV header: {}", e)));
            }
            None => {
                return Err(Error::Format("CSV file has no header line".to_string()));
            }
        }
    };

    let segment_index = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(column::SEGMENT))
        .ok_or_else(|| Error::Format("Segment column not found in CSV".to_string()))?;

    debug!(
        header_count = headers.len(),
        segment_index,
        "Headers found: {}...",
        headers.iter().take(5).cloned().collect::<Vec<_>>().join(", ")
    );

    let mut stats = DecodeStats::default();
    let mut records = Vec::new();

    for result in records_iter {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                stats.total_lines += 1;
                stats.skipped_lines += 1;
                let line = e.position().map(|p| p.line()).unwrap_or_default();
                warn!(line, error = %e, "Skipping unreadable CSV line");
                continue;
            }
        };

        // Whitespace-only lines carry no data
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        stats.total_lines += 1;

        if record.len() > headers.len() {
            stats.skipped_lines += 1;
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            warn!(
                line,
                fields = record.len(),
                expected = headers.len(),
                "Skipping CSV line with more fields than the header"
            );
            continue;
        }

        let segment = record.get(segment_index).map(clean_field).unwrap_or_default();
        if !keep_segment(&segment) {
            continue;
        }
        stats.segment_matches += 1;

        let fields = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let value = record.get(i).map(clean_field).unwrap_or_default();
                (header.clone(), value)
            })
            .collect();
        records.push(RawRecord::new(fields));
    }

    debug!(
        total_lines = stats.total_lines,
        segment_matches = stats.segment_matches,
        skipped = stats.skipped_lines,
        "Decoded instruments CSV"
    );

    Ok(DecodedCsv {
        headers,
        records,
        stats,
    })
}

/// Strip quote characters and surrounding whitespace
fn clean_field(value: &str) -> String {
    value.replace('"', "").trim().to_string()
}
