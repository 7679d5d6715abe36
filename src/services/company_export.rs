//! Company grouping and corporate-action export.
//!
//! Derivative contracts are folded into the company they derive from by
//! stripping expiry, strike and option-type suffixes from the trading symbol.

use crate::models::{CompanyGroup, CorporateAction, Instrument};
use chrono::NaiveDate;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// `NIFTY24JAN21000CE`, `INFY24DEC1900PE`
static DATED_STRIKE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{2}[A-Z]{3}\d+(CE|PE|FUT).*").expect("dated strike regex should compile")
});

/// `INFY24DECFUT`
static DATED_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{2}[A-Z]{3}(FUT|CE|PE).*").expect("dated suffix regex should compile")
});

/// `BANKNIFTYFUT`
static CONTRACT_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(FUT|CE|PE)$").expect("contract suffix regex should compile"));

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex should compile"));

/// Segment used by `search_companies` to disable segment filtering
pub const ALL_SEGMENTS: &str = "all";

/// Company symbol an instrument belongs to
///
/// Only the first suffix pattern that matches is stripped, so letters such as
/// `CE` or `PE` inside a company name survive.
pub fn base_symbol(instrument: &Instrument) -> String {
    let symbol = instrument.tradingsymbol.as_str();
    if instrument.is_equity() {
        return symbol.to_string();
    }

    [&*DATED_STRIKE_SUFFIX, &*DATED_SUFFIX, &*CONTRACT_SUFFIX]
        .into_iter()
        .find_map(|pattern| pattern.find(symbol))
        .map(|suffix| symbol[..suffix.start()].to_string())
        .filter(|base| !base.is_empty())
        .unwrap_or_else(|| symbol.to_string())
}

/// Group instruments by base symbol, sorted by base symbol
///
/// Member order follows input order; the group name comes from the first member.
pub fn group_by_company(instruments: &[Instrument]) -> Vec<CompanyGroup> {
    let mut groups: BTreeMap<String, CompanyGroup> = BTreeMap::new();

    for instrument in instruments {
        let base = base_symbol(instrument);
        if base.is_empty() {
            continue;
        }

        groups
            .entry(base.clone())
            .or_insert_with(|| CompanyGroup {
                base_symbol: base,
                name: if instrument.name.is_empty() {
                    instrument.tradingsymbol.clone()
                } else {
                    instrument.name.clone()
                },
                symbols: Vec::new(),
            })
            .symbols
            .push(instrument.clone());
    }

    groups.into_values().collect()
}

/// Filter groups by a case-insensitive term and a segment (`all` keeps every segment)
pub fn search_companies<'a>(
    groups: &'a [CompanyGroup],
    term: &str,
    segment: &str,
) -> Vec<&'a CompanyGroup> {
    let term = term.trim().to_lowercase();

    groups
        .iter()
        .filter(|group| {
            term.is_empty()
                || group.base_symbol.to_lowercase().contains(&term)
                || group.name.to_lowercase().contains(&term)
        })
        .filter(|group| segment.eq_ignore_ascii_case(ALL_SEGMENTS) || group.has_segment(segment))
        .collect()
}

fn segment_rank(segment: &str) -> u8 {
    match segment {
        "NSE" => 0,
        "BSE" => 1,
        "NFO-FUT" => 2,
        "NFO-OPT" => 3,
        _ => 4,
    }
}

/// Render the export text for one company
pub fn render_export(group: &CompanyGroup, action: &CorporateAction) -> String {
    let mut members: Vec<&Instrument> = group.symbols.iter().collect();
    members.sort_by(|a, b| {
        segment_rank(&a.segment)
            .cmp(&segment_rank(&b.segment))
            .then_with(|| a.tradingsymbol.cmp(&b.tradingsymbol))
    });

    let mut out = format!("Corporate Action - {}", action.label());
    for instrument in members {
        out.push('\n');
        out.push_str(instrument.export_exchange());
        out.push(':');
        out.push_str(&instrument.tradingsymbol);
    }
    out
}

/// `CA_Stock_Split_05_Mar_2025.txt`
///
/// The label is reduced to ASCII alphanumerics, `-` and `_` so the name is
/// always a valid `Content-Disposition` value.
pub fn export_filename(action: &CorporateAction, date: NaiveDate) -> String {
    let label: String = WHITESPACE_RUN
        .replace_all(action.label().trim(), "_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    let label = if label.is_empty() { "Other" } else { label.as_str() };

    format!("CA_{}_{}.txt", label, date.format("%d_%b_%Y"))
}
