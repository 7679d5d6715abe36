use crate::constants::column;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One decoded CSV row before validation: header -> value pairs in column order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    fields: Vec<(String, String)>,
}

impl RawRecord {
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    /// Look up a field by header name (ASCII case-insensitive)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A tradable instrument from the Kite instruments dump
///
/// All values are kept as the strings the upstream sent; numeric columns
/// such as `last_price` or `strike` are only ever displayed or exported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    #[serde(default)]
    pub instrument_token: String,
    #[serde(default)]
    pub exchange_token: String,
    pub tradingsymbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub last_price: String,
    #[serde(default)]
    pub expiry: String,
    #[serde(default)]
    pub strike: String,
    #[serde(default)]
    pub tick_size: String,
    #[serde(default)]
    pub lot_size: String,
    #[serde(default)]
    pub instrument_type: String,
    pub segment: String,
    #[serde(default)]
    pub exchange: String,
}

impl Instrument {
    /// Build from a raw record. Unknown columns are dropped, missing ones become empty.
    pub fn from_raw(record: &RawRecord) -> Self {
        let field = |name: &str| record.get(name).unwrap_or_default().to_string();

        Self {
            instrument_token: field(column::INSTRUMENT_TOKEN),
            exchange_token: field(column::EXCHANGE_TOKEN),
            tradingsymbol: field(column::TRADINGSYMBOL),
            name: field(column::NAME),
            last_price: field(column::LAST_PRICE),
            expiry: field(column::EXPIRY),
            strike: field(column::STRIKE),
            tick_size: field(column::TICK_SIZE),
            lot_size: field(column::LOT_SIZE),
            instrument_type: field(column::INSTRUMENT_TYPE),
            segment: field(column::SEGMENT),
            exchange: field(column::EXCHANGE),
        }
    }

    /// Derivatives trade on NFO; cash segments use their own code
    pub fn export_exchange(&self) -> &str {
        match self.segment.as_str() {
            "NFO-FUT" | "NFO-OPT" => "NFO",
            other => other,
        }
    }

    pub fn is_equity(&self) -> bool {
        self.instrument_type == "EQ"
    }
}

/// Count instruments per segment, ordered by segment name
pub fn segment_stats(instruments: &[Instrument]) -> BTreeMap<String, usize> {
    let mut stats = BTreeMap::new();
    for instrument in instruments {
        let segment = if instrument.segment.is_empty() {
            "UNKNOWN".to_string()
        } else {
            instrument.segment.clone()
        };
        *stats.entry(segment).or_insert(0) += 1;
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> RawRecord {
        RawRecord::new(
            pairs
                .iter()
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_raw_record_lookup_is_case_insensitive() {
        let record = raw(&[("Segment", "NSE"), ("tradingsymbol", "INFY")]);
        assert_eq!(record.get("segment"), Some("NSE"));
        assert_eq!(record.get("TRADINGSYMBOL"), Some("INFY"));
        assert_eq!(record.get("expiry"), None);
    }

    #[test]
    fn test_from_raw_fills_missing_columns() {
        let record = raw(&[
            ("instrument_token", "408065"),
            ("tradingsymbol", "INFY"),
            ("segment", "NSE"),
            ("unexpected", "ignored"),
        ]);
        let instrument = Instrument::from_raw(&record);

        assert_eq!(instrument.instrument_token, "408065");
        assert_eq!(instrument.tradingsymbol, "INFY");
        assert_eq!(instrument.segment, "NSE");
        assert_eq!(instrument.expiry, "");
        assert_eq!(instrument.exchange, "");
    }

    #[test]
    fn test_export_exchange() {
        let mut instrument = Instrument {
            tradingsymbol: "NIFTY24JANFUT".to_string(),
            segment: "NFO-FUT".to_string(),
            ..Default::default()
        };
        assert_eq!(instrument.export_exchange(), "NFO");

        instrument.segment = "BSE".to_string();
        assert_eq!(instrument.export_exchange(), "BSE");
    }

    #[test]
    fn test_segment_stats() {
        let instruments = vec![
            Instrument { tradingsymbol: "A".into(), segment: "NSE".into(), ..Default::default() },
            Instrument { tradingsymbol: "B".into(), segment: "NSE".into(), ..Default::default() },
            Instrument { tradingsymbol: "C".into(), segment: "BSE".into(), ..Default::default() },
        ];
        let stats = segment_stats(&instruments);

        assert_eq!(stats.get("NSE"), Some(&2));
        assert_eq!(stats.get("BSE"), Some(&1));
        assert_eq!(stats.keys().cloned().collect::<Vec<_>>(), vec!["BSE", "NSE"]);
    }

    #[test]
    fn test_instrument_json_uses_upstream_keys() {
        let instrument = Instrument {
            tradingsymbol: "INFY".into(),
            segment: "NSE".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&instrument).unwrap();
        assert_eq!(json["tradingsymbol"], "INFY");
        assert_eq!(json["segment"], "NSE");
        assert_eq!(json["lot_size"], "");
    }
}
