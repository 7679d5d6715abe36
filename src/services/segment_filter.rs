//! Segment filtering for decoded instrument rows.
//!
//! A row survives when its `segment` is exactly one of the allowed segments
//! and its `tradingsymbol` is non-empty after trimming. Row order is kept.

use crate::constants::{column, is_allowed_segment};
use crate::models::{Instrument, RawRecord};

/// Check a raw row against the retention rules
pub fn retains(record: &RawRecord) -> bool {
    let segment = record.get(column::SEGMENT).unwrap_or_default();
    let symbol = record.get(column::TRADINGSYMBOL).unwrap_or_default();
    is_allowed_segment(segment) && !symbol.trim().is_empty()
}

/// Filter raw rows and convert the survivors into instruments
pub fn filter<I>(records: I) -> Vec<Instrument>
where
    I: IntoIterator<Item = RawRecord>,
{
    records
        .into_iter()
        .filter(retains)
        .map(|record| Instrument::from_raw(&record))
        .collect()
}

/// Re-apply the retention rules to already typed instruments
///
/// Used on data coming back from the persistent tier, which may have been
/// written by an older build with a different allow-list.
pub fn filter_instruments(instruments: Vec<Instrument>) -> Vec<Instrument> {
    instruments
        .into_iter()
        .filter(|i| is_allowed_segment(&i.segment) && !i.tradingsymbol.trim().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::csv_decoder::decode;

    #[test]
    fn test_keeps_only_allowed_segments() {
        // header + one NSE row + one MCX row -> only the NSE row survives
        let text = "token,tradingsymbol,segment\n1,INFY,NSE\n2,GOLDM,MCX\n";
        let decoded = decode(text).unwrap();
        let instruments = filter(decoded.records);

        assert_eq!(instruments.len(), 1);
        assert_eq!(instruments[0].tradingsymbol, "INFY");
        assert_eq!(instruments[0].segment, "NSE");
    }

    #[test]
    fn test_segment_match_is_case_sensitive() {
        let text = "token,tradingsymbol,segment\n1,INFY,nse\n2,TCS,Nfo-Opt\n3,RELIANCE,BSE\n";
        let instruments = filter(decode(text).unwrap().records);

        assert_eq!(instruments.len(), 1);
        assert_eq!(instruments[0].tradingsymbol, "RELIANCE");
    }

    #[test]
    fn test_drops_blank_trading_symbol() {
        let text = "token,tradingsymbol,segment\n1,  ,NSE\n2,,BSE\n3,TCS,NSE\n";
        let instruments = filter(decode(text).unwrap().records);

        assert_eq!(instruments.len(), 1);
        assert_eq!(instruments[0].tradingsymbol, "TCS");
    }

    #[test]
    fn test_preserves_row_order() {
        let text = "token,tradingsymbol,segment\n\
                    1,ZEEL,NSE\n\
                    2,NIFTY24JANFUT,NFO-FUT\n\
                    3,ABB,BSE\n\
                    4,CRUDEOIL,MCX\n\
                    5,NIFTY24JAN21000CE,NFO-OPT\n";
        let symbols: Vec<String> = filter(decode(text).unwrap().records)
            .into_iter()
            .map(|i| i.tradingsymbol)
            .collect();

        assert_eq!(symbols, vec!["ZEEL", "NIFTY24JANFUT", "ABB", "NIFTY24JAN21000CE"]);
    }

    #[test]
    fn test_every_survivor_satisfies_invariant() {
        let segments = ["NSE", "BSE", "NFO-OPT", "NFO-FUT", "MCX", "CDS", "BCD", "", "nse"];
        let mut text = String::from("token,tradingsymbol,segment\n");
        for (i, segment) in segments.iter().enumerate() {
            let symbol = if i % 4 == 0 { "" } else { "SYM" };
            text.push_str(&format!("{},{}{},{}\n", i, symbol, i, segment));
            text.push_str(&format!("{},{},{}\n", i + 100, symbol, segment));
        }

        for instrument in filter(decode(&text).unwrap().records) {
            assert!(is_allowed_segment(&instrument.segment));
            assert!(!instrument.tradingsymbol.trim().is_empty());
        }
    }

    #[test]
    fn test_filter_instruments() {
        let instruments = vec![
            Instrument { tradingsymbol: "INFY".into(), segment: "NSE".into(), ..Default::default() },
            Instrument { tradingsymbol: "GOLD".into(), segment: "MCX".into(), ..Default::default() },
            Instrument { tradingsymbol: " ".into(), segment: "BSE".into(), ..Default::default() },
        ];
        let kept = filter_instruments(instruments);

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].tradingsymbol, "INFY");
    }
}
