//! Built-in sample dataset served when nothing else is available.
//!
//! Only used when every mirror fails, no cache tier holds an entry and the
//! fallback policy allows it. Responses carry `cacheStatus = sample_data`.

use crate::models::Instrument;

// (token, exchange_token, tradingsymbol, name, expiry, strike, lot_size, instrument_type, segment, exchange)
const SAMPLE_ROWS: &[(&str, &str, &str, &str, &str, &str, &str, &str, &str, &str)] = &[
    ("408065", "1594", "INFY", "INFOSYS", "", "0", "1", "EQ", "NSE", "NSE"),
    ("128053508", "500209", "INFY", "INFOSYS", "", "0", "1", "EQ", "BSE", "BSE"),
    ("13368834", "52222", "INFY24DECFUT", "INFY", "2024-12-26", "0", "400", "FUT", "NFO-FUT", "NFO"),
    ("13369090", "52223", "INFY24DEC1900CE", "INFY", "2024-12-26", "1900", "400", "CE", "NFO-OPT", "NFO"),
    ("13369346", "52224", "INFY24DEC1900PE", "INFY", "2024-12-26", "1900", "400", "PE", "NFO-OPT", "NFO"),
    ("2953217", "11536", "TCS", "TATA CONSULTANCY SERV LT", "", "0", "1", "EQ", "NSE", "NSE"),
    ("128210948", "532540", "TCS", "TATA CONSULTANCY SERV LT", "", "0", "1", "EQ", "BSE", "BSE"),
    ("13371650", "52232", "TCS24DECFUT", "TCS", "2024-12-26", "0", "175", "FUT", "NFO-FUT", "NFO"),
    ("738561", "2885", "RELIANCE", "RELIANCE INDUSTRIES", "", "0", "1", "EQ", "NSE", "NSE"),
    ("128083204", "500325", "RELIANCE", "RELIANCE INDUSTRIES", "", "0", "1", "EQ", "BSE", "BSE"),
    ("13376770", "52252", "RELIANCE24DECFUT", "RELIANCE", "2024-12-26", "0", "500", "FUT", "NFO-FUT", "NFO"),
    ("13377026", "52253", "RELIANCE24DEC1300CE", "RELIANCE", "2024-12-26", "1300", "500", "CE", "NFO-OPT", "NFO"),
    ("341249", "1333", "HDFCBANK", "HDFC BANK", "", "0", "1", "EQ", "NSE", "NSE"),
    ("13364226", "52210", "HDFCBANK24DECFUT", "HDFCBANK", "2024-12-26", "0", "550", "FUT", "NFO-FUT", "NFO"),
    ("13364482", "52211", "NIFTY24DEC24000CE", "NIFTY", "2024-12-26", "24000", "25", "CE", "NFO-OPT", "NFO"),
    ("13364738", "52212", "NIFTY24DECFUT", "NIFTY", "2024-12-26", "0", "25", "FUT", "NFO-FUT", "NFO"),
];

/// The sample instruments, in a stable order
pub fn sample_instruments() -> Vec<Instrument> {
    SAMPLE_ROWS
        .iter()
        .map(
            |&(token, exchange_token, symbol, name, expiry, strike, lot_size, instrument_type, segment, exchange)| {
                Instrument {
                    instrument_token: token.to_string(),
                    exchange_token: exchange_token.to_string(),
                    tradingsymbol: symbol.to_string(),
                    name: name.to_string(),
                    last_price: "0".to_string(),
                    expiry: expiry.to_string(),
                    strike: strike.to_string(),
                    tick_size: "0.05".to_string(),
                    lot_size: lot_size.to_string(),
                    instrument_type: instrument_type.to_string(),
                    segment: segment.to_string(),
                    exchange: exchange.to_string(),
                }
            },
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::is_allowed_segment;

    #[test]
    fn test_sample_satisfies_invariants() {
        let instruments = sample_instruments();
        assert!(!instruments.is_empty());
        for instrument in &instruments {
            assert!(is_allowed_segment(&instrument.segment));
            assert!(!instrument.tradingsymbol.is_empty());
        }
    }

    #[test]
    fn test_sample_covers_all_segments() {
        let instruments = sample_instruments();
        for segment in crate::constants::ALLOWED_SEGMENTS {
            assert!(instruments.iter().any(|i| i.segment == *segment), "missing {}", segment);
        }
    }
}
