//! Shared helpers for unit tests: fake mirrors and CSV fixtures.

use axum::Router;

pub const HEADER: &str = "instrument_token,exchange_token,tradingsymbol,name,last_price,expiry,strike,tick_size,lot_size,instrument_type,segment,exchange";

/// Serve `router` on an ephemeral localhost port and return its base URL
pub async fn spawn_mirror(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A realistic instruments CSV with `rows` NSE equities plus a few rows
/// that the segment filter must drop
pub fn csv_body(rows: usize) -> String {
    let mut body = String::from(HEADER);
    body.push('\n');
    for i in 0..rows {
        body.push_str(&format!(
            "{},{},SYM{:03},\"COMPANY {}\",0,,0,0.05,1,EQ,NSE,NSE\n",
            100_000 + i,
            400 + i,
            i,
            i
        ));
    }
    body.push_str("5720322,22345,GOLDM24JANFUT,\"GOLD\",0,2024-01-05,0,1,1,FUT,MCX-FUT,MCX\n");
    body.push_str("1234,56,USDINR24JANFUT,\"USDINR\",0,2024-01-29,0,0.0025,1000,FUT,CDS-FUT,CDS\n");
    body
}

/// Valid CSV padded with trailing whitespace lines to exactly `chars` characters
pub fn padded_body(chars: usize) -> String {
    let mut body = String::from("tradingsymbol,segment\nINFY,NSE\n");
    while body.len() < chars {
        body.push(' ');
    }
    body.truncate(chars);
    body
}

/// CSV text with the given symbols, all in `segment`
pub fn csv_with_symbols(symbols: &[&str], segment: &str) -> String {
    let mut body = String::from(HEADER);
    body.push('\n');
    for (i, symbol) in symbols.iter().enumerate() {
        body.push_str(&format!(
            "{},{},{},\"{}\",0,,0,0.05,1,EQ,{},{}\n",
            200_000 + i,
            500 + i,
            symbol,
            symbol,
            segment,
            segment
        ));
    }
    body
}
