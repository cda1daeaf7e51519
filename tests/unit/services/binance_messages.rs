//! Unit tests for Binance kline decoding

use breakwatch::error::DecodeError;
use breakwatch::services::binance::messages::{decode_kline_message, RestKline};
use chrono::{DateTime, Utc};
use serde_json::json;

fn kline_frame(symbol: &str, close: &str) -> String {
    json!({
        "e": "kline",
        "E": 1_700_000_030_000i64,
        "s": symbol,
        "k": {
            "t": 1_700_000_000_000i64,
            "T": 1_700_000_059_999i64,
            "s": symbol,
            "i": "1m",
            "f": 100,
            "L": 200,
            "o": "0.0010",
            "c": close,
            "h": "0.0025",
            "l": "0.0005",
            "v": "1000",
            "n": 100,
            "x": false,
            "q": "1.0000",
            "V": "500",
            "Q": "0.500",
            "B": "123456"
        }
    })
    .to_string()
}

#[test]
fn test_decode_stream_kline() {
    let candle = decode_kline_message(&kline_frame("BNBBTC", "0.0020"))
        .unwrap()
        .unwrap();
    assert_eq!(candle.symbol, "BNBBTC");
    assert_eq!(candle.open_time.timestamp_millis(), 1_700_000_000_000);
    assert_eq!(candle.close_time.timestamp_millis(), 1_700_000_059_999);
    assert_eq!(candle.close, 0.002);
    assert_eq!(candle.high, 0.0025);
    assert_eq!(candle.num_trades, 100);
    assert!(!candle.is_closed);
    assert_eq!(candle.quote_volume, 1.0);
    assert_eq!(candle.taker_buy_base_volume, 500.0);
}

#[test]
fn test_non_kline_message_is_ignored() {
    assert_eq!(decode_kline_message(r#"{"result":null,"id":1}"#).unwrap(), None);
}

#[test]
fn test_invalid_json_is_decode_error() {
    let err = decode_kline_message("not json").unwrap_err();
    assert!(matches!(err, DecodeError::Json(_)));
}

#[test]
fn test_missing_symbol_is_decode_error() {
    let err = decode_kline_message(r#"{"k":{"t":0}}"#).unwrap_err();
    assert_eq!(err, DecodeError::MissingField("s"));
}

#[test]
fn test_bad_price_is_decode_error() {
    let err = decode_kline_message(&kline_frame("BNBBTC", "abc")).unwrap_err();
    assert!(matches!(err, DecodeError::InvalidNumber { field: "c", .. }));
}

#[test]
fn test_rest_row_closed_flag_from_fetch_time() {
    let row: RestKline = serde_json::from_value(json!([
        1_700_000_000_000i64,
        "10.0",
        "12.0",
        "9.5",
        "11.0",
        "3.5",
        1_700_000_059_999i64,
        "38.5",
        42,
        "1.5",
        "16.5",
        "0"
    ]))
    .unwrap();

    let before_close = DateTime::<Utc>::from_timestamp_millis(1_700_000_030_000).unwrap();
    let after_close = DateTime::<Utc>::from_timestamp_millis(1_700_000_060_000).unwrap();

    let open = row.clone().into_candle("ETHUSDT", before_close).unwrap();
    assert!(!open.is_closed);
    assert_eq!(open.symbol, "ETHUSDT");
    assert_eq!(open.close, 11.0);
    assert_eq!(open.num_trades, 42);
    assert_eq!(open.taker_buy_base_volume, 1.5);

    let closed = row.into_candle("ETHUSDT", after_close).unwrap();
    assert!(closed.is_closed);
}
