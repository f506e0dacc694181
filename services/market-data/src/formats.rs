//! Vendor row parsers
//!
//! One function per vendor format, each mapping a single CSV row to a
//! timestamped market payload. Column layouts follow the vendor exports:
//! Yahoo daily history uses comma separation and dot decimals, Bloomberg
//! exports use semicolon separation and comma decimals.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use thiserror::Error;
use types::market::{Candle, Quote};

/// Yahoo daily history: `Date,Open,High,Low,Close,Adj Close,Volume`
const YAHOO_COLUMNS: usize = 7;
/// Bloomberg intraday bars: `time;open;close;high;low`
const BBG_INTRADAY_COLUMNS: usize = 5;
/// Bloomberg tick: `time;type;price;quantity`
const BBG_TICK_COLUMNS: usize = 4;

const BBG_SEPARATOR: char = ';';
const YAHOO_SEPARATOR: char = ',';
const BBG_DATETIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";
const YAHOO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Why a single row could not be parsed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("expected {expected} columns, got {got}")]
    ColumnCount { expected: usize, got: usize },

    #[error("null row")]
    NullRow,

    #[error("bad timestamp '{0}'")]
    Timestamp(String),

    #[error("bad number '{0}'")]
    Number(String),

    #[error("unknown tick type '{0}'")]
    TickType(String),

    #[error("bad bar: {0}")]
    Bar(#[from] types::errors::MarketDataError),
}

/// One normalized tick row
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickRow {
    Bid(Quote),
    Ask(Quote),
    Trade { price: Decimal, quantity: u64 },
}

/// Parse one Yahoo daily history row into a candle.
///
/// The adjusted close (column 5) is used as the bar close, matching the
/// dividend/split-adjusted series the vendor publishes.
pub fn parse_yahoo_daily(row: &str) -> Result<(i64, Candle), RowError> {
    let cols: Vec<&str> = row.split(YAHOO_SEPARATOR).collect();
    if cols.len() != YAHOO_COLUMNS {
        return Err(RowError::ColumnCount {
            expected: YAHOO_COLUMNS,
            got: cols.len(),
        });
    }
    if cols[1] == "null" {
        return Err(RowError::NullRow);
    }

    let date = NaiveDate::parse_from_str(cols[0], YAHOO_DATE_FORMAT)
        .map_err(|_| RowError::Timestamp(cols[0].to_string()))?;
    let timestamp = date_nanos(date)?;

    let candle = Candle::new(
        decimal(cols[1])?,
        decimal(cols[2])?,
        decimal(cols[3])?,
        decimal(cols[5])?,
        volume(cols[6])?,
    )?;
    Ok((timestamp, candle))
}

/// Parse one Bloomberg intraday bar row into a candle.
///
/// Columns arrive as time;open;close;high;low with comma decimals; bar
/// volume is not exported and is recorded as zero.
pub fn parse_bloomberg_intraday(row: &str) -> Result<(i64, Candle), RowError> {
    let cols: Vec<&str> = row.split(BBG_SEPARATOR).collect();
    if cols.len() != BBG_INTRADAY_COLUMNS {
        return Err(RowError::ColumnCount {
            expected: BBG_INTRADAY_COLUMNS,
            got: cols.len(),
        });
    }

    let timestamp = datetime_nanos(cols[0])?;
    let candle = Candle::new(
        comma_decimal(cols[1])?,
        comma_decimal(cols[3])?,
        comma_decimal(cols[4])?,
        comma_decimal(cols[2])?,
        0,
    )?;
    Ok((timestamp, candle))
}

/// Parse one Bloomberg tick row into a best-bid/best-ask/trade row
pub fn parse_bloomberg_tick(row: &str) -> Result<(i64, TickRow), RowError> {
    let cols: Vec<&str> = row.split(BBG_SEPARATOR).collect();
    if cols.len() != BBG_TICK_COLUMNS {
        return Err(RowError::ColumnCount {
            expected: BBG_TICK_COLUMNS,
            got: cols.len(),
        });
    }

    let timestamp = datetime_nanos(cols[0])?;
    let price = comma_decimal(cols[2])?;
    let quantity = volume(cols[3])?;

    let tick = match cols[1] {
        "BID" => TickRow::Bid(Quote::new(price, quantity)),
        "ASK" => TickRow::Ask(Quote::new(price, quantity)),
        "TRADE" | "NEG" => TickRow::Trade { price, quantity },
        other => return Err(RowError::TickType(other.to_string())),
    };
    Ok((timestamp, tick))
}

fn date_nanos(date: NaiveDate) -> Result<i64, RowError> {
    date.and_hms_opt(0, 0, 0)
        .and_then(|dt| dt.and_utc().timestamp_nanos_opt())
        .ok_or_else(|| RowError::Timestamp(date.to_string()))
}

fn datetime_nanos(raw: &str) -> Result<i64, RowError> {
    let datetime = NaiveDateTime::parse_from_str(raw, BBG_DATETIME_FORMAT)
        .map_err(|_| RowError::Timestamp(raw.to_string()))?;
    datetime
        .and_utc()
        .timestamp_nanos_opt()
        .ok_or_else(|| RowError::Timestamp(raw.to_string()))
}

fn decimal(raw: &str) -> Result<Decimal, RowError> {
    Decimal::from_str_exact(raw.trim()).map_err(|_| RowError::Number(raw.to_string()))
}

/// Bloomberg exports use a comma as the decimal mark
fn comma_decimal(raw: &str) -> Result<Decimal, RowError> {
    decimal(&raw.replace(',', "."))
}

fn volume(raw: &str) -> Result<u64, RowError> {
    // Vendors export volume as an integer or a float ("123" or "123.0")
    raw.trim()
        .parse::<f64>()
        .map(|v| v as u64)
        .map_err(|_| RowError::Number(raw.to_string()))
}
