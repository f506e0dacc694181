//! Error types for the backtester
//!
//! Comprehensive error taxonomy using thiserror

use thiserror::Error;

/// Top-level backtest error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BacktestError {
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Market data error: {0}")]
    MarketData(#[from] MarketDataError),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Unknown instrument: {symbol}")]
    UnknownInstrument { symbol: String },

    #[error("Unknown strategy: {owner}")]
    UnknownStrategy { owner: u64 },
}

/// Order-specific errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrderError {
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(u64),

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid instrument: {0}")]
    InvalidInstrument(String),

    #[error("Order not found: {order_id}")]
    NotFound { order_id: u64 },

    #[error("Order already in terminal state: {status}")]
    AlreadyTerminal { status: String },
}

/// Market data validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketDataError {
    #[error("Invalid candle: open {open}, high {high}, low {low}, close {close}")]
    InvalidCandle {
        open: String,
        high: String,
        low: String,
        close: String,
    },

    #[error("Invalid quote price: {0}")]
    InvalidQuotePrice(String),
}

/// Feed loading errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    #[error("Cannot read feed file {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("Malformed row {line} in {path}: {reason}")]
    MalformedRow {
        path: String,
        line: usize,
        reason: String,
    },

    #[error("Unsupported source/kind combination: {src} {kind}")]
    UnsupportedFormat { src: String, kind: String },
}
