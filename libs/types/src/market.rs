//! Market data types: top-of-book quotes, candles and tape prints
//!
//! The book keeps at most one quote per side; a quote with quantity zero
//! is a synthetic entry with unlimited liquidity, used for candle-derived
//! prices where no depth information exists.

use crate::errors::MarketDataError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Book side of a quote update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuoteSide {
    BID,
    ASK,
}

/// Synthetic top-of-book entry for one side
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price: Decimal,
    /// Available quantity; zero signals unlimited synthetic liquidity
    pub quantity: u64,
}

impl Quote {
    pub fn new(price: Decimal, quantity: u64) -> Self {
        Self { price, quantity }
    }

    /// Quote able to absorb any remaining order quantity
    pub fn unlimited(price: Decimal) -> Self {
        Self { price, quantity: 0 }
    }

    pub fn is_unlimited(&self) -> bool {
        self.quantity == 0
    }

    /// Quantity this quote can provide toward `remaining`
    pub fn available(&self, remaining: u64) -> u64 {
        if self.is_unlimited() {
            remaining
        } else {
            remaining.min(self.quantity)
        }
    }

    /// Deplete a finite quote by a fill; unlimited quotes are unaffected.
    /// Returns true if the quote is exhausted.
    pub fn consume(&mut self, fill: u64) -> bool {
        if self.is_unlimited() {
            return false;
        }
        debug_assert!(fill <= self.quantity, "fill exceeds quoted quantity");
        self.quantity -= fill;
        self.quantity == 0
    }
}

/// One OHLCV bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
}

impl Candle {
    /// Create a candle, validating the bar geometry
    pub fn new(
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: u64,
    ) -> Result<Self, MarketDataError> {
        if low > high || open < low || open > high || close < low || close > high {
            return Err(MarketDataError::InvalidCandle {
                open: open.to_string(),
                high: high.to_string(),
                low: low.to_string(),
                close: close.to_string(),
            });
        }
        Ok(Self {
            open,
            high,
            low,
            close,
            volume,
        })
    }

    /// Whether a limit price was reachable inside this bar's range
    pub fn range_contains(&self, price: Decimal) -> bool {
        price >= self.low && price <= self.high
    }
}

/// One execution print on the trade tape
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradePrint {
    pub price: Decimal,
    pub quantity: u64,
    pub timestamp: i64,
}
