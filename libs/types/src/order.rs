//! Order lifecycle types
//!
//! An order is created on order-request receipt, mutated in place by the
//! matching engine, and leaves the pending set the moment it reaches a
//! terminal status.

use crate::errors::OrderError;
use crate::ids::{InstrumentId, OrderId, StrategyId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy order
    BUY,
    /// Sell order (closing or reducing a long)
    SELL,
    /// Short sale (opening a short; gated by the risk ledger)
    SELLSHORT,
}

impl Side {
    /// True for SELL and SELLSHORT
    pub fn is_sell(&self) -> bool {
        matches!(self, Side::SELL | Side::SELLSHORT)
    }

    /// Position delta contributed by a fill of `quantity` on this side
    pub fn signed(&self, quantity: u64) -> i64 {
        match self {
            Side::BUY => quantity as i64,
            Side::SELL | Side::SELLSHORT => -(quantity as i64),
        }
    }
}

/// Order status
///
/// FILLED, REJECTED and CANCELED are terminal; exactly one terminal status
/// is ever reached per order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Accepted and awaiting matching
    NEW,
    /// Partially matched
    PARTIAL,
    /// Completely matched (terminal)
    FILLED,
    /// Refused by risk gating (terminal)
    REJECTED,
    /// Canceled (terminal; reserved, never emitted by the engine)
    CANCELED,
}

impl OrderStatus {
    /// Check if status is terminal (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::FILLED | OrderStatus::REJECTED | OrderStatus::CANCELED
        )
    }
}

/// A single order's identity and fill state
///
/// Invariants: `0 <= executed <= quantity`; `status == FILLED` exactly when
/// `executed == quantity`; `average` is non-zero only once `executed > 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub instrument: InstrumentId,
    pub side: Side,
    pub status: OrderStatus,
    /// Requested quantity (positive)
    pub quantity: u64,
    /// Limit price; zero means "match at any price" (market order)
    pub price: Decimal,
    /// Quantity filled so far
    pub executed: u64,
    /// Volume-weighted average fill price
    pub average: Decimal,
    pub owner: StrategyId,
    pub timestamp: i64,
}

impl Order {
    /// Create a new pending order
    ///
    /// Fails fast on a non-positive quantity or a negative price.
    pub fn new(
        id: OrderId,
        instrument: InstrumentId,
        side: Side,
        quantity: u64,
        price: Decimal,
        owner: StrategyId,
        timestamp: i64,
    ) -> Result<Self, OrderError> {
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity(quantity));
        }
        if price < Decimal::ZERO {
            return Err(OrderError::InvalidPrice(price.to_string()));
        }
        Ok(Self {
            id,
            instrument,
            side,
            status: OrderStatus::NEW,
            quantity,
            price,
            executed: 0,
            average: Decimal::ZERO,
            owner,
            timestamp,
        })
    }

    /// Quantity still open
    pub fn remaining(&self) -> u64 {
        self.quantity - self.executed
    }

    /// Check if the order is completely filled
    pub fn is_filled(&self) -> bool {
        self.executed == self.quantity
    }

    /// A market order matches at any price
    pub fn is_market(&self) -> bool {
        self.price.is_zero()
    }

    /// Apply a fill increment, updating the running volume-weighted average
    /// and the status. The creation timestamp is never touched; the event
    /// carrying the fill has its own occurrence time.
    ///
    /// # Panics
    /// Panics if the fill is zero or would exceed the order quantity.
    pub fn apply_fill(&mut self, fill_quantity: u64, fill_price: Decimal) {
        assert!(fill_quantity > 0, "fill must be non-zero");
        assert!(
            self.executed + fill_quantity <= self.quantity,
            "fill would exceed order quantity"
        );

        let executed = Decimal::from(self.executed);
        let filled = Decimal::from(fill_quantity);
        self.average = (self.average * executed + fill_price * filled) / (executed + filled);
        self.executed += fill_quantity;

        self.status = if self.is_filled() {
            OrderStatus::FILLED
        } else {
            OrderStatus::PARTIAL
        };
    }
}
