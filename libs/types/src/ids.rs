//! Unique identifier types for backtest entities
//!
//! Order ids come from a run-scoped monotonic allocator so that several
//! backtest runs in one process never share identifiers. The run itself
//! is tagged with a UUID v7 for time-sortable log correlation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for an order
///
/// Monotonically increasing within one run; allocated by [`IdAllocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(u64);

impl OrderId {
    /// Create from a raw value (replay/import only)
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic order-id allocator, scoped to a single backtest run.
///
/// Shared (cloned) between the matching engine and the risk ledger so
/// rejected intents receive ids from the same sequence as accepted orders.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: Arc<AtomicU64>,
}

impl IdAllocator {
    /// Create a fresh allocator; the first id handed out is 1
    pub fn new() -> Self {
        Self {
            next: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Allocate the next order id
    pub fn next_order_id(&self) -> OrderId {
        OrderId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a strategy (the order owner)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyId(u64);

impl StrategyId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Instrument identifier (ticker symbol)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentId(String);

impl InstrumentId {
    /// Create a new InstrumentId from a string
    ///
    /// # Panics
    /// Panics if the symbol is empty
    pub fn new(symbol: impl Into<String>) -> Self {
        let s = symbol.into();
        assert!(!s.is_empty(), "InstrumentId must not be empty");
        Self(s)
    }

    /// Try to create an InstrumentId, returning None if invalid
    pub fn try_new(symbol: impl Into<String>) -> Option<Self> {
        let s = symbol.into();
        if s.is_empty() {
            None
        } else {
            Some(Self(s))
        }
    }

    /// Get the symbol string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for InstrumentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Unique identifier for a backtest run
///
/// Uses UUID v7 for time-based sorting of run logs and exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_is_monotonic() {
        let ids = IdAllocator::new();
        let a = ids.next_order_id();
        let b = ids.next_order_id();
        let c = ids.next_order_id();
        assert_eq!(a.as_u64(), 1);
        assert!(a < b && b < c);
    }

    #[test]
    fn test_allocator_clones_share_sequence() {
        let ids = IdAllocator::new();
        let other = ids.clone();
        let a = ids.next_order_id();
        let b = other.next_order_id();
        assert_ne!(a, b, "clones must never hand out the same id");
    }

    #[test]
    fn test_separate_runs_do_not_share_state() {
        let run1 = IdAllocator::new();
        let run2 = IdAllocator::new();
        assert_eq!(run1.next_order_id(), run2.next_order_id());
    }

    #[test]
    fn test_order_id_serialization() {
        let id = OrderId::from_raw(42);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "42");
        let deserialized: OrderId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn test_instrument_id_creation() {
        let instrument = InstrumentId::new("PETR4");
        assert_eq!(instrument.as_str(), "PETR4");
    }

    #[test]
    fn test_instrument_id_try_new() {
        assert!(InstrumentId::try_new("AAPL").is_some());
        assert!(InstrumentId::try_new("").is_none());
    }

    #[test]
    #[should_panic(expected = "InstrumentId must not be empty")]
    fn test_instrument_id_empty_panics() {
        InstrumentId::new("");
    }

    #[test]
    fn test_run_id_uniqueness() {
        let r1 = RunId::new();
        let r2 = RunId::new();
        assert_ne!(r1, r2, "RunIds should be unique");
    }
}
