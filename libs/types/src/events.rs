//! Canonical bus event payloads
//!
//! Every event crossing the dispatch bus is one closed `Payload` variant
//! carrying statically typed fields, decoded once at the bus boundary.
//! Subscribers receive shared references and clone what they retain, so no
//! subscriber's edits can leak into another subscriber's view.

use crate::errors::OrderError;
use crate::ids::{InstrumentId, OrderId, StrategyId};
use crate::market::{Candle, Quote, TradePrint};
use crate::order::{Order, OrderStatus, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Bus topic: the system control channel or one instrument's channel
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    System,
    Instrument(InstrumentId),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::System => write!(f, "SYSTEM"),
            Topic::Instrument(id) => write!(f, "{}", id),
        }
    }
}

/// Vendor feed source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataSource {
    YAHOO,
    BLOOMBERG,
    RAW,
}

/// Vendor feed granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FeedKind {
    /// Daily history bars
    HIST,
    /// Intraday bars
    INTR,
    /// Tick-by-tick quotes and trades
    TICK,
}

/// One instrument's feed: where its rows come from and how to read them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedRequest {
    pub instrument: InstrumentId,
    pub source: DataSource,
    pub kind: FeedKind,
    pub file: PathBuf,
}

/// A strategy's wish to trade, pending risk validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub owner: StrategyId,
    pub side: Side,
    pub quantity: u64,
    pub price: Decimal,
}

impl OrderIntent {
    /// Create an intent, failing fast on malformed quantity or price
    pub fn new(
        owner: StrategyId,
        side: Side,
        quantity: u64,
        price: Decimal,
    ) -> Result<Self, OrderError> {
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity(quantity));
        }
        if price < Decimal::ZERO {
            return Err(OrderError::InvalidPrice(price.to_string()));
        }
        Ok(Self {
            owner,
            side,
            quantity,
            price,
        })
    }
}

/// Fill increment attached to PARTIAL and FILLED reports
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub quantity: u64,
    pub price: Decimal,
}

/// Full order snapshot published on every lifecycle transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub id: OrderId,
    pub instrument: InstrumentId,
    pub side: Side,
    pub status: OrderStatus,
    pub quantity: u64,
    pub price: Decimal,
    pub executed: u64,
    pub average: Decimal,
    pub owner: StrategyId,
    pub timestamp: i64,
    /// Present on PARTIAL and FILLED only
    pub fill: Option<Fill>,
}

impl ExecutionReport {
    /// Snapshot an order's current state
    pub fn from_order(order: &Order, fill: Option<Fill>) -> Self {
        Self {
            id: order.id,
            instrument: order.instrument.clone(),
            side: order.side,
            status: order.status,
            quantity: order.quantity,
            price: order.price,
            executed: order.executed,
            average: order.average,
            owner: order.owner,
            timestamp: order.timestamp,
            fill,
        }
    }

    /// Signed position delta of this report's fill (zero when no fill)
    pub fn signed_fill(&self) -> i64 {
        self.fill
            .map(|f| self.side.signed(f.quantity))
            .unwrap_or(0)
    }
}

/// The closed set of payloads the bus transports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    /// Register one instrument's feed with the loader (SYSTEM topic)
    Load(FeedRequest),
    /// Start the replay (SYSTEM topic)
    Run,
    /// Flatten a strategy's open positions at end of run (SYSTEM topic)
    Close { owner: StrategyId },
    /// One OHLCV bar
    Candle(Candle),
    /// Best-bid replacement
    BestBid(Quote),
    /// Best-ask replacement
    BestAsk(Quote),
    /// Tape-only execution print
    Trade(TradePrint),
    /// Strategy intent, addressed to the risk ledger
    Intent(OrderIntent),
    /// Validated order, addressed to the matching engine
    OrderRequest(OrderIntent),
    /// Order lifecycle snapshot (NEW/PARTIAL/FILLED/REJECTED)
    Execution(ExecutionReport),
}

impl Payload {
    /// Partition name, for logs and raw event files
    pub fn partition(&self) -> &'static str {
        match self {
            Payload::Load(_) => "LOAD",
            Payload::Run => "RUN",
            Payload::Close { .. } => "CLOSE",
            Payload::Candle(_) => "CANDLE",
            Payload::BestBid(_) => "BEST_BID",
            Payload::BestAsk(_) => "BEST_ASK",
            Payload::Trade(_) => "TRADE",
            Payload::Intent(_) => "INTENT",
            Payload::OrderRequest(_) => "ORDER",
            Payload::Execution(report) => match report.status {
                OrderStatus::NEW => "NEW",
                OrderStatus::PARTIAL => "PARTIAL",
                OrderStatus::FILLED => "FILLED",
                OrderStatus::REJECTED => "REJECTED",
                OrderStatus::CANCELED => "CANCELED",
            },
        }
    }
}

/// One dispatched event: a payload on a topic at a point in replay time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub topic: Topic,
    pub payload: Payload,
    pub timestamp: i64,
}

impl Event {
    /// Event on the system control topic
    pub fn system(payload: Payload, timestamp: i64) -> Self {
        Self {
            topic: Topic::System,
            payload,
            timestamp,
        }
    }

    /// Event on an instrument topic
    pub fn market(instrument: InstrumentId, payload: Payload, timestamp: i64) -> Self {
        Self {
            topic: Topic::Instrument(instrument),
            payload,
            timestamp,
        }
    }
}
