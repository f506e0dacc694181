//! Round-trip trade cycle
//!
//! One cycle aggregates every fill of a strategy from the moment any
//! position opens until all of its positions return to zero, possibly
//! spanning several instruments and orders. It carries the signed cash
//! flows, fee/tax accumulators, the peak allocation and the intrabar
//! mark-to-market extremes that feed the summary.

use crate::config::LedgerConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use types::ids::{InstrumentId, OrderId};
use types::order::Side;

/// Last seen close/high/low marks for one instrument
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Marks {
    pub close: Decimal,
    pub high: Decimal,
    pub low: Decimal,
}

impl Marks {
    /// Point marks from a single print
    pub fn from_price(price: Decimal) -> Self {
        Self {
            close: price,
            high: price,
            low: price,
        }
    }
}

/// One open or archived round-trip aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeCycle {
    /// Timestamp of the first fill
    pub opened_at: i64,
    /// Signed position per instrument
    pub positions: BTreeMap<InstrumentId, i64>,
    /// Orders that contributed fills
    pub orders: BTreeSet<OrderId>,
    /// Accumulated fees (flat per order + flow)
    pub fee: Decimal,
    /// Accumulated taxes (flow + profit on close)
    pub tax: Decimal,
    /// Signed buy-side cash flow (negative: cash out)
    pub buy_flow: Decimal,
    /// Signed sell-side cash flow (positive: cash in)
    pub sell_flow: Decimal,
    /// Peak absolute allocation reached
    pub max_alloc: Decimal,
    /// Realized P&L, set at close
    pub pnl: Decimal,
    /// pnl / max_alloc, set at close
    pub gross_return: Decimal,
    /// (pnl - fee - tax) / max_alloc, set at close
    pub net_return: Decimal,
    /// Best close-based open result seen
    pub max_profit_close: Decimal,
    /// Best high/low-based open result seen
    pub max_profit_range: Decimal,
    /// Worst close-based open result seen
    pub max_drawdown_close: Decimal,
    /// Worst high/low-based open result seen
    pub max_drawdown_range: Decimal,
    /// Fill events aggregated into this cycle
    pub fills: u32,
}

impl TradeCycle {
    pub fn new(opened_at: i64) -> Self {
        Self {
            opened_at,
            positions: BTreeMap::new(),
            orders: BTreeSet::new(),
            fee: Decimal::ZERO,
            tax: Decimal::ZERO,
            buy_flow: Decimal::ZERO,
            sell_flow: Decimal::ZERO,
            max_alloc: Decimal::ZERO,
            pnl: Decimal::ZERO,
            gross_return: Decimal::ZERO,
            net_return: Decimal::ZERO,
            max_profit_close: Decimal::ZERO,
            max_profit_range: Decimal::ZERO,
            max_drawdown_close: Decimal::ZERO,
            max_drawdown_range: Decimal::ZERO,
            fills: 0,
        }
    }

    /// No fills aggregated yet
    pub fn is_idle(&self) -> bool {
        self.orders.is_empty()
    }

    /// Every tracked position is back to zero
    pub fn is_flat(&self) -> bool {
        self.positions.values().all(|pos| *pos == 0)
    }

    /// Book one fill: position, cash flows, per-order fee, flow fee and
    /// flow tax, and the peak allocation.
    pub fn apply_fill(
        &mut self,
        order_id: OrderId,
        instrument: &InstrumentId,
        side: Side,
        quantity: u64,
        price: Decimal,
        config: &LedgerConfig,
    ) {
        if self.orders.insert(order_id) {
            self.fee += config.order_fee;
        }

        *self.positions.entry(instrument.clone()).or_insert(0) += side.signed(quantity);

        let notional = price * Decimal::from(quantity);
        let flow = notional * config.leverage;
        match side {
            Side::BUY => {
                self.buy_flow -= flow;
                self.fee += config.flow_fee * notional;
                self.tax += config.buy_tax * notional;
            }
            Side::SELL | Side::SELLSHORT => {
                self.sell_flow += flow;
                self.fee += config.flow_fee * notional;
                self.tax += config.sell_tax * notional;
            }
        }

        let alloc = (self.buy_flow + self.sell_flow).abs();
        self.max_alloc = self.max_alloc.max(alloc);
        self.fills += 1;
    }

    /// Open result marking every position at the given per-instrument mark
    fn result_at<F>(&self, marks: &BTreeMap<InstrumentId, Marks>, pick: F, leverage: Decimal) -> Decimal
    where
        F: Fn(&Marks) -> Decimal,
    {
        let mut result = self.buy_flow + self.sell_flow;
        for (instrument, position) in &self.positions {
            if *position == 0 {
                continue;
            }
            if let Some(marks) = marks.get(instrument) {
                result += Decimal::from(*position) * pick(marks) * leverage;
            }
        }
        result
    }

    /// Close-based open result (mark-to-market)
    pub fn open_result(&self, marks: &BTreeMap<InstrumentId, Marks>, leverage: Decimal) -> Decimal {
        self.result_at(marks, |m| m.close, leverage)
    }

    /// Update the intrabar profit/drawdown extremes from the latest marks.
    /// High/low extremes take the better/worse of the two bar edges so
    /// they stay correct for short positions.
    pub fn mark(&mut self, marks: &BTreeMap<InstrumentId, Marks>, leverage: Decimal) {
        if self.is_idle() {
            return;
        }
        let at_close = self.result_at(marks, |m| m.close, leverage);
        let at_high = self.result_at(marks, |m| m.high, leverage);
        let at_low = self.result_at(marks, |m| m.low, leverage);

        self.max_profit_close = self.max_profit_close.max(at_close);
        self.max_drawdown_close = self.max_drawdown_close.min(at_close);
        self.max_profit_range = self.max_profit_range.max(at_high.max(at_low));
        self.max_drawdown_range = self.max_drawdown_range.min(at_high.min(at_low));
    }

    /// Seal the cycle once flat: realize P&L, apply the profit tax and
    /// compute the return ratios. Returns the capital advance
    /// `pnl - tax - fee`.
    pub fn close(&mut self, config: &LedgerConfig) -> Decimal {
        debug_assert!(self.is_flat(), "cycle closed while positions open");

        self.pnl = self.buy_flow + self.sell_flow;
        if self.pnl > Decimal::ZERO {
            self.tax += config.profit_tax * self.pnl;
        }

        if !self.max_alloc.is_zero() {
            self.gross_return = self.pnl / self.max_alloc;
            self.net_return = (self.pnl - self.fee - self.tax) / self.max_alloc;
        }

        self.pnl - self.tax - self.fee
    }
}
