//! Ledger configuration: fees, taxes, capital and carry parameters

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fee, tax, capital and carry configuration for one backtest run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Flat fee charged once per distinct order contributing to a cycle
    pub order_fee: Decimal,
    /// Fee rate on fill notional (price x quantity)
    pub flow_fee: Decimal,
    /// Tax rate on buy-side fill notional
    pub buy_tax: Decimal,
    /// Tax rate on sell-side fill notional
    pub sell_tax: Decimal,
    /// Tax rate on a cycle's positive realized P&L
    pub profit_tax: Decimal,
    /// Starting capital per strategy
    pub initial_capital: Decimal,
    /// Risk-free rate, percent per year
    pub risk_free_rate: Decimal,
    /// Cash fraction required against the peak allocation (1.0 = fully cash)
    pub margin: Decimal,
    /// Cash-flow multiplier
    pub leverage: Decimal,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            order_fee: Decimal::from_str_exact("0.1").unwrap(),
            flow_fee: Decimal::ZERO,
            buy_tax: Decimal::ZERO,
            // 0.1% tax on sell flow
            sell_tax: Decimal::from_str_exact("0.001").unwrap(),
            // 15% profit tax net of the paid sell flow tax
            profit_tax: Decimal::from_str_exact("0.149").unwrap(),
            initial_capital: Decimal::from(10_000),
            risk_free_rate: Decimal::from_str_exact("13.75").unwrap(),
            margin: Decimal::ONE,
            leverage: Decimal::ONE,
        }
    }
}

impl LedgerConfig {
    /// Daily risk-free rate over a 252-session year:
    /// `(1 + annual)^(1/252) - 1`
    pub fn daily_rate(&self) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        let annual = self.risk_free_rate.to_f64().unwrap_or(0.0) / 100.0;
        (1.0 + annual).powf(1.0 / 252.0) - 1.0
    }
}
