//! Risk / Position Ledger Service
//!
//! Consumes order lifecycle events, maintains per-strategy positions,
//! aggregates fills into round-trip trade cycles, books fees and taxes,
//! advances the capital balance and produces the end-of-run summary.
//!
//! **Key invariants:**
//! - There is always exactly one current trade cycle per strategy, even
//!   when inactive
//! - A cycle is archived exactly when every tracked position returns to
//!   zero, and at that instant `pnl == buy_flow + sell_flow`
//! - Sequential cash/tax bookkeeping never drifts: the capital balance
//!   advances only at cycle close, by `pnl - tax - fee`

pub mod config;
pub mod cycle;
pub mod ledger;
pub mod summary;

pub use config::LedgerConfig;
pub use cycle::TradeCycle;
pub use ledger::RiskLedger;
pub use summary::Summary;
