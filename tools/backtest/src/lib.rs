//! Backtest harness
//!
//! Wires one synchronous bus, one matching engine, one risk ledger, one
//! feed loader and any number of strategies into a replayable run:
//! data loader → bus → engine/ledger; ledger → bus → engine; engine →
//! bus → ledger and every other subscriber.

pub mod harness;
pub mod recorder;
pub mod strategy;

pub use harness::Backtest;
pub use recorder::EventRecorder;
pub use strategy::{Strategy, StrategyHost};
