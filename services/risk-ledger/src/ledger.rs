//! Risk/position ledger wired to the bus
//!
//! Gates strategy intents (short sales only from a flat position), forwards
//! accepted intents to the matching engine, books every fill into the
//! owner's current trade cycle, archives cycles on return-to-flat and keeps
//! the per-day equity/carry records behind the summary.

use bus::{Bus, Subscriber};
use chrono::{DateTime, Datelike};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use types::events::{Event, ExecutionReport, OrderIntent, Payload, Topic};
use types::ids::{IdAllocator, InstrumentId, StrategyId};
use types::order::{OrderStatus, Side};

use crate::config::LedgerConfig;
use crate::cycle::{Marks, TradeCycle};
use crate::summary::Summary;

/// One calendar day's closing equity and risk-free carry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayRecord {
    pub equity: Decimal,
    pub carry: Decimal,
}

/// Per-strategy account state
pub(crate) struct Account {
    pub(crate) capital: Decimal,
    pub(crate) current: TradeCycle,
    pub(crate) history: Vec<TradeCycle>,
    pub(crate) days: BTreeMap<i64, DayRecord>,
}

impl Account {
    fn new(initial_capital: Decimal) -> Self {
        Self {
            capital: initial_capital,
            current: TradeCycle::new(0),
            history: Vec::new(),
            days: BTreeMap::new(),
        }
    }
}

/// The risk/position ledger for one backtest run
pub struct RiskLedger {
    config: LedgerConfig,
    ids: IdAllocator,
    /// Aggregate position per instrument and owner (gating view)
    position: BTreeMap<InstrumentId, BTreeMap<StrategyId, i64>>,
    /// Last close/high/low marks per instrument
    marks: BTreeMap<InstrumentId, Marks>,
    accounts: BTreeMap<StrategyId, Account>,
}

impl RiskLedger {
    /// Create a ledger sharing the run's id allocator
    pub fn new(config: LedgerConfig, ids: IdAllocator) -> Self {
        Self {
            config,
            ids,
            position: BTreeMap::new(),
            marks: BTreeMap::new(),
            accounts: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Open an account for a strategy ahead of its first intent, so day
    /// records span the whole replay.
    pub fn register_strategy(&mut self, owner: StrategyId) {
        self.accounts
            .entry(owner)
            .or_insert_with(|| Account::new(self.config.initial_capital));
    }

    /// Aggregate position for one owner on one instrument
    pub fn position(&self, instrument: &InstrumentId, owner: StrategyId) -> i64 {
        self.position
            .get(instrument)
            .and_then(|by_owner| by_owner.get(&owner))
            .copied()
            .unwrap_or(0)
    }

    /// Non-zero positions of the owner's current cycle
    pub fn open_positions(&self, owner: StrategyId) -> Vec<(InstrumentId, i64)> {
        self.accounts
            .get(&owner)
            .map(|account| {
                account
                    .current
                    .positions
                    .iter()
                    .filter(|(_, pos)| **pos != 0)
                    .map(|(instrument, pos)| (instrument.clone(), *pos))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Current capital balance
    pub fn capital(&self, owner: StrategyId) -> Option<Decimal> {
        self.accounts.get(&owner).map(|account| account.capital)
    }

    /// Archived cycles so far
    pub fn closed_cycles(&self, owner: StrategyId) -> usize {
        self.accounts
            .get(&owner)
            .map(|account| account.history.len())
            .unwrap_or(0)
    }

    /// Calendar days recorded so far
    pub fn recorded_days(&self, owner: StrategyId) -> usize {
        self.accounts
            .get(&owner)
            .map(|account| account.days.len())
            .unwrap_or(0)
    }

    /// Read-side report over the owner's archived cycles and day records
    pub fn summary(&self, owner: StrategyId) -> Option<Summary> {
        self.accounts
            .get(&owner)
            .map(|account| Summary::build(owner, &self.config, account))
    }

    /// Validate a strategy intent. Short sales are rejected unless the
    /// owner's aggregate position on the instrument is exactly zero; the
    /// rejection is an order status event, not an error, and nothing is
    /// forwarded to the engine.
    fn handle_intent(
        &mut self,
        instrument: &InstrumentId,
        intent: &OrderIntent,
        timestamp: i64,
        bus: &Bus,
    ) {
        self.register_strategy(intent.owner);

        if intent.side == Side::SELLSHORT && self.position(instrument, intent.owner) != 0 {
            warn!(
                %instrument,
                owner = %intent.owner,
                "short sale from a non-flat position rejected"
            );
            let report = ExecutionReport {
                id: self.ids.next_order_id(),
                instrument: instrument.clone(),
                side: intent.side,
                status: OrderStatus::REJECTED,
                quantity: intent.quantity,
                price: intent.price,
                executed: 0,
                average: Decimal::ZERO,
                owner: intent.owner,
                timestamp,
                fill: None,
            };
            bus.publish(Event::market(
                instrument.clone(),
                Payload::Execution(report),
                timestamp,
            ));
            return;
        }

        bus.publish(Event::market(
            instrument.clone(),
            Payload::OrderRequest(intent.clone()),
            timestamp,
        ));
    }

    /// Book a PARTIAL or FILLED report into the owner's current cycle,
    /// archiving the cycle the instant its positions all return to zero.
    fn handle_fill(&mut self, instrument: &InstrumentId, report: &ExecutionReport) {
        let Some(fill) = report.fill else {
            return;
        };

        *self
            .position
            .entry(instrument.clone())
            .or_default()
            .entry(report.owner)
            .or_insert(0) += report.side.signed(fill.quantity);

        let config = self.config.clone();
        let account = self
            .accounts
            .entry(report.owner)
            .or_insert_with(|| Account::new(config.initial_capital));

        if account.current.is_idle() {
            account.current.opened_at = report.timestamp;
        }
        account.current.apply_fill(
            report.id,
            instrument,
            report.side,
            fill.quantity,
            fill.price,
            &config,
        );

        if account.current.is_flat() {
            let mut closed = std::mem::replace(&mut account.current, TradeCycle::new(report.timestamp));
            let net = closed.close(&config);
            account.capital += net;
            info!(
                owner = %report.owner,
                pnl = %closed.pnl,
                net = %net,
                capital = %account.capital,
                "trade cycle closed"
            );
            account.history.push(closed);
        }
    }

    /// Refresh marks, the open cycles' intrabar extremes and every
    /// account's record for the event's calendar day.
    fn handle_marks(&mut self, instrument: &InstrumentId, marks: Marks, timestamp: i64) {
        self.marks.insert(instrument.clone(), marks);

        let leverage = self.config.leverage;
        let daily_rate = Decimal::from_f64(self.config.daily_rate()).unwrap_or(Decimal::ZERO);
        let day = day_key(timestamp);

        for account in self.accounts.values_mut() {
            account.current.mark(&self.marks, leverage);
            let equity = account.capital + account.current.open_result(&self.marks, leverage);
            let carry = (account.capital - account.current.max_alloc) * daily_rate;
            account.days.insert(day, DayRecord { equity, carry });
        }
    }

    /// Issue opposing market orders flattening the owner's open positions
    fn flatten(&mut self, owner: StrategyId, timestamp: i64, bus: &Bus) {
        for (instrument, position) in self.open_positions(owner) {
            let side = if position > 0 { Side::SELL } else { Side::BUY };
            let quantity = position.unsigned_abs();
            debug!(%instrument, %owner, position, "flattening");
            match OrderIntent::new(owner, side, quantity, Decimal::ZERO) {
                Ok(intent) => bus.publish(Event::market(
                    instrument,
                    Payload::OrderRequest(intent),
                    timestamp,
                )),
                Err(err) => warn!(%err, "cannot build flattening order"),
            }
        }
    }

    /// Finalize the last day's mark-to-market equity and risk-free carry.
    /// Call after the end-of-run flatten has settled.
    pub fn finalize(&mut self, owner: StrategyId, timestamp: i64) {
        let leverage = self.config.leverage;
        let daily_rate = Decimal::from_f64(self.config.daily_rate()).unwrap_or(Decimal::ZERO);
        let marks = &self.marks;

        if let Some(account) = self.accounts.get_mut(&owner) {
            let day = account
                .days
                .keys()
                .next_back()
                .copied()
                .unwrap_or_else(|| day_key(timestamp));
            let equity = account.capital + account.current.open_result(marks, leverage);
            let carry = (account.capital - account.current.max_alloc) * daily_rate;
            account.days.insert(day, DayRecord { equity, carry });
        }
    }
}

/// Calendar-day bucket of a unix-nanosecond timestamp
fn day_key(timestamp: i64) -> i64 {
    let datetime = DateTime::from_timestamp_nanos(timestamp);
    datetime.date_naive().num_days_from_ce() as i64
}

impl Subscriber for RiskLedger {
    fn receive(&mut self, event: &Event, bus: &Bus) {
        match (&event.topic, &event.payload) {
            (Topic::System, Payload::Load(request)) => {
                self.position.entry(request.instrument.clone()).or_default();
            }
            (Topic::System, Payload::Close { owner }) => {
                self.flatten(*owner, event.timestamp, bus);
            }
            (Topic::Instrument(instrument), payload) => match payload {
                Payload::Candle(candle) => {
                    self.handle_marks(
                        instrument,
                        Marks {
                            close: candle.close,
                            high: candle.high,
                            low: candle.low,
                        },
                        event.timestamp,
                    );
                }
                Payload::Trade(print) => {
                    self.handle_marks(instrument, Marks::from_price(print.price), event.timestamp);
                }
                Payload::Intent(intent) => {
                    self.handle_intent(instrument, intent, event.timestamp, bus);
                }
                Payload::Execution(report)
                    if matches!(report.status, OrderStatus::PARTIAL | OrderStatus::FILLED) =>
                {
                    self.handle_fill(instrument, report);
                }
                _ => {}
            },
            _ => {}
        }
    }
}
