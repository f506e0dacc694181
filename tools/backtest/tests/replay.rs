//! Replay determinism, feed-driven runs and stress
//!
//! A full run from vendor files, deterministic replay of a synthetic
//! series, and a longer randomized session holding the lifecycle
//! invariants.

use backtest::{Backtest, Strategy};
use market_data::SyntheticFeed;
use risk_ledger::LedgerConfig;
use rust_decimal::Decimal;
use std::io::Write;
use types::events::{DataSource, Event, FeedKind, FeedRequest, OrderIntent, Payload};
use types::ids::{InstrumentId, StrategyId};
use types::order::{OrderStatus, Side};

fn dec(s: &str) -> Decimal {
    Decimal::from_str_exact(s).unwrap()
}

/// Buys market on the first bar, sells market on the `exit_after`-th bar
struct HoldForBars {
    id: StrategyId,
    quantity: u64,
    exit_after: usize,
    bars_seen: usize,
}

impl Strategy for HoldForBars {
    fn id(&self) -> StrategyId {
        self.id
    }

    fn on_market(&mut self, event: &Event) -> Vec<OrderIntent> {
        if !matches!(event.payload, Payload::Candle(_)) {
            return Vec::new();
        }
        self.bars_seen += 1;
        if self.bars_seen == 1 {
            vec![OrderIntent::new(self.id, Side::BUY, self.quantity, Decimal::ZERO).unwrap()]
        } else if self.bars_seen == self.exit_after {
            vec![OrderIntent::new(self.id, Side::SELL, self.quantity, Decimal::ZERO).unwrap()]
        } else {
            Vec::new()
        }
    }
}

/// Flips between long and flat every `period` bars
struct Flipper {
    id: StrategyId,
    period: usize,
    bars_seen: usize,
    long: bool,
}

impl Strategy for Flipper {
    fn id(&self) -> StrategyId {
        self.id
    }

    fn on_market(&mut self, event: &Event) -> Vec<OrderIntent> {
        if !matches!(event.payload, Payload::Candle(_)) {
            return Vec::new();
        }
        self.bars_seen += 1;
        if self.bars_seen % self.period != 0 {
            return Vec::new();
        }
        let side = if self.long { Side::SELL } else { Side::BUY };
        self.long = !self.long;
        vec![OrderIntent::new(self.id, side, 10, Decimal::ZERO).unwrap()]
    }
}

#[test]
fn yahoo_file_run_produces_a_closed_trade_and_summary() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "Date,Open,High,Low,Close,Adj Close,Volume\n\
         2023-03-01,20.00,20.25,19.90,20.10,20.10,1000\n\
         2023-03-02,20.10,20.50,20.05,20.40,20.40,1200\n\
         2023-03-03,20.40,20.60,20.20,20.55,20.55,900\n\
         2023-03-06,null,null,null,null,null,0\n\
         2023-03-07,20.55,20.80,20.50,20.70,20.70,1100\n"
    )
    .unwrap();

    let instrument = InstrumentId::new("PETR4");
    let owner = StrategyId::new(1);

    let mut backtest = Backtest::new(LedgerConfig::default());
    backtest.add_feed(FeedRequest {
        instrument: instrument.clone(),
        source: DataSource::YAHOO,
        kind: FeedKind::HIST,
        file: file.path().to_path_buf(),
    });
    backtest.add_strategy(HoldForBars {
        id: owner,
        quantity: 100,
        exit_after: 3,
        bars_seen: 0,
    });

    backtest.run();
    backtest.close(owner);

    assert_eq!(backtest.rows_skipped(), 1, "the null row is skipped");

    let ledger = backtest.ledger();
    let ledger = ledger.borrow();
    assert_eq!(ledger.closed_cycles(owner), 1);
    assert_eq!(ledger.position(&instrument, owner), 0);

    let summary = ledger.summary(owner).unwrap();
    assert_eq!(summary.trades, 1);
    assert_eq!(summary.days, 4, "one record per calendar day of data");
    // Bought at 20.10, sold at 20.55: +45 gross on 100 shares
    assert_eq!(summary.gross_total, dec("45.00"));
    assert_eq!(summary.max_allocation, dec("2010.00"));

    let text = summary.to_string();
    assert!(text.contains("Number of trades: 1"));
    assert!(text.contains("Gross Total: $45.00"));
}

#[test]
fn identical_runs_produce_identical_execution_logs() {
    let run = || {
        let instrument = InstrumentId::new("SYN1");
        let owner = StrategyId::new(1);
        let mut backtest = Backtest::new(LedgerConfig::default());
        backtest.add_instrument(instrument.clone());
        backtest.add_strategy(Flipper {
            id: owner,
            period: 3,
            bars_seen: 0,
            long: false,
        });

        let mut feed = SyntheticFeed::new(99, 2_000);
        for event in feed.candles(&instrument, 1_000_000_000, 60_000_000_000, 300) {
            backtest.inject(event);
        }
        backtest.close(owner);
        backtest.recorder().borrow().export_json()
    };

    let first = run();
    let second = run();
    assert!(!first.is_empty());
    assert_eq!(first, second, "same seed, same wiring, same log");
}

#[test]
fn long_randomized_session_holds_lifecycle_invariants() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let instrument = InstrumentId::new("SYN1");
    let owner = StrategyId::new(1);

    let mut backtest = Backtest::new(LedgerConfig::default());
    backtest.add_instrument(instrument.clone());
    backtest.add_strategy(Flipper {
        id: owner,
        period: 2,
        bars_seen: 0,
        long: false,
    });

    let mut feed = SyntheticFeed::new(7, 2_000);
    for event in feed.candles(&instrument, 1_000_000_000, 60_000_000_000, 2_000) {
        backtest.inject(event);
    }
    backtest.close(owner);

    let recorder = backtest.recorder();
    let recorder = recorder.borrow();

    // Every order reached exactly one terminal status
    assert!(recorder.open_order_ids().is_empty());
    for id in recorder.order_ids() {
        assert_eq!(recorder.terminal_count(id), 1);
    }

    // Fill accounting is exact for every order
    for id in recorder.order_ids() {
        let mut fill_value = Decimal::ZERO;
        for report in recorder.order_history(id) {
            if let Some(fill) = report.fill {
                fill_value += Decimal::from(fill.quantity) * fill.price;
                assert!(report.executed <= report.quantity);
            }
            if report.status == OrderStatus::FILLED {
                assert_eq!(Decimal::from(report.executed) * report.average, fill_value);
            }
        }
    }

    // Market orders against synthetic bars always complete, so the flipper
    // closed one cycle per round trip
    let ledger = backtest.ledger();
    let ledger = ledger.borrow();
    assert_eq!(ledger.position(&instrument, owner), 0);
    assert_eq!(ledger.closed_cycles(owner), 500);

    let summary = ledger.summary(owner).unwrap();
    assert_eq!(summary.trades, 500);
    assert!(summary.days > 0);
    assert!(summary.total_fees > Decimal::ZERO);
}
