//! Run wiring
//!
//! One `Backtest` owns the bus, the run-scoped id allocator and the three
//! services, subscribes them to the system topic and to each registered
//! instrument topic, and drives the load → run → close → summary sequence.

use bus::{Bus, SubscriberRef};
use market_data::FeedLoader;
use matching_engine::MatchEngine;
use risk_ledger::{LedgerConfig, RiskLedger, Summary};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::info;
use types::events::{Event, FeedRequest, Payload, Topic};
use types::ids::{IdAllocator, InstrumentId, RunId, StrategyId};

use crate::recorder::EventRecorder;
use crate::strategy::{Strategy, StrategyHost};

/// One wired backtest run
pub struct Backtest {
    run_id: RunId,
    bus: Bus,
    engine: Rc<RefCell<MatchEngine>>,
    ledger: Rc<RefCell<RiskLedger>>,
    loader: Rc<RefCell<FeedLoader>>,
    recorder: Rc<RefCell<EventRecorder>>,
    strategies: Vec<SubscriberRef>,
    instruments: Vec<InstrumentId>,
    feeds: Vec<FeedRequest>,
}

impl Backtest {
    /// Wire a fresh run: engine and ledger share one id allocator, and all
    /// core components listen on the system topic.
    pub fn new(config: LedgerConfig) -> Self {
        let bus = Bus::new();
        let ids = IdAllocator::new();
        let engine = Rc::new(RefCell::new(MatchEngine::new(ids.clone())));
        let ledger = Rc::new(RefCell::new(RiskLedger::new(config, ids)));
        let loader = Rc::new(RefCell::new(FeedLoader::new()));
        let recorder = Rc::new(RefCell::new(EventRecorder::new()));

        bus.subscribe(Topic::System, engine.clone());
        bus.subscribe(Topic::System, ledger.clone());
        bus.subscribe(Topic::System, loader.clone());
        bus.subscribe(Topic::System, recorder.clone());

        Self {
            run_id: RunId::new(),
            bus,
            engine,
            ledger,
            loader,
            recorder,
            strategies: Vec::new(),
            instruments: Vec::new(),
            feeds: Vec::new(),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Register an instrument topic: engine, ledger and recorder always
    /// listen, strategies added so far are wired in too.
    pub fn add_instrument(&mut self, instrument: InstrumentId) {
        if self.instruments.contains(&instrument) {
            return;
        }
        let topic = Topic::Instrument(instrument.clone());
        self.bus.subscribe(topic.clone(), self.engine.clone());
        self.bus.subscribe(topic.clone(), self.ledger.clone());
        self.bus.subscribe(topic.clone(), self.recorder.clone());
        for host in &self.strategies {
            self.bus.subscribe(topic.clone(), host.clone());
        }
        self.engine.borrow_mut().create_book(instrument.clone());
        self.instruments.push(instrument);
    }

    /// Register one instrument's feed file
    pub fn add_feed(&mut self, request: FeedRequest) {
        self.add_instrument(request.instrument.clone());
        self.feeds.push(request);
    }

    /// Register a strategy on every instrument topic
    pub fn add_strategy<S: Strategy + 'static>(&mut self, strategy: S) {
        self.ledger.borrow_mut().register_strategy(strategy.id());
        let host: SubscriberRef = Rc::new(RefCell::new(StrategyHost::new(strategy)));
        for instrument in &self.instruments {
            self.bus
                .subscribe(Topic::Instrument(instrument.clone()), host.clone());
        }
        self.strategies.push(host);
    }

    /// Inject one event directly (synthetic feeds and tests)
    pub fn inject(&self, event: Event) {
        self.bus.publish(event);
    }

    /// Load every registered feed and replay it in timestamp order
    pub fn run(&mut self) {
        info!(run = %self.run_id, feeds = self.feeds.len(), "backtest start");
        for request in &self.feeds {
            self.bus
                .publish(Event::system(Payload::Load(request.clone()), 0));
        }
        self.bus.publish(Event::system(Payload::Run, 0));
    }

    /// End-of-run close for one strategy: flatten its open positions with
    /// opposing market orders, then finalize the last day's equity and
    /// carry.
    pub fn close(&mut self, owner: StrategyId) {
        let timestamp = self.recorder.borrow().last_timestamp();
        self.bus
            .publish(Event::system(Payload::Close { owner }, timestamp));
        self.ledger.borrow_mut().finalize(owner, timestamp);
    }

    /// Read-side report for one strategy
    pub fn summary(&self, owner: StrategyId) -> Option<Summary> {
        self.ledger.borrow().summary(owner)
    }

    /// The run's execution recorder
    pub fn recorder(&self) -> Rc<RefCell<EventRecorder>> {
        self.recorder.clone()
    }

    /// The run's risk ledger
    pub fn ledger(&self) -> Rc<RefCell<RiskLedger>> {
        self.ledger.clone()
    }

    /// The run's matching engine
    pub fn engine(&self) -> Rc<RefCell<MatchEngine>> {
        self.engine.clone()
    }

    /// Rows skipped by the loader so far
    pub fn rows_skipped(&self) -> usize {
        self.loader.borrow().rows_skipped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use types::events::OrderIntent;
    use types::market::Candle;
    use types::order::{OrderStatus, Side};

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    /// Emits one scripted intent per market event, in order
    struct Scripted {
        id: StrategyId,
        intents: Vec<OrderIntent>,
    }

    impl Strategy for Scripted {
        fn id(&self) -> StrategyId {
            self.id
        }

        fn on_market(&mut self, _event: &Event) -> Vec<OrderIntent> {
            if self.intents.is_empty() {
                Vec::new()
            } else {
                vec![self.intents.remove(0)]
            }
        }
    }

    fn candle_event(instrument: &InstrumentId, close: &str, timestamp: i64) -> Event {
        let close = dec(close);
        Event::market(
            instrument.clone(),
            Payload::Candle(Candle::new(close, close, close, close, 100).unwrap()),
            timestamp,
        )
    }

    #[test]
    fn test_wiring_runs_a_round_trip() {
        let mut backtest = Backtest::new(LedgerConfig::default());
        let instrument = InstrumentId::new("PETR4");
        backtest.add_instrument(instrument.clone());

        let owner = StrategyId::new(1);
        backtest.add_strategy(Scripted {
            id: owner,
            intents: vec![
                OrderIntent::new(owner, Side::BUY, 10, Decimal::ZERO).unwrap(),
                OrderIntent::new(owner, Side::SELL, 10, Decimal::ZERO).unwrap(),
            ],
        });

        backtest.inject(candle_event(&instrument, "10.00", 1_000_000_000));
        backtest.inject(candle_event(&instrument, "11.00", 2_000_000_000));

        let ledger = backtest.ledger();
        assert_eq!(ledger.borrow().closed_cycles(owner), 1);
        assert_eq!(ledger.borrow().position(&instrument, owner), 0);

        let recorder = backtest.recorder();
        assert_eq!(recorder.borrow().count(OrderStatus::FILLED), 2);
        assert!(recorder.borrow().open_order_ids().is_empty());
    }

    #[test]
    fn test_close_flattens_open_position() {
        let mut backtest = Backtest::new(LedgerConfig::default());
        let instrument = InstrumentId::new("PETR4");
        backtest.add_instrument(instrument.clone());

        let owner = StrategyId::new(1);
        backtest.add_strategy(Scripted {
            id: owner,
            intents: vec![OrderIntent::new(owner, Side::BUY, 10, Decimal::ZERO).unwrap()],
        });

        backtest.inject(candle_event(&instrument, "10.00", 1_000_000_000));
        assert_eq!(
            backtest.ledger().borrow().position(&instrument, owner),
            10
        );

        backtest.close(owner);

        assert_eq!(backtest.ledger().borrow().position(&instrument, owner), 0);
        assert_eq!(backtest.ledger().borrow().closed_cycles(owner), 1);
        assert!(backtest.recorder().borrow().open_order_ids().is_empty());

        let summary = backtest.summary(owner).unwrap();
        assert_eq!(summary.trades, 1);
        assert!(summary.days > 0, "finalize writes the last day");
    }
}
