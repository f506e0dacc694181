//! Strategy seam
//!
//! A strategy reacts to market events with order intents and observes its
//! own execution reports. `StrategyHost` adapts any strategy to the bus:
//! intents go out on the instrument topic for the risk ledger to gate, and
//! only reports owned by the strategy come back in.

use bus::{Bus, Subscriber};
use types::events::{Event, ExecutionReport, OrderIntent, Payload, Topic};
use types::ids::StrategyId;

/// Trading logic driven by replayed market events
pub trait Strategy {
    /// The owner id stamped on every intent
    fn id(&self) -> StrategyId;

    /// React to one market event (candle, quote or tape print)
    fn on_market(&mut self, event: &Event) -> Vec<OrderIntent>;

    /// Observe an execution report for one of this strategy's orders
    fn on_execution(&mut self, _report: &ExecutionReport) {}
}

/// Bus adapter hosting one strategy
pub struct StrategyHost<S: Strategy> {
    strategy: S,
}

impl<S: Strategy> StrategyHost<S> {
    pub fn new(strategy: S) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }
}

impl<S: Strategy> Subscriber for StrategyHost<S> {
    fn receive(&mut self, event: &Event, bus: &Bus) {
        match &event.payload {
            Payload::Candle(_) | Payload::BestBid(_) | Payload::BestAsk(_) | Payload::Trade(_) => {
                let Topic::Instrument(instrument) = &event.topic else {
                    return;
                };
                for intent in self.strategy.on_market(event) {
                    bus.publish(Event::market(
                        instrument.clone(),
                        Payload::Intent(intent),
                        event.timestamp,
                    ));
                }
            }
            Payload::Execution(report) if report.owner == self.strategy.id() => {
                self.strategy.on_execution(report);
            }
            _ => {}
        }
    }
}
