//! Matching engine: books per instrument, wired to the bus
//!
//! Subscribes to the system topic (book creation on feed registration) and
//! to instrument topics (market data and validated order requests), and
//! publishes order lifecycle reports back on the instrument topic. The NEW
//! report is always published before any fill report for the same order.

use bus::{Bus, Subscriber};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use types::events::{Event, ExecutionReport, OrderIntent, Payload, Topic};
use types::ids::{IdAllocator, InstrumentId};
use types::market::QuoteSide;
use types::order::Order;

use crate::book::Book;

/// Per-instrument matching engine for one backtest run
pub struct MatchEngine {
    books: BTreeMap<InstrumentId, Book>,
    ids: IdAllocator,
}

impl MatchEngine {
    /// Create an engine sharing the run's id allocator
    pub fn new(ids: IdAllocator) -> Self {
        Self {
            books: BTreeMap::new(),
            ids,
        }
    }

    /// Create a book for an instrument if it does not exist yet
    pub fn create_book(&mut self, instrument: InstrumentId) {
        self.books
            .entry(instrument.clone())
            .or_insert_with(|| Book::new(instrument));
    }

    /// Inspect one instrument's book
    pub fn book(&self, instrument: &InstrumentId) -> Option<&Book> {
        self.books.get(instrument)
    }

    /// Allocate an order from a validated request and run it through the
    /// book; reports are published on the instrument topic in order.
    fn submit(&mut self, instrument: &InstrumentId, intent: &OrderIntent, timestamp: i64, bus: &Bus) {
        let id = self.ids.next_order_id();
        let order = match Order::new(
            id,
            instrument.clone(),
            intent.side,
            intent.quantity,
            intent.price,
            intent.owner,
            timestamp,
        ) {
            Ok(order) => order,
            Err(err) => {
                // Requests are validated upstream by the risk ledger
                warn!(%instrument, %err, "dropping malformed order request");
                return;
            }
        };

        debug!(%instrument, order = %id, side = ?intent.side, qty = intent.quantity, "submit");

        let book = self
            .books
            .entry(instrument.clone())
            .or_insert_with(|| Book::new(instrument.clone()));
        let reports = book.submit(order, timestamp);
        publish_reports(bus, instrument, reports, timestamp);
    }
}

fn publish_reports(
    bus: &Bus,
    instrument: &InstrumentId,
    reports: Vec<ExecutionReport>,
    timestamp: i64,
) {
    for report in reports {
        bus.publish(Event::market(
            instrument.clone(),
            Payload::Execution(report),
            timestamp,
        ));
    }
}

impl Subscriber for MatchEngine {
    fn receive(&mut self, event: &Event, bus: &Bus) {
        match (&event.topic, &event.payload) {
            (Topic::System, Payload::Load(request)) => {
                self.create_book(request.instrument.clone());
            }
            (Topic::Instrument(instrument), payload) => match payload {
                Payload::BestBid(quote) => {
                    if let Some(book) = self.books.get_mut(instrument) {
                        let reports = book.apply_quote(QuoteSide::BID, *quote, event.timestamp);
                        publish_reports(bus, instrument, reports, event.timestamp);
                    }
                }
                Payload::BestAsk(quote) => {
                    if let Some(book) = self.books.get_mut(instrument) {
                        let reports = book.apply_quote(QuoteSide::ASK, *quote, event.timestamp);
                        publish_reports(bus, instrument, reports, event.timestamp);
                    }
                }
                Payload::Candle(candle) => {
                    if let Some(book) = self.books.get_mut(instrument) {
                        let reports = book.apply_candle(candle, event.timestamp);
                        publish_reports(bus, instrument, reports, event.timestamp);
                    }
                }
                Payload::Trade(print) => {
                    if let Some(book) = self.books.get_mut(instrument) {
                        book.apply_trade(*print);
                    }
                }
                Payload::OrderRequest(intent) => {
                    self.submit(instrument, intent, event.timestamp, bus);
                }
                _ => {}
            },
            _ => {}
        }
    }
}
