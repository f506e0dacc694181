//! Per-instrument order book
//!
//! Holds the current best bid and ask (one synthetic quote per side), the
//! append-only trade tape and the resting orders. Fill price selection is
//! trigger-dependent: a fresh aggressive order crosses the book at the
//! quote's price, while a resting order hit by a quote replacement or a
//! candle range fills at its own limit price. Market orders (price zero)
//! always take the quote price.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use types::events::{ExecutionReport, Fill};
use types::ids::{InstrumentId, OrderId};
use types::market::{Candle, Quote, QuoteSide, TradePrint};
use types::order::{Order, Side};

/// Which price a fill uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FillPrice {
    /// The quote's price (aggressive submission)
    Quote,
    /// The resting order's own limit price (book moved toward it)
    Limit,
}

/// Order book for a single instrument
pub struct Book {
    instrument: InstrumentId,
    /// Timestamp of the last update
    timestamp: i64,
    /// Append-only execution prints
    tape: Vec<TradePrint>,
    bid: Option<Quote>,
    ask: Option<Quote>,
    /// Resting orders, scanned in submission (id) order
    orders: BTreeMap<OrderId, Order>,
}

impl Book {
    pub fn new(instrument: InstrumentId) -> Self {
        Self {
            instrument,
            timestamp: 0,
            tape: Vec::new(),
            bid: None,
            ask: None,
            orders: BTreeMap::new(),
        }
    }

    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    pub fn last_update(&self) -> i64 {
        self.timestamp
    }

    pub fn bid(&self) -> Option<&Quote> {
        self.bid.as_ref()
    }

    pub fn ask(&self) -> Option<&Quote> {
        self.ask.as_ref()
    }

    pub fn tape(&self) -> &[TradePrint] {
        &self.tape
    }

    /// Number of resting orders
    pub fn pending_count(&self) -> usize {
        self.orders.len()
    }

    /// Look up a resting order
    pub fn pending(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    /// Replace the quote on one side, then match every resting contra-side
    /// order against the new level. Each order fills fully, partially, or
    /// not at all; the quote depletes as it fills and the scan stops once
    /// it is exhausted.
    pub fn apply_quote(
        &mut self,
        side: QuoteSide,
        quote: Quote,
        timestamp: i64,
    ) -> Vec<ExecutionReport> {
        self.timestamp = timestamp;

        let mut level = quote;
        let mut exhausted = false;
        let mut reports = Vec::new();

        for order in self.orders.values_mut() {
            if !crosses(order, side, level.price) {
                continue;
            }
            let fill_qty = level.available(order.remaining());
            let fill_px = fill_price(order, &level, FillPrice::Limit);
            order.apply_fill(fill_qty, fill_px);
            reports.push(ExecutionReport::from_order(
                order,
                Some(Fill {
                    quantity: fill_qty,
                    price: fill_px,
                }),
            ));
            exhausted = level.consume(fill_qty);
            if exhausted {
                break;
            }
        }

        self.orders.retain(|_, order| !order.status.is_terminal());

        let slot = match side {
            QuoteSide::BID => &mut self.bid,
            QuoteSide::ASK => &mut self.ask,
        };
        *slot = if exhausted { None } else { Some(level) };

        reports
    }

    /// Apply one OHLCV bar: synthesize unlimited bid and ask at the close,
    /// print close/volume on the tape, then fill fully at its own limit
    /// price every resting limit order whose price lies inside the bar's
    /// range (the whole range is treated as reachable — tick data is not
    /// available). Resting market orders fill fully at the close against
    /// the synthetic quote.
    pub fn apply_candle(&mut self, candle: &Candle, timestamp: i64) -> Vec<ExecutionReport> {
        self.timestamp = timestamp;
        self.bid = Some(Quote::unlimited(candle.close));
        self.ask = Some(Quote::unlimited(candle.close));
        self.tape.push(TradePrint {
            price: candle.close,
            quantity: candle.volume,
            timestamp,
        });

        let mut reports = Vec::new();
        for order in self.orders.values_mut() {
            let fill_px = if order.is_market() {
                candle.close
            } else if candle.range_contains(order.price) {
                order.price
            } else {
                continue;
            };
            let fill_qty = order.remaining();
            order.apply_fill(fill_qty, fill_px);
            reports.push(ExecutionReport::from_order(
                order,
                Some(Fill {
                    quantity: fill_qty,
                    price: fill_px,
                }),
            ));
        }

        self.orders.retain(|_, order| !order.status.is_terminal());
        reports
    }

    /// Append one tape-only execution print
    pub fn apply_trade(&mut self, print: TradePrint) {
        self.timestamp = print.timestamp;
        self.tape.push(print);
    }

    /// Accept a new order: snapshot it as NEW, match it against the current
    /// contra-side quote at the quote's price, and rest any remainder.
    /// Returns the NEW report followed by fill reports.
    pub fn submit(&mut self, mut order: Order, timestamp: i64) -> Vec<ExecutionReport> {
        self.timestamp = timestamp;

        let mut reports = vec![ExecutionReport::from_order(&order, None)];

        let (contra_side, slot) = match order.side {
            Side::BUY => (QuoteSide::ASK, &mut self.ask),
            Side::SELL | Side::SELLSHORT => (QuoteSide::BID, &mut self.bid),
        };

        let mut exhausted = false;
        if let Some(level) = slot.as_mut() {
            if crosses(&order, contra_side, level.price) {
                let fill_qty = level.available(order.remaining());
                let fill_px = fill_price(&order, level, FillPrice::Quote);
                order.apply_fill(fill_qty, fill_px);
                reports.push(ExecutionReport::from_order(
                    &order,
                    Some(Fill {
                        quantity: fill_qty,
                        price: fill_px,
                    }),
                ));
                exhausted = level.consume(fill_qty);
            }
        }
        if exhausted {
            *slot = None;
        }

        if !order.status.is_terminal() {
            self.orders.insert(order.id, order);
        }
        reports
    }
}

/// Matching predicate: a buy matches an offer at or below its limit, a sell
/// matches a bid at or above its limit; market orders match any price.
fn crosses(order: &Order, quote_side: QuoteSide, quote_price: Decimal) -> bool {
    match (order.side, quote_side) {
        (Side::BUY, QuoteSide::ASK) => order.is_market() || order.price >= quote_price,
        (Side::SELL | Side::SELLSHORT, QuoteSide::BID) => {
            order.is_market() || order.price <= quote_price
        }
        _ => false,
    }
}

fn fill_price(order: &Order, quote: &Quote, rule: FillPrice) -> Decimal {
    match rule {
        FillPrice::Quote => quote.price,
        FillPrice::Limit if order.is_market() => quote.price,
        FillPrice::Limit => order.price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use types::ids::StrategyId;
    use types::order::OrderStatus;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    fn order(id: u64, side: Side, quantity: u64, price: &str) -> Order {
        Order::new(
            OrderId::from_raw(id),
            InstrumentId::new("PETR4"),
            side,
            quantity,
            dec(price),
            StrategyId::new(1),
            0,
        )
        .unwrap()
    }

    fn book() -> Book {
        Book::new(InstrumentId::new("PETR4"))
    }

    // ── Aggressive submission ──

    #[test]
    fn test_submit_fills_against_ask_at_quote_price() {
        let mut book = book();
        book.apply_quote(QuoteSide::ASK, Quote::new(dec("20.31"), 20), 1);

        let reports = book.submit(order(1, Side::BUY, 5, "20.32"), 2);

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].status, OrderStatus::NEW);
        assert_eq!(reports[1].status, OrderStatus::FILLED);
        assert_eq!(reports[1].executed, 5);
        assert_eq!(reports[1].average, dec("20.31"));
        assert_eq!(book.pending_count(), 0);
        // The ask depleted by the fill
        assert_eq!(book.ask().unwrap().quantity, 15);
    }

    #[test]
    fn test_submit_partial_against_small_ask() {
        let mut book = book();
        book.apply_quote(QuoteSide::ASK, Quote::new(dec("20.31"), 3), 1);

        let reports = book.submit(order(1, Side::BUY, 10, "20.32"), 2);

        assert_eq!(reports[1].status, OrderStatus::PARTIAL);
        assert_eq!(reports[1].executed, 3);
        assert_eq!(book.pending_count(), 1);
        assert!(book.ask().is_none(), "exhausted level leaves the book");
    }

    #[test]
    fn test_submit_no_cross_rests() {
        let mut book = book();
        book.apply_quote(QuoteSide::ASK, Quote::new(dec("20.31"), 20), 1);

        let reports = book.submit(order(1, Side::BUY, 5, "20.30"), 2);

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].status, OrderStatus::NEW);
        assert_eq!(book.pending_count(), 1);
    }

    #[test]
    fn test_market_order_fills_at_quote_price() {
        let mut book = book();
        book.apply_quote(QuoteSide::BID, Quote::new(dec("20.28"), 50), 1);

        let reports = book.submit(order(1, Side::SELL, 10, "0"), 2);
        assert_eq!(reports[1].status, OrderStatus::FILLED);
        assert_eq!(reports[1].average, dec("20.28"));
    }

    #[test]
    fn test_submit_against_empty_book_rests() {
        let mut book = book();
        let reports = book.submit(order(1, Side::BUY, 5, "0"), 1);
        assert_eq!(reports.len(), 1);
        assert_eq!(book.pending_count(), 1);
    }

    // ── Quote-replacement matching ──

    #[test]
    fn test_book_moves_into_resting_buy_at_its_own_price() {
        let mut book = book();
        book.apply_quote(QuoteSide::BID, Quote::new(dec("20.30"), 10), 1);
        book.submit(order(1, Side::BUY, 15, "20.30"), 2);

        let reports = book.apply_quote(QuoteSide::ASK, Quote::new(dec("20.29"), 10), 3);

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].status, OrderStatus::PARTIAL);
        assert_eq!(reports[0].executed, 10);
        // The resting order never assumes a better price than it asked for
        assert_eq!(reports[0].average, dec("20.30"));
        assert_eq!(book.pending(OrderId::from_raw(1)).unwrap().remaining(), 5);
    }

    #[test]
    fn test_quote_scan_fills_resting_market_order_at_quote_price() {
        let mut book = book();
        book.submit(order(1, Side::BUY, 5, "0"), 1);

        let reports = book.apply_quote(QuoteSide::ASK, Quote::new(dec("20.40"), 8), 2);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].status, OrderStatus::FILLED);
        assert_eq!(reports[0].average, dec("20.40"));
    }

    #[test]
    fn test_quote_depletes_across_resting_orders_in_id_order() {
        let mut book = book();
        book.submit(order(1, Side::SELL, 6, "20.10"), 1);
        book.submit(order(2, Side::SELL, 6, "20.10"), 1);

        let reports = book.apply_quote(QuoteSide::BID, Quote::new(dec("20.10"), 9), 2);

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].id, OrderId::from_raw(1));
        assert_eq!(reports[0].status, OrderStatus::FILLED);
        assert_eq!(reports[1].id, OrderId::from_raw(2));
        assert_eq!(reports[1].status, OrderStatus::PARTIAL);
        assert_eq!(reports[1].executed, 3);
        assert!(book.bid().is_none());
    }

    #[test]
    fn test_quote_side_only_scans_contra_orders() {
        let mut book = book();
        book.submit(order(1, Side::BUY, 5, "20.30"), 1);

        // A bid update must not fill buy orders
        let reports = book.apply_quote(QuoteSide::BID, Quote::new(dec("20.35"), 50), 2);
        assert!(reports.is_empty());
        assert_eq!(book.pending_count(), 1);
    }

    #[test]
    fn test_replayed_quote_produces_no_new_fills() {
        let mut book = book();
        book.submit(order(1, Side::BUY, 5, "20.30"), 1);
        book.submit(order(2, Side::BUY, 4, "20.10"), 1);

        let first = book.apply_quote(QuoteSide::ASK, Quote::new(dec("20.25"), 50), 2);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].status, OrderStatus::FILLED);

        // Identical payload again: the filled order is gone, the 20.10 buy
        // still does not reach the level.
        let second = book.apply_quote(QuoteSide::ASK, Quote::new(dec("20.25"), 50), 3);
        assert!(second.is_empty());

        // A newly-submitted qualifying order fills against a re-delivery.
        book.submit(order(3, Side::BUY, 2, "20.30"), 4);
        let third = book.apply_quote(QuoteSide::ASK, Quote::new(dec("20.25"), 50), 5);
        assert_eq!(third.len(), 1);
        assert_eq!(third[0].id, OrderId::from_raw(3));
    }

    // ── Candle matching ──

    #[test]
    fn test_candle_fills_range_orders_at_their_own_limit() {
        let mut book = book();
        book.submit(order(1, Side::BUY, 30, "20.15"), 1);
        book.submit(order(2, Side::SELL, 40, "20.35"), 1);

        let candle =
            Candle::new(dec("20.20"), dec("20.45"), dec("20.10"), dec("20.20"), 5).unwrap();
        let reports = book.apply_candle(&candle, 2);

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].status, OrderStatus::FILLED);
        assert_eq!(reports[0].average, dec("20.15"));
        assert_eq!(reports[1].status, OrderStatus::FILLED);
        assert_eq!(reports[1].average, dec("20.35"));
        assert_eq!(book.pending_count(), 0);

        // Synthetic unlimited quotes at the close, tape updated
        assert_eq!(book.bid().unwrap().price, dec("20.20"));
        assert!(book.bid().unwrap().is_unlimited());
        assert_eq!(book.ask().unwrap().price, dec("20.20"));
        assert_eq!(book.tape().len(), 1);
        assert_eq!(book.tape()[0].quantity, 5);
    }

    #[test]
    fn test_candle_never_fills_at_close_for_limit_orders() {
        let mut book = book();
        book.submit(order(1, Side::BUY, 10, "20.12"), 1);

        let candle =
            Candle::new(dec("20.20"), dec("20.45"), dec("20.10"), dec("20.30"), 5).unwrap();
        let reports = book.apply_candle(&candle, 2);

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].average, dec("20.12"));
        assert_ne!(reports[0].average, candle.close);
    }

    #[test]
    fn test_candle_leaves_out_of_range_orders_pending() {
        let mut book = book();
        book.submit(order(1, Side::BUY, 10, "19.00"), 1);

        let candle =
            Candle::new(dec("20.20"), dec("20.45"), dec("20.10"), dec("20.20"), 5).unwrap();
        let reports = book.apply_candle(&candle, 2);

        assert!(reports.is_empty());
        assert_eq!(book.pending_count(), 1);
    }

    #[test]
    fn test_candle_fills_resting_market_order_at_close() {
        let mut book = book();
        book.submit(order(1, Side::BUY, 10, "0"), 1);

        let candle =
            Candle::new(dec("20.20"), dec("20.45"), dec("20.10"), dec("20.25"), 5).unwrap();
        let reports = book.apply_candle(&candle, 2);

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].status, OrderStatus::FILLED);
        assert_eq!(reports[0].average, dec("20.25"));
    }

    // ── Tape ──

    #[test]
    fn test_trade_print_appends_to_tape_only() {
        let mut book = book();
        book.submit(order(1, Side::BUY, 10, "20.30"), 1);

        book.apply_trade(TradePrint {
            price: dec("20.25"),
            quantity: 100,
            timestamp: 2,
        });

        assert_eq!(book.tape().len(), 1);
        assert_eq!(book.pending_count(), 1, "tape prints never fill orders");
        assert_eq!(book.last_update(), 2);
    }

    // ── Fill-history consistency ──

    proptest! {
        /// Across any quote sequence, a resting order's executed quantity
        /// never exceeds its size and its VWAP stays inside the fill price
        /// envelope.
        #[test]
        fn prop_quote_stream_respects_order_invariants(
            quantity in 1u64..200,
            limit_cents in 1_900u64..2_100,
            quotes in proptest::collection::vec((1_850u64..2_150, 0u64..80), 1..20),
        ) {
            let mut book = Book::new(InstrumentId::new("PETR4"));
            let limit = Decimal::new(limit_cents as i64, 2);
            let submitted = Order::new(
                OrderId::from_raw(1),
                InstrumentId::new("PETR4"),
                Side::BUY,
                quantity,
                limit,
                StrategyId::new(1),
                0,
            ).unwrap();
            book.submit(submitted, 0);

            let mut executed = 0u64;
            let mut lowest = Decimal::MAX;
            let mut highest = Decimal::MIN;

            for (ts, (price_cents, qty)) in quotes.into_iter().enumerate() {
                let price = Decimal::new(price_cents as i64, 2);
                let reports = book.apply_quote(QuoteSide::ASK, Quote::new(price, qty), ts as i64);
                for report in reports {
                    let fill = report.fill.unwrap();
                    executed += fill.quantity;
                    lowest = lowest.min(fill.price);
                    highest = highest.max(fill.price);
                    prop_assert!(report.executed <= report.quantity);
                    prop_assert_eq!(report.executed == report.quantity,
                        report.status == OrderStatus::FILLED);
                    if report.status == OrderStatus::FILLED {
                        prop_assert!(report.average >= lowest && report.average <= highest);
                    }
                }
                if book.pending_count() == 0 {
                    break;
                }
            }
            prop_assert!(executed <= quantity);
        }
    }
}
