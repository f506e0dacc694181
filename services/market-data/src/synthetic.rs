//! Deterministic synthetic feeds
//!
//! Seeded random-walk candle series for stress and integration tests.
//! The same seed always reproduces the same series.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use types::events::{Event, Payload};
use types::ids::InstrumentId;
use types::market::Candle;

/// Seeded random-walk candle generator
pub struct SyntheticFeed {
    rng: ChaCha8Rng,
    /// Current price in cents
    price_cents: i64,
}

impl SyntheticFeed {
    /// Create a generator at a starting price (in cents)
    pub fn new(seed: u64, start_price_cents: i64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            price_cents: start_price_cents.max(100),
        }
    }

    /// Generate one bar and advance the walk
    pub fn next_candle(&mut self) -> Candle {
        let open = self.price_cents;
        let drift: i64 = self.rng.gen_range(-50..=50);
        let close = (open + drift).max(100);
        let high = open.max(close) + self.rng.gen_range(0..=20);
        let low = (open.min(close) - self.rng.gen_range(0..=20)).max(1);
        let volume = self.rng.gen_range(100..10_000);
        self.price_cents = close;

        Candle::new(
            Decimal::new(open, 2),
            Decimal::new(high, 2),
            Decimal::new(low, 2),
            Decimal::new(close, 2),
            volume,
        )
        .expect("generated bar geometry is valid")
    }

    /// Generate a candle event series for one instrument, one bar per
    /// `step_nanos`, starting at `start_timestamp`.
    pub fn candles(
        &mut self,
        instrument: &InstrumentId,
        start_timestamp: i64,
        step_nanos: i64,
        count: usize,
    ) -> Vec<Event> {
        (0..count)
            .map(|i| {
                let timestamp = start_timestamp + (i as i64) * step_nanos;
                Event::market(
                    instrument.clone(),
                    Payload::Candle(self.next_candle()),
                    timestamp,
                )
            })
            .collect()
    }
}
