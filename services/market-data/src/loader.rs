//! Feed loader and replay
//!
//! Buffers every registered feed's rows as canonical events, then replays
//! them in ascending timestamp order on the RUN command. All file I/O
//! happens at load time, before replay starts.

use bus::{Bus, Subscriber};
use std::collections::BTreeMap;
use std::fs;
use tracing::{info, warn};
use types::errors::FeedError;
use types::events::{DataSource, Event, FeedKind, FeedRequest, Payload, Topic};
use types::market::TradePrint;

use crate::formats::{self, TickRow};

/// Buffers normalized events per timestamp and replays them in order
#[derive(Default)]
pub struct FeedLoader {
    /// Events keyed by timestamp; same-timestamp rows keep file order
    buffered: BTreeMap<i64, Vec<Event>>,
    rows_loaded: usize,
    rows_skipped: usize,
}

impl FeedLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows successfully normalized so far
    pub fn rows_loaded(&self) -> usize {
        self.rows_loaded
    }

    /// Malformed rows skipped so far
    pub fn rows_skipped(&self) -> usize {
        self.rows_skipped
    }

    /// Read and normalize one feed file into the buffer.
    ///
    /// Malformed rows are skipped with a warning; only an unreadable file
    /// or an unsupported source/kind combination fails the whole feed.
    pub fn load(&mut self, request: &FeedRequest) -> Result<usize, FeedError> {
        if !is_supported(request.source, request.kind) {
            return Err(FeedError::UnsupportedFormat {
                src: format!("{:?}", request.source),
                kind: format!("{:?}", request.kind),
            });
        }

        let path = request.file.display().to_string();
        let data = fs::read_to_string(&request.file).map_err(|err| FeedError::Unreadable {
            path: path.clone(),
            reason: err.to_string(),
        })?;

        let mut loaded = 0;
        // First row is the header
        for (index, row) in data.lines().enumerate().skip(1) {
            if row.trim().is_empty() {
                continue;
            }
            match self.parse_row(request, row, index + 1) {
                Ok(event) => {
                    self.buffered.entry(event.timestamp).or_default().push(event);
                    loaded += 1;
                }
                Err(reason) => {
                    self.rows_skipped += 1;
                    warn!(%reason, "skipping malformed feed row");
                }
            }
        }

        self.rows_loaded += loaded;
        info!(path, rows = loaded, instrument = %request.instrument, "feed loaded");
        Ok(loaded)
    }

    fn parse_row(&self, request: &FeedRequest, row: &str, line: usize) -> Result<Event, FeedError> {
        let malformed = |reason: String| FeedError::MalformedRow {
            path: request.file.display().to_string(),
            line,
            reason,
        };

        match (request.source, request.kind) {
            (DataSource::YAHOO, FeedKind::HIST) => {
                let (timestamp, candle) =
                    formats::parse_yahoo_daily(row).map_err(|e| malformed(e.to_string()))?;
                Ok(Event::market(
                    request.instrument.clone(),
                    Payload::Candle(candle),
                    timestamp,
                ))
            }
            (DataSource::BLOOMBERG, FeedKind::INTR) => {
                let (timestamp, candle) =
                    formats::parse_bloomberg_intraday(row).map_err(|e| malformed(e.to_string()))?;
                Ok(Event::market(
                    request.instrument.clone(),
                    Payload::Candle(candle),
                    timestamp,
                ))
            }
            (DataSource::BLOOMBERG, FeedKind::TICK) => {
                let (timestamp, tick) =
                    formats::parse_bloomberg_tick(row).map_err(|e| malformed(e.to_string()))?;
                let payload = match tick {
                    TickRow::Bid(quote) => Payload::BestBid(quote),
                    TickRow::Ask(quote) => Payload::BestAsk(quote),
                    TickRow::Trade { price, quantity } => Payload::Trade(TradePrint {
                        price,
                        quantity,
                        timestamp,
                    }),
                };
                Ok(Event::market(request.instrument.clone(), payload, timestamp))
            }
            // Raw feeds are JSON lines of canonical events
            (DataSource::RAW, _) => {
                serde_json::from_str::<Event>(row).map_err(|e| malformed(e.to_string()))
            }
            (source, kind) => Err(FeedError::UnsupportedFormat {
                src: format!("{source:?}"),
                kind: format!("{kind:?}"),
            }),
        }
    }

    /// Publish every buffered event in ascending timestamp order
    pub fn replay(&mut self, bus: &Bus) {
        let buffered = std::mem::take(&mut self.buffered);
        let total: usize = buffered.values().map(Vec::len).sum();
        info!(events = total, "replay start");
        for (_, events) in buffered {
            for event in events {
                bus.publish(event);
            }
        }
    }
}

fn is_supported(source: DataSource, kind: FeedKind) -> bool {
    matches!(
        (source, kind),
        (DataSource::YAHOO, FeedKind::HIST)
            | (DataSource::BLOOMBERG, FeedKind::INTR)
            | (DataSource::BLOOMBERG, FeedKind::TICK)
            | (DataSource::RAW, _)
    )
}

impl Subscriber for FeedLoader {
    fn receive(&mut self, event: &Event, bus: &Bus) {
        if event.topic != Topic::System {
            return;
        }
        match &event.payload {
            Payload::Load(request) => {
                if let Err(err) = self.load(request) {
                    warn!(%err, "feed failed to load");
                }
            }
            Payload::Run => self.replay(bus),
            _ => {}
        }
    }
}
