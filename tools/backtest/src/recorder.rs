//! Lifecycle event recorder
//!
//! Captures every execution report crossing the bus, for assertions and
//! for exporting a run's order history as JSON.

use bus::{Bus, Subscriber};
use types::events::{Event, ExecutionReport, Payload};
use types::ids::OrderId;
use types::order::OrderStatus;

/// Captures execution reports and the replay clock
#[derive(Default)]
pub struct EventRecorder {
    executions: Vec<ExecutionReport>,
    last_timestamp: i64,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every execution report seen, in delivery order
    pub fn executions(&self) -> &[ExecutionReport] {
        &self.executions
    }

    /// Reports for one order, in delivery order
    pub fn order_history(&self, id: OrderId) -> Vec<&ExecutionReport> {
        self.executions.iter().filter(|r| r.id == id).collect()
    }

    /// Terminal reports (FILLED/REJECTED/CANCELED) for one order
    pub fn terminal_count(&self, id: OrderId) -> usize {
        self.executions
            .iter()
            .filter(|r| r.id == id && r.status.is_terminal())
            .count()
    }

    /// Ids of all orders observed
    pub fn order_ids(&self) -> Vec<OrderId> {
        let mut ids: Vec<OrderId> = self.executions.iter().map(|r| r.id).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Orders that never reached a terminal status
    pub fn open_order_ids(&self) -> Vec<OrderId> {
        self.order_ids()
            .into_iter()
            .filter(|id| self.terminal_count(*id) == 0)
            .collect()
    }

    /// Timestamp of the last event seen on any subscribed topic
    pub fn last_timestamp(&self) -> i64 {
        self.last_timestamp
    }

    /// Count reports with one status
    pub fn count(&self, status: OrderStatus) -> usize {
        self.executions.iter().filter(|r| r.status == status).count()
    }

    /// Export the execution log as pretty JSON
    pub fn export_json(&self) -> String {
        serde_json::to_string_pretty(&self.executions).unwrap_or_default()
    }

    /// Import an execution log exported by `export_json`
    pub fn import_json(json: &str) -> Result<Vec<ExecutionReport>, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Subscriber for EventRecorder {
    fn receive(&mut self, event: &Event, _bus: &Bus) {
        self.last_timestamp = self.last_timestamp.max(event.timestamp);
        if let Payload::Execution(report) = &event.payload {
            self.executions.push(report.clone());
        }
    }
}
