//! Delivery history tracking for debugging and diagnostics.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Outcome of a recorded delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryOutcome {
    Sent,
    Failed,
}

/// A recorded packet delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub outcome: DeliveryOutcome,
    /// Packet bytes as hex
    pub packet: String,
    /// Seconds since history creation
    pub timestamp: f64,
}

/// Tracks the most recent deliveries to a bulb.
#[derive(Debug, Clone)]
pub struct DeliveryHistory {
    sent: usize,
    failed: usize,
    last_error: Option<String>,
    start_time: Instant,
    entries: Vec<HistoryEntry>,
    max_entries: usize,
}

impl Default for DeliveryHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryHistory {
    pub const DEFAULT_MAX_ENTRIES: usize = 100;

    pub fn new() -> Self {
        Self {
            sent: 0,
            failed: 0,
            last_error: None,
            start_time: Instant::now(),
            entries: Vec::new(),
            max_entries: Self::DEFAULT_MAX_ENTRIES,
        }
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            max_entries,
            ..Self::new()
        }
    }

    pub fn record(&mut self, outcome: DeliveryOutcome, packet: &str) {
        match outcome {
            DeliveryOutcome::Sent => self.sent += 1,
            DeliveryOutcome::Failed => self.failed += 1,
        }

        self.entries.push(HistoryEntry {
            outcome,
            packet: packet.to_string(),
            timestamp: self.start_time.elapsed().as_secs_f64(),
        });

        if self.entries.len() > self.max_entries {
            self.entries.remove(0);
        }
    }

    pub fn record_error(&mut self, error: &str) {
        self.last_error = Some(error.to_string());
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.sent = 0;
        self.failed = 0;
        self.entries.clear();
        self.last_error = None;
    }

    pub fn summary(&self) -> HistorySummary {
        HistorySummary {
            sent_count: self.sent,
            failed_count: self.failed,
            total_entries: self.entries.len(),
            last_error: self.last_error.clone(),
        }
    }
}

/// Summary of delivery history for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySummary {
    pub sent_count: usize,
    pub failed_count: usize,
    pub total_entries: usize,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_delivery() {
        let mut history = DeliveryHistory::new();
        history.record(DeliveryOutcome::Sent, "31ff000000f00f2f");
        history.record(DeliveryOutcome::Failed, "31ff000000f00f2f");

        assert_eq!(history.len(), 2);
        let summary = history.summary();
        assert_eq!(summary.sent_count, 1);
        assert_eq!(summary.failed_count, 1);
    }

    #[test]
    fn test_record_error() {
        let mut history = DeliveryHistory::new();
        history.record_error("Connection refused");
        assert_eq!(history.last_error(), Some("Connection refused"));
    }

    #[test]
    fn test_max_entries() {
        let mut history = DeliveryHistory::with_max_entries(2);
        for i in 0..5 {
            history.record(DeliveryOutcome::Sent, &format!("{i:02x}"));
        }
        assert_eq!(history.len(), 2);
        assert_eq!(history.summary().sent_count, 5);
    }
}
