//! Append-only event log.
//!
//! Every protocol event a session sends or receives is appended here in
//! arrival/send order, tagged by direction. The session is the only writer;
//! observers take snapshot reads and never mutate.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Direction of a logged event relative to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// client → server
    #[serde(rename = "client")]
    Outbound,
    /// server → client
    #[serde(rename = "server")]
    Inbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Outbound => write!(f, "client"),
            Direction::Inbound => write!(f, "server"),
        }
    }
}

/// A single logged event.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// When the event was appended (UTC)
    pub timestamp: OffsetDateTime,
    /// Whether the event was sent or received
    pub direction: Direction,
    /// The serialized JSON event
    pub event: String,
}

impl LogEntry {
    /// Timestamp formatted as `HH:MM:SS` for display surfaces.
    pub fn time_hms(&self) -> String {
        self.timestamp
            .format(&time::macros::format_description!(
                "[hour]:[minute]:[second]"
            ))
            .unwrap_or_default()
    }

    /// The `type` field of the logged event, when present.
    pub fn event_type(&self) -> Option<String> {
        serde_json::from_str::<serde_json::Value>(&self.event)
            .ok()
            .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(String::from))
    }
}

/// Append-only, timestamped record of every protocol event.
pub struct EventLog {
    entries: RwLock<Vec<LogEntry>>,
    debug: bool,
}

impl EventLog {
    /// Create an empty log. With `debug` set, every append is mirrored to
    /// `tracing::debug!`.
    pub fn new(debug: bool) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            debug,
        }
    }

    /// Append a serialized event.
    pub fn append(&self, direction: Direction, event: String) {
        let entry = LogEntry {
            timestamp: OffsetDateTime::now_utc(),
            direction,
            event,
        };
        if self.debug {
            tracing::debug!("{} {}: {}", entry.time_hms(), direction, entry.event);
        }
        self.entries.write().push(entry);
    }

    /// Serialize and append an event value.
    pub fn append_json(&self, direction: Direction, event: &serde_json::Value) {
        self.append(direction, event.to_string());
    }

    /// Snapshot of all entries in append order.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.read().clone()
    }

    /// The most recent entry, if any.
    pub fn last(&self) -> Option<LogEntry> {
        self.entries.read().last().cloned()
    }

    /// Number of logged events.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::Outbound.to_string(), "client");
        assert_eq!(Direction::Inbound.to_string(), "server");
    }

    #[test]
    fn test_append_preserves_order() {
        let log = EventLog::default();
        log.append_json(Direction::Outbound, &json!({"type": "a"}));
        log.append_json(Direction::Inbound, &json!({"type": "b"}));
        log.append_json(Direction::Inbound, &json!({"type": "c"}));

        let entries = log.entries();
        assert_eq!(entries.len(), 3);
        let types: Vec<_> = entries.iter().filter_map(|e| e.event_type()).collect();
        assert_eq!(types, vec!["a", "b", "c"]);
        assert_eq!(entries[0].direction, Direction::Outbound);
        assert_eq!(entries[1].direction, Direction::Inbound);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let log = EventLog::default();
        log.append_json(Direction::Inbound, &json!({"type": "a"}));
        let snapshot = log.entries();
        log.append_json(Direction::Inbound, &json!({"type": "b"}));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_last() {
        let log = EventLog::default();
        assert!(log.last().is_none());
        log.append_json(Direction::Outbound, &json!({"type": "x"}));
        assert_eq!(log.last().unwrap().event_type().unwrap(), "x");
    }

    #[test]
    fn test_time_hms_format() {
        let log = EventLog::default();
        log.append_json(Direction::Inbound, &json!({"type": "a"}));
        let hms = log.last().unwrap().time_hms();
        assert_eq!(hms.len(), 8);
        assert_eq!(hms.matches(':').count(), 2);
    }
}
