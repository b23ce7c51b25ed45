//! Call records collected during dispatch.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::identity::{ListenerIdentity, ListenerType};

/// What is known about one listener of one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Event name.
    pub event: String,
    /// Callable kind.
    #[serde(rename = "type")]
    pub kind: ListenerType,
    /// Human-readable listener label.
    pub pretty: String,
}

impl CallRecord {
    /// Build the record of `identity` for `event`.
    pub fn new(event: impl Into<String>, identity: &ListenerIdentity) -> Self {
        Self {
            event: event.into(),
            kind: identity.kind,
            pretty: identity.pretty.clone(),
        }
    }
}

/// Call records keyed by `event.pretty`.
pub type CallRecords = BTreeMap<String, CallRecord>;

/// Collects called and skipped listeners across dispatches.
///
/// Records accumulate until [`CallCollector::reset`]. Two listeners sharing
/// a key (e.g. two closures on one event) share one record.
#[derive(Default)]
pub struct CallCollector {
    called: RwLock<CallRecords>,
    skipped: RwLock<CallRecords>,
}

impl CallCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a listener that was invoked.
    pub fn record_called(&self, key: String, record: CallRecord) {
        self.called.write().insert(key, record);
    }

    /// Record a listener that was skipped after propagation stopped.
    pub fn record_skipped(&self, key: String, record: CallRecord) {
        self.skipped.write().insert(key, record);
    }

    /// Whether a listener was invoked under `key`.
    pub fn is_called(&self, key: &str) -> bool {
        self.called.read().contains_key(key)
    }

    /// Snapshot of the called listeners.
    pub fn called(&self) -> CallRecords {
        self.called.read().clone()
    }

    /// Snapshot of the skipped listeners.
    pub fn skipped(&self) -> CallRecords {
        self.skipped.read().clone()
    }

    /// Forget every record.
    pub fn reset(&self) {
        self.called.write().clear();
        self.skipped.write().clear();
    }
}

impl std::fmt::Debug for CallCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallCollector")
            .field("called", &self.called.read().len())
            .field("skipped", &self.skipped.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_dispatch::Listener;

    fn closure_record(event: &str) -> (String, CallRecord) {
        let identity = ListenerIdentity::of(&Listener::closure(|_, _| Ok(())));
        (identity.key(event), CallRecord::new(event, &identity))
    }

    #[test]
    fn test_record_and_reset() {
        let collector = CallCollector::new();
        let (key, record) = closure_record("foo");

        collector.record_called(key.clone(), record.clone());
        assert!(collector.is_called("foo.closure"));
        assert_eq!(collector.called().get(&key), Some(&record));

        let (key, record) = closure_record("bar");
        collector.record_skipped(key, record);
        assert_eq!(collector.skipped().len(), 1);

        collector.reset();
        assert!(collector.called().is_empty());
        assert!(collector.skipped().is_empty());
    }

    #[test]
    fn test_same_key_merges() {
        let collector = CallCollector::new();
        let (key, record) = closure_record("foo");
        collector.record_called(key.clone(), record.clone());
        collector.record_called(key, record);

        assert_eq!(collector.called().len(), 1);
    }

    #[test]
    fn test_record_serializes_type_field() {
        let (_, record) = closure_record("foo");
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(
            json,
            serde_json::json!({ "event": "foo", "type": "Closure", "pretty": "closure" })
        );
    }
}
