//! Dispatch reports.
//!
//! An [`EventReport`] is a point-in-time snapshot of what the instrumented
//! dispatcher knows: which listeners ran, which did not, and the timing
//! data of one stopwatch section.

use std::fmt::Write as _;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use herald_stopwatch::EventSnapshot;

use crate::calls::{CallRecord, CallRecords};

/// Timing data of one stopwatch event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingEntry {
    /// Stopwatch event name.
    pub name: String,
    /// Collected timing data.
    #[serde(flatten)]
    pub timing: EventSnapshot,
}

/// Snapshot of call records and timings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventReport {
    /// Section token the timings belong to, if any.
    pub token: Option<String>,
    /// Listeners that were invoked.
    pub called: CallRecords,
    /// Registered listeners that were not invoked.
    pub not_called: CallRecords,
    /// Listeners skipped after propagation stopped.
    pub skipped: CallRecords,
    /// Stopwatch events of the section, in creation order.
    pub timings: Vec<TimingEntry>,
}

impl EventReport {
    /// Create a report without timing data.
    pub fn new(called: CallRecords, not_called: CallRecords, skipped: CallRecords) -> Self {
        Self {
            token: None,
            called,
            not_called,
            skipped,
            timings: Vec::new(),
        }
    }

    /// Attach the timing data of a section.
    pub fn with_timings(
        mut self,
        token: impl Into<String>,
        events: Vec<(String, EventSnapshot)>,
    ) -> Self {
        self.token = Some(token.into());
        self.timings = events
            .into_iter()
            .map(|(name, timing)| TimingEntry { name, timing })
            .collect();
        self
    }

    /// Total time spent in listener periods.
    pub fn listener_time(&self) -> Duration {
        self.timings
            .iter()
            .filter(|entry| entry.timing.category == crate::LISTENER_CATEGORY)
            .map(|entry| entry.timing.duration)
            .sum()
    }

    /// Format as human-readable text.
    pub fn to_text(&self) -> String {
        let mut output = String::new();

        let _ = writeln!(
            output,
            "Event Report: {}",
            self.token.as_deref().unwrap_or("-")
        );

        write_records(&mut output, "Called Listeners", &self.called);
        write_records(&mut output, "Not Called Listeners", &self.not_called);
        if !self.skipped.is_empty() {
            write_records(&mut output, "Skipped Listeners", &self.skipped);
        }

        if !self.timings.is_empty() {
            output.push('\n');
            output.push_str("Timings:\n");
            for entry in &self.timings {
                let _ = writeln!(
                    output,
                    "  {} [{}]: {:?}{}",
                    entry.name,
                    entry.timing.category,
                    entry.timing.duration,
                    if entry.timing.running { " (running)" } else { "" }
                );
            }
        }

        output
    }

    /// Format as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Format as pretty JSON string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

fn write_records(output: &mut String, title: &str, records: &CallRecords) {
    output.push('\n');
    let _ = writeln!(output, "{} ({}):", title, records.len());
    for (key, CallRecord { kind, .. }) in records {
        let _ = writeln!(output, "  {} [{}]", key, kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ListenerIdentity;
    use herald_dispatch::Listener;
    use herald_stopwatch::{ROOT_SECTION, Stopwatch};

    fn records(event: &str) -> CallRecords {
        let identity = ListenerIdentity::of(&Listener::closure(|_, _| Ok(())));
        let mut records = CallRecords::new();
        records.insert(identity.key(event), CallRecord::new(event, &identity));
        records
    }

    #[test]
    fn test_report_to_text() {
        let report = EventReport::new(records("foo"), records("bar"), CallRecords::new());
        let text = report.to_text();

        assert!(text.contains("Event Report: -"));
        assert!(text.contains("Called Listeners (1):"));
        assert!(text.contains("  foo.closure [Closure]"));
        assert!(text.contains("Not Called Listeners (1):"));
        assert!(text.contains("  bar.closure [Closure]"));
        assert!(!text.contains("Skipped"));
        assert!(!text.contains("Timings"));
    }

    #[test]
    fn test_report_with_timings() {
        let stopwatch = Stopwatch::new();
        stopwatch.start("foo.closure", crate::LISTENER_CATEGORY).stop().unwrap();

        let report = EventReport::new(records("foo"), CallRecords::new(), CallRecords::new())
            .with_timings(ROOT_SECTION, stopwatch.section_events(ROOT_SECTION));

        assert_eq!(report.token.as_deref(), Some(ROOT_SECTION));
        assert_eq!(report.timings.len(), 1);
        assert_eq!(report.listener_time(), report.timings[0].timing.duration);
        assert!(report.to_text().contains("foo.closure [event_listener]"));
    }

    #[test]
    fn test_report_to_json() {
        let report = EventReport::new(records("foo"), CallRecords::new(), CallRecords::new());
        let json = report.to_json();

        assert_eq!(json["called"]["foo.closure"]["type"], "Closure");
        assert_eq!(json["called"]["foo.closure"]["event"], "foo");
        assert!(json["not_called"].as_object().unwrap().is_empty());

        let back: EventReport = serde_json::from_str(&report.to_json_pretty()).unwrap();
        assert_eq!(back, report);
    }
}
