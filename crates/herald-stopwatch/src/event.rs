//! Timed events and their periods.
//!
//! A [`StopwatchEvent`] is a named series of periods in one section. Starts
//! are kept on a stack, so the same event may be started again while already
//! running (nested dispatch) and each stop closes the most recent start.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// A closed period, as offsets from the section origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    /// Offset of the start from the section origin.
    #[serde(with = "duration_serde")]
    pub start: Duration,
    /// Offset of the end from the section origin.
    #[serde(with = "duration_serde")]
    pub end: Duration,
}

impl Period {
    /// Length of the period.
    pub fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }
}

/// A named series of timing periods.
#[derive(Debug, Clone)]
pub struct StopwatchEvent {
    origin: Instant,
    category: String,
    started: Vec<Instant>,
    periods: Vec<Period>,
}

impl StopwatchEvent {
    /// Create an event measured relative to `origin`.
    pub fn new(origin: Instant, category: impl Into<String>) -> Self {
        Self {
            origin,
            category: category.into(),
            started: Vec::new(),
            periods: Vec::new(),
        }
    }

    /// The event category.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Open a new period.
    pub fn start(&mut self) {
        self.started.push(Instant::now());
    }

    /// Close the most recently opened period.
    ///
    /// Returns the period length, or `None` if nothing was running.
    pub fn stop(&mut self) -> Option<Duration> {
        let started = self.started.pop()?;
        let now = Instant::now();
        self.periods.push(Period {
            start: started.duration_since(self.origin),
            end: now.duration_since(self.origin),
        });
        Some(now.duration_since(started))
    }

    /// Close the running period and immediately open a new one.
    pub fn lap(&mut self) -> Option<Duration> {
        let elapsed = self.stop()?;
        self.start();
        Some(elapsed)
    }

    /// Close every running period.
    pub fn ensure_stopped(&mut self) {
        while self.stop().is_some() {}
    }

    /// Whether a period is running.
    pub fn is_started(&self) -> bool {
        !self.started.is_empty()
    }

    /// Closed periods, in the order they were closed.
    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    /// Earliest period start, or zero when no period is closed.
    pub fn start_time(&self) -> Duration {
        self.periods
            .iter()
            .map(|p| p.start)
            .min()
            .unwrap_or(Duration::ZERO)
    }

    /// Latest period end, or zero when no period is closed.
    pub fn end_time(&self) -> Duration {
        self.periods
            .iter()
            .map(|p| p.end)
            .max()
            .unwrap_or(Duration::ZERO)
    }

    /// Sum of all closed periods.
    pub fn duration(&self) -> Duration {
        self.periods.iter().map(Period::duration).sum()
    }

    /// Take a serializable snapshot.
    pub fn snapshot(&self) -> EventSnapshot {
        EventSnapshot {
            category: self.category.clone(),
            running: self.is_started(),
            start_time: self.start_time(),
            end_time: self.end_time(),
            duration: self.duration(),
            periods: self.periods.clone(),
        }
    }
}

/// Snapshot of an event's timing data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSnapshot {
    /// The event category.
    pub category: String,
    /// Whether a period was still running.
    pub running: bool,
    /// Earliest period start.
    #[serde(with = "duration_serde")]
    pub start_time: Duration,
    /// Latest period end.
    #[serde(with = "duration_serde")]
    pub end_time: Duration,
    /// Sum of the closed periods.
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Closed periods.
    pub periods: Vec<Period>,
}

/// Custom serde for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u64::try_from(duration.as_nanos())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nanos = u64::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos))
    }
}
