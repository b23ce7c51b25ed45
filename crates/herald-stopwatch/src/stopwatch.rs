//! The stopwatch: a stack of open sections plus the closed ones by token.
//!
//! All methods take `&self`. State sits behind a `parking_lot::Mutex` that is
//! held only for the duration of each call, so code measured by a
//! [`PeriodGuard`] may itself start periods or open sections.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{StopwatchError, StopwatchResult};
use crate::event::EventSnapshot;
use crate::section::Section;

/// Token under which the root section's events are reported.
pub const ROOT_SECTION: &str = "__root__";

/// Event measuring the lifetime of an open section, inside that section.
pub const SECTION_EVENT: &str = "__section__";

/// Event measuring the lifetime of an open child, inside its parent.
pub const CHILD_SECTION_EVENT: &str = "__section__.child";

/// Category of the section bookkeeping events.
pub const SECTION_CATEGORY: &str = "section";

#[derive(Debug)]
struct StopwatchState {
    /// Every section ever opened. Index 0 is the root.
    sections: Vec<Section>,
    /// Open sections, innermost last.
    active: Vec<usize>,
    /// Closed sections by token.
    closed: HashMap<String, usize>,
}

impl StopwatchState {
    fn new() -> Self {
        Self {
            sections: vec![Section::new()],
            active: vec![0],
            closed: HashMap::new(),
        }
    }

    fn current(&self) -> usize {
        self.active.last().copied().unwrap_or(0)
    }

    fn stop_in(&mut self, section: usize, name: &str) -> StopwatchResult<Duration> {
        self.sections[section]
            .event_mut(name)
            .and_then(|event| event.stop())
            .ok_or_else(|| StopwatchError::NotStarted(name.to_string()))
    }
}

/// Measures named periods grouped into sections.
///
/// # Example
///
/// ```
/// use herald_stopwatch::Stopwatch;
///
/// let stopwatch = Stopwatch::new();
///
/// stopwatch.open_section(None)?;
/// {
///     let _period = stopwatch.start("load_config", "bootstrap");
///     // ... work ...
/// }
/// stopwatch.stop_section("request-1")?;
///
/// let events = stopwatch.section_events("request-1");
/// assert_eq!(events[0].0, "__section__");
/// assert_eq!(events[1].0, "load_config");
/// # Ok::<(), herald_stopwatch::StopwatchError>(())
/// ```
pub struct Stopwatch {
    state: Mutex<StopwatchState>,
}

impl Stopwatch {
    /// Create a stopwatch with only the root section open.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StopwatchState::new()),
        }
    }

    /// Wrap the stopwatch in an [`Arc`].
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Generate a fresh section token.
    pub fn generate_token() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Open a section inside the current one.
    ///
    /// With `None` a new anonymous child is opened. With `Some(token)` the
    /// child closed under `token` is reopened so further events are appended
    /// to it.
    ///
    /// # Errors
    ///
    /// Returns [`StopwatchError::SectionLevelMismatch`] if the current
    /// section has no child closed under `token`.
    pub fn open_section(&self, token: Option<&str>) -> StopwatchResult<()> {
        let mut state = self.state.lock();
        let parent = state.current();

        let child = match token {
            Some(token) => state.sections[parent]
                .children()
                .iter()
                .copied()
                .find(|&child| state.sections[child].id() == Some(token))
                .ok_or_else(|| StopwatchError::SectionLevelMismatch(token.to_string()))?,
            None => {
                state.sections.push(Section::new());
                let child = state.sections.len() - 1;
                state.sections[parent].add_child(child);
                child
            }
        };

        state.sections[parent].start_event(CHILD_SECTION_EVENT, SECTION_CATEGORY);
        state.active.push(child);
        state.sections[child].start_event(SECTION_EVENT, SECTION_CATEGORY);

        debug!(token = ?token, depth = state.active.len() - 1, "Section opened");
        Ok(())
    }

    /// Close the current section and remember it under `token`.
    ///
    /// # Errors
    ///
    /// Returns [`StopwatchError::NoOpenSection`] if only the root is open.
    pub fn stop_section(&self, token: &str) -> StopwatchResult<()> {
        let mut state = self.state.lock();
        if state.active.len() <= 1 {
            return Err(StopwatchError::NoOpenSection);
        }

        let section = state.current();
        state.stop_in(section, SECTION_EVENT)?;
        state.active.pop();
        state.sections[section].set_id(token);
        state.closed.insert(token.to_string(), section);

        let parent = state.current();
        state.stop_in(parent, CHILD_SECTION_EVENT)?;

        debug!(token, "Section closed");
        Ok(())
    }

    /// Start a period of `name` in the current section.
    ///
    /// The returned guard stops the period when dropped.
    pub fn start(&self, name: &str, category: &str) -> PeriodGuard<'_> {
        let mut state = self.state.lock();
        let section = state.current();
        state.sections[section].start_event(name, category);

        PeriodGuard {
            stopwatch: self,
            section,
            name: name.to_string(),
            stopped: false,
        }
    }

    /// Stop the latest period of `name` in the current section.
    ///
    /// # Errors
    ///
    /// Returns [`StopwatchError::NotStarted`] if no period of `name` runs.
    pub fn stop(&self, name: &str) -> StopwatchResult<Duration> {
        let mut state = self.state.lock();
        let section = state.current();
        state.stop_in(section, name)
    }

    /// Stop the latest period of `name` and start a new one.
    ///
    /// # Errors
    ///
    /// Returns [`StopwatchError::NotStarted`] if no period of `name` runs.
    pub fn lap(&self, name: &str) -> StopwatchResult<Duration> {
        let mut state = self.state.lock();
        let section = state.current();
        state.sections[section]
            .event_mut(name)
            .and_then(|event| event.lap())
            .ok_or_else(|| StopwatchError::NotStarted(name.to_string()))
    }

    /// Whether a period of `name` runs in the current section.
    pub fn is_started(&self, name: &str) -> bool {
        let state = self.state.lock();
        state.sections[state.current()]
            .event(name)
            .is_some_and(|event| event.is_started())
    }

    /// Number of open sections, not counting the root.
    pub fn depth(&self) -> usize {
        self.state.lock().active.len() - 1
    }

    /// Events of the section closed under `token`, in creation order.
    ///
    /// [`ROOT_SECTION`] reports the root section. Unknown tokens yield an
    /// empty list.
    pub fn section_events(&self, token: &str) -> Vec<(String, EventSnapshot)> {
        let state = self.state.lock();
        let index = if token == ROOT_SECTION {
            Some(0)
        } else {
            state.closed.get(token).copied()
        };

        index
            .map(|index| state.sections[index].snapshot())
            .unwrap_or_default()
    }

    /// Tokens of all closed sections.
    pub fn section_tokens(&self) -> Vec<String> {
        let mut tokens: Vec<String> = self.state.lock().closed.keys().cloned().collect();
        tokens.sort();
        tokens
    }

    /// Drop every section and event.
    pub fn reset(&self) {
        *self.state.lock() = StopwatchState::new();
    }

    fn stop_period(&self, section: usize, name: &str) -> StopwatchResult<Duration> {
        self.state.lock().stop_in(section, name)
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Stopwatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Stopwatch")
            .field("sections", &state.sections.len())
            .field("depth", &(state.active.len() - 1))
            .finish()
    }
}

/// A running period that stops when dropped.
///
/// The period is stopped in the section it was started in, even if other
/// sections were opened in the meantime. Dropping during unwinding stops it
/// as well.
#[must_use = "the period stops as soon as the guard is dropped"]
pub struct PeriodGuard<'a> {
    stopwatch: &'a Stopwatch,
    section: usize,
    name: String,
    stopped: bool,
}

impl PeriodGuard<'_> {
    /// Name of the measured event.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop the period now and return its length.
    ///
    /// # Errors
    ///
    /// Returns [`StopwatchError::NotStarted`] if the period was already
    /// stopped through [`Stopwatch::stop`].
    pub fn stop(mut self) -> StopwatchResult<Duration> {
        self.stopped = true;
        self.stopwatch.stop_period(self.section, &self.name)
    }

    /// Leave the period running past the guard.
    ///
    /// It must then be stopped with [`Stopwatch::stop`].
    pub fn detach(mut self) {
        self.stopped = true;
    }
}

impl Drop for PeriodGuard<'_> {
    fn drop(&mut self) {
        if self.stopped {
            return;
        }
        if let Err(err) = self.stopwatch.stop_period(self.section, &self.name) {
            warn!(event = %self.name, error = %err, "Failed to stop period");
        }
    }
}

impl std::fmt::Debug for PeriodGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodGuard")
            .field("name", &self.name)
            .field("section", &self.section)
            .finish()
    }
}
