//! Timing sections.
//!
//! Sections group events measured during one logical unit of work (for
//! example one request). They form a tree rooted at the stopwatch's root
//! section; a closed section is remembered under a token and can be reopened
//! from its parent to append more events.

use std::time::Instant;

use crate::event::{EventSnapshot, StopwatchEvent};

/// A node in the section tree.
#[derive(Debug, Clone)]
pub struct Section {
    id: Option<String>,
    origin: Instant,
    events: Vec<(String, StopwatchEvent)>,
    children: Vec<usize>,
}

impl Section {
    /// Create an anonymous section starting now.
    pub fn new() -> Self {
        Self {
            id: None,
            origin: Instant::now(),
            events: Vec::new(),
            children: Vec::new(),
        }
    }

    /// The token this section was closed under, if any.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub(crate) fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    pub(crate) fn children(&self) -> &[usize] {
        &self.children
    }

    pub(crate) fn add_child(&mut self, index: usize) {
        self.children.push(index);
    }

    /// Open a period on `name`, creating the event on first use.
    pub fn start_event(&mut self, name: &str, category: &str) {
        let position = match self.position(name) {
            Some(position) => position,
            None => {
                self.events
                    .push((name.to_string(), StopwatchEvent::new(self.origin, category)));
                self.events.len() - 1
            }
        };
        self.events[position].1.start();
    }

    /// Look up an event by name.
    pub fn event(&self, name: &str) -> Option<&StopwatchEvent> {
        self.position(name).map(|position| &self.events[position].1)
    }

    /// Look up an event mutably by name.
    pub fn event_mut(&mut self, name: &str) -> Option<&mut StopwatchEvent> {
        let position = self.position(name)?;
        Some(&mut self.events[position].1)
    }

    /// Events in creation order.
    pub fn events(&self) -> impl Iterator<Item = (&str, &StopwatchEvent)> {
        self.events.iter().map(|(name, event)| (name.as_str(), event))
    }

    /// Snapshot every event, in creation order.
    pub fn snapshot(&self) -> Vec<(String, EventSnapshot)> {
        self.events
            .iter()
            .map(|(name, event)| (name.clone(), event.snapshot()))
            .collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.events.iter().position(|(n, _)| n == name)
    }
}

impl Default for Section {
    fn default() -> Self {
        Self::new()
    }
}
