//! Configuration for the instrumented dispatcher.
//!
//! [`TraceConfig`] can be built in code with `with_*` methods or loaded from
//! TOML:
//!
//! ```toml
//! time_events = true
//! time_listeners = true
//!
//! [lifecycle]
//! request = "app.request"
//! terminate = "app.terminate"
//! ```
//!
//! `lifecycle = false` disables section handling.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::TraceResult;

/// Event names driving the stopwatch section lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleEvents {
    /// Opens a new section before dispatch.
    pub request: String,
    /// Starts the `controller` period after dispatch.
    pub controller: String,
    /// Stops `controller`, then closes the section after dispatch.
    pub response: String,
    /// Reopens the section around its dispatch.
    pub terminate: String,
}

impl Default for LifecycleEvents {
    fn default() -> Self {
        Self {
            request: "kernel.request".to_string(),
            controller: "kernel.controller".to_string(),
            response: "kernel.response".to_string(),
            terminate: "kernel.terminate".to_string(),
        }
    }
}

impl LifecycleEvents {
    /// Create the default `kernel.*` event names.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request event name.
    pub fn with_request(mut self, name: impl Into<String>) -> Self {
        self.request = name.into();
        self
    }

    /// Set the controller event name.
    pub fn with_controller(mut self, name: impl Into<String>) -> Self {
        self.controller = name.into();
        self
    }

    /// Set the response event name.
    pub fn with_response(mut self, name: impl Into<String>) -> Self {
        self.response = name.into();
        self
    }

    /// Set the terminate event name.
    pub fn with_terminate(mut self, name: impl Into<String>) -> Self {
        self.terminate = name.into();
        self
    }

    /// The lifecycle phase `event_name` drives, if any.
    pub fn phase(&self, event_name: &str) -> Option<LifecyclePhase> {
        if event_name == self.request {
            Some(LifecyclePhase::Request)
        } else if event_name == self.controller {
            Some(LifecyclePhase::Controller)
        } else if event_name == self.response {
            Some(LifecyclePhase::Response)
        } else if event_name == self.terminate {
            Some(LifecyclePhase::Terminate)
        } else {
            None
        }
    }
}

/// A step of the section lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    /// A unit of work starts.
    Request,
    /// The handler was resolved.
    Controller,
    /// The handler produced its result.
    Response,
    /// Post-response work.
    Terminate,
}

/// Configuration for [`TraceableDispatcher`](crate::TraceableDispatcher).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Record the event-level and `.loading` periods of each dispatch.
    pub time_events: bool,

    /// Record a period around each listener invocation.
    pub time_listeners: bool,

    /// Section lifecycle event names. `None` disables section handling.
    #[serde(deserialize_with = "deserialize_lifecycle")]
    pub lifecycle: Option<LifecycleEvents>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            time_events: true,
            time_listeners: true,
            lifecycle: Some(LifecycleEvents::default()),
        }
    }
}

impl TraceConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::Config`](crate::TraceError::Config) on invalid
    /// TOML or unknown value types.
    pub fn from_toml_str(source: &str) -> TraceResult<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Enable event-level timing.
    pub fn with_event_timing(mut self, enabled: bool) -> Self {
        self.time_events = enabled;
        self
    }

    /// Enable per-listener timing.
    pub fn with_listener_timing(mut self, enabled: bool) -> Self {
        self.time_listeners = enabled;
        self
    }

    /// Use custom lifecycle event names.
    pub fn with_lifecycle(mut self, events: LifecycleEvents) -> Self {
        self.lifecycle = Some(events);
        self
    }

    /// Disable section handling.
    pub fn without_lifecycle(mut self) -> Self {
        self.lifecycle = None;
        self
    }

    /// The lifecycle phase `event_name` drives, if any.
    pub fn phase(&self, event_name: &str) -> Option<LifecyclePhase> {
        self.lifecycle.as_ref().and_then(|l| l.phase(event_name))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LifecycleSetting {
    Toggle(bool),
    Events(LifecycleEvents),
}

fn deserialize_lifecycle<'de, D>(deserializer: D) -> Result<Option<LifecycleEvents>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match LifecycleSetting::deserialize(deserializer)? {
        LifecycleSetting::Toggle(true) => Some(LifecycleEvents::default()),
        LifecycleSetting::Toggle(false) => None,
        LifecycleSetting::Events(events) => Some(events),
    })
}
